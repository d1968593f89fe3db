use std::future::Future;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::{parse_ingredient_analysis, parse_meal_analysis};
use crate::error::AnalysisError;
use crate::models::{DishAnalysis, IngredientAssessment};
use crate::prompt::{build_ingredient_prompt, build_meal_prompt};

/// Chat-completion backend.
///
/// The CLI implements this with reqwest; tests use canned answers. One call
/// is one outbound request, with no retries.
pub trait CompletionProvider: Send + Sync {
    /// Send `prompt` as a single user message and return the raw text of the
    /// first answer.
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AnalysisError>> + Send;
}

pub struct AnalysisService<P> {
    provider: P,
}

impl<P: CompletionProvider> AnalysisService<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn analyze_meal(&self, description: &str) -> Result<Vec<DishAnalysis>, AnalysisError> {
        let prompt = build_meal_prompt(description);
        debug!(description, "requesting meal analysis");
        let raw = self.provider.complete(&prompt).await?;
        parse_meal_analysis(&raw)
    }

    pub async fn analyze_ingredient(&self, name: &str) -> Result<IngredientAssessment, AnalysisError> {
        let prompt = build_ingredient_prompt(name);
        debug!(name, "requesting ingredient analysis");
        let raw = self.provider.complete(&prompt).await?;
        parse_ingredient_analysis(&raw)
    }

    /// Like [`Self::analyze_ingredient`], but any failure becomes the
    /// medium-risk default instead of an error.
    pub async fn analyze_ingredient_or_default(&self, name: &str) -> IngredientAssessment {
        let name = name.trim();
        match self.analyze_ingredient(name).await {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(error = %e, name, "ingredient analysis failed, using default risk");
                IngredientAssessment::fallback(Uuid::new_v4(), name)
            }
        }
    }
}
