use anyhow::Result;
use serde_json::json;
use std::process;

use clearplate_core::models::validate_foods;
use clearplate_core::service::{AnalysisService, CompletionProvider};

use super::helpers::{json_error, print_dishes, print_ingredient};

pub(crate) async fn cmd_analyze<P: CompletionProvider>(
    service: &AnalysisService<P>,
    foods: &[String],
    json: bool,
) -> Result<()> {
    let foods = validate_foods(foods)?;
    let description = foods.join(", ");

    match service.analyze_meal(&description).await {
        Ok(dishes) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&json!({ "meals": dishes }))?);
            } else {
                print_dishes(&dishes);
            }
            Ok(())
        }
        Err(e) => {
            let message = format!("Analysis failed: {e}");
            if json {
                println!("{}", json_error(&message));
            } else {
                eprintln!("{message}");
            }
            process::exit(1);
        }
    }
}

/// Analyze a single ingredient. Failures fall back to the medium-risk
/// default, so this always prints an assessment.
pub(crate) async fn cmd_ingredient<P: CompletionProvider>(
    service: &AnalysisService<P>,
    name: &str,
    json: bool,
) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Ingredient name is required");
    }
    let assessment = service.analyze_ingredient_or_default(name).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print_ingredient(&assessment);
    }
    Ok(())
}
