use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::models::IngredientAssessment;

/// Label of the bucket holding user-typed ingredients.
pub const MANUAL_BUCKET_LABEL: &str = "Manual Ingredients";

/// Grouping key for selection state: one bucket per analyzed dish plus the
/// reserved manual bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    Dish(String),
    Manual,
}

impl Bucket {
    #[must_use]
    pub fn dish(name: impl Into<String>) -> Self {
        Self::Dish(name.into())
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Dish(name) => name,
            Self::Manual => MANUAL_BUCKET_LABEL,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which ingredient ids the user has confirmed, per bucket.
#[derive(Debug, Clone, Default)]
pub struct SelectionIndex {
    buckets: HashMap<Bucket, HashSet<Uuid>>,
}

impl SelectionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id` in `bucket`.
    pub fn toggle(&mut self, id: Uuid, bucket: &Bucket) {
        let selected = self.buckets.entry(bucket.clone()).or_default();
        if selected.remove(&id) {
            return;
        }
        selected.insert(id);
    }

    #[must_use]
    pub fn is_selected(&self, id: Uuid, bucket: &Bucket) -> bool {
        self.buckets
            .get(bucket)
            .is_some_and(|selected| selected.contains(&id))
    }

    /// The assessments from `available` whose id is selected in `bucket`, in
    /// the order of `available`.
    #[must_use]
    pub fn collect_selected(
        &self,
        bucket: &Bucket,
        available: &[IngredientAssessment],
    ) -> Vec<IngredientAssessment> {
        let Some(selected) = self.buckets.get(bucket) else {
            return Vec::new();
        };
        available
            .iter()
            .filter(|a| selected.contains(&a.id))
            .cloned()
            .collect()
    }

    /// Forget `id` in every bucket.
    pub fn remove(&mut self, id: Uuid) {
        for ids in self.buckets.values_mut() {
            ids.remove(&id);
        }
    }

    /// Drop every dish bucket, keeping manual selections.
    pub fn clear_dishes(&mut self) {
        self.buckets.retain(|bucket, _| *bucket == Bucket::Manual);
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.buckets.values().map(HashSet::len).sum()
    }
}
