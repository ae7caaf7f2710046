//! Recommender registry
//!
//! An explicit factory table keyed by recommender name, built once at
//! startup and handed to the evaluation scheduler. Rule-level overrides are
//! merged over the recommender's base configuration before construction
//! (rule values win).

use crate::recommender::{ResourceRecommender, RECOMMENDER_NAME};
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashMap};

pub type RecommenderFactory = fn(&BTreeMap<String, String>) -> Result<ResourceRecommender>;

pub struct RecommenderRegistry {
    factories: HashMap<String, RecommenderFactory>,
}

impl RecommenderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in recommenders.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(RECOMMENDER_NAME, |overrides| {
            ResourceRecommender::new(overrides).map_err(Into::into)
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: RecommenderFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct a recommender by name from its base configuration plus
    /// rule-level overrides.
    pub fn build(
        &self,
        name: &str,
        base: &BTreeMap<String, String>,
        rule_overrides: &BTreeMap<String, String>,
    ) -> Result<ResourceRecommender> {
        let Some(factory) = self.factories.get(name) else {
            bail!("no recommender registered under `{name}`");
        };
        let mut merged = base.clone();
        merged.extend(rule_overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        factory(&merged).with_context(|| format!("building recommender `{name}`"))
    }
}

impl Default for RecommenderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
