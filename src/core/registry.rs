// src/core/registry.rs — Name-keyed component factories
//
// Optional convenience for configuration-driven assembly. Explicit
// dependency injection (constructing components and passing them to
// `EvolutionEngine::new`) is the primary path; nothing in the core
// depends on this registry and there is no global instance.

use std::collections::BTreeMap;

use super::traits::{Controller, Evaluator, Generator, Selector};
use crate::infra::errors::{Result, ShoalError};

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

#[derive(Default)]
pub struct ComponentRegistry {
    generators: BTreeMap<String, Factory<Box<dyn Generator>>>,
    evaluators: BTreeMap<String, Factory<Box<dyn Evaluator>>>,
    selectors: BTreeMap<String, Factory<Box<dyn Selector>>>,
    controllers: BTreeMap<String, Factory<Box<dyn Controller>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_generator(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Generator> + Send + Sync + 'static,
    ) {
        self.generators.insert(name.into(), Box::new(factory));
    }

    pub fn register_evaluator(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Evaluator> + Send + Sync + 'static,
    ) {
        self.evaluators.insert(name.into(), Box::new(factory));
    }

    pub fn register_selector(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Selector> + Send + Sync + 'static,
    ) {
        self.selectors.insert(name.into(), Box::new(factory));
    }

    pub fn register_controller(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    ) {
        self.controllers.insert(name.into(), Box::new(factory));
    }

    pub fn create_generator(&self, name: &str) -> Result<Box<dyn Generator>> {
        Self::create(&self.generators, "generator", name)
    }

    pub fn create_evaluator(&self, name: &str) -> Result<Box<dyn Evaluator>> {
        Self::create(&self.evaluators, "evaluator", name)
    }

    pub fn create_selector(&self, name: &str) -> Result<Box<dyn Selector>> {
        Self::create(&self.selectors, "selector", name)
    }

    pub fn create_controller(&self, name: &str) -> Result<Box<dyn Controller>> {
        Self::create(&self.controllers, "controller", name)
    }

    fn create<T>(map: &BTreeMap<String, Factory<T>>, kind: &str, name: &str) -> Result<T> {
        map.get(name).map(|f| f()).ok_or_else(|| {
            ShoalError::UnknownComponent {
                kind: kind.into(),
                name: name.into(),
                available: map.keys().cloned().collect(),
            }
        })
    }

    /// Registered names per component kind.
    pub fn list(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut out = BTreeMap::new();
        out.insert("generators", self.generators.keys().cloned().collect());
        out.insert("evaluators", self.evaluators.keys().cloned().collect());
        out.insert("selectors", self.selectors.keys().cloned().collect());
        out.insert("controllers", self.controllers.keys().cloned().collect());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::budget::BudgetController;
    use crate::selectors::topk::TopKSelector;

    fn registry_with_defaults() -> ComponentRegistry {
        let mut reg = ComponentRegistry::new();
        reg.register_selector("topk", || Box::new(TopKSelector::new(3)));
        reg.register_controller("budget", || Box::new(BudgetController::new()));
        reg
    }

    #[test]
    fn test_create_registered() {
        let reg = registry_with_defaults();
        let selector = reg.create_selector("topk").unwrap();
        assert_eq!(selector.name(), "topk");
        let controller = reg.create_controller("budget").unwrap();
        assert_eq!(controller.name(), "budget");
    }

    #[test]
    fn test_unknown_name_is_contract_error() {
        let reg = registry_with_defaults();
        let Err(err) = reg.create_selector("tournament") else {
            panic!("unknown selector name must not resolve");
        };
        assert!(err.is_contract_violation());
        match err {
            ShoalError::UnknownComponent {
                kind,
                name,
                available,
            } => {
                assert_eq!(kind, "selector");
                assert_eq!(name, "tournament");
                assert_eq!(available, vec!["topk".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_list() {
        let reg = registry_with_defaults();
        let listing = reg.list();
        assert_eq!(listing["selectors"], vec!["topk".to_string()]);
        assert!(listing["generators"].is_empty());
    }
}
