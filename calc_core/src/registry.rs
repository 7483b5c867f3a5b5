//! # Calculator Registry
//!
//! Maps calculator ids to their definitions. There is no global instance:
//! callers construct a [`Registry`] (usually via
//! [`standard_registry`](crate::calculators::standard_registry)), populate it
//! at start-up and read from it afterwards.
//!
//! [`SharedRegistry`] covers the case where registration keeps happening
//! while other threads read. Writers serialize on a lock and publish a fresh
//! snapshot; readers load an `Arc<Registry>` without taking any lock.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::calculators::standard_registry;
//! use calc_core::schema::Category;
//! use calc_core::settings::Settings;
//!
//! let registry = standard_registry(&Settings::default()).unwrap();
//! let ltv = registry.get("loan-to-value").unwrap();
//! assert_eq!(ltv.category(), Category::Finance);
//! assert!(registry.get("no-such-calculator").is_err());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;

use crate::calculator::{CalculatorDefinition, Evaluation};
use crate::errors::{CalcError, CalcResult};
use crate::schema::Category;
use crate::values::RawInputs;

/// Insertion-ordered set of calculator definitions with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<Arc<CalculatorDefinition>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calculator. An existing id is never overwritten.
    pub fn register(&mut self, calculator: CalculatorDefinition) -> CalcResult<()> {
        let id = calculator.id().to_string();
        if self.index.contains_key(&id) {
            return Err(CalcError::duplicate(id));
        }
        debug!(calculator = %id, category = ?calculator.category(), "registered calculator");
        self.index.insert(id, self.entries.len());
        self.entries.push(Arc::new(calculator));
        Ok(())
    }

    pub fn get(&self, id: &str) -> CalcResult<&Arc<CalculatorDefinition>> {
        debug!(calculator = %id, "registry lookup");
        self.index
            .get(id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| CalcError::not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Calculators in registration order, optionally filtered by category
    pub fn list(&self, category: Option<Category>) -> impl Iterator<Item = &Arc<CalculatorDefinition>> + '_ {
        self.entries
            .iter()
            .filter(move |c| category.map_or(true, |wanted| c.category() == wanted))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Look up a calculator and run the full pipeline on `raw`
    pub fn evaluate(&self, id: &str, raw: &RawInputs) -> CalcResult<Evaluation> {
        self.get(id)?.evaluate(raw)
    }
}

/// Registry that accepts registrations while being read.
///
/// Readers load the current snapshot without taking a lock; writers
/// serialize on `writer`, build the next registry from the current one and
/// swap it in.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    current: ArcSwap<Registry>,
    writer: Mutex<()>,
}

impl SharedRegistry {
    pub fn new(initial: Registry) -> Self {
        SharedRegistry {
            current: ArcSwap::from_pointee(initial),
            writer: Mutex::new(()),
        }
    }

    /// Immutable view of the registry as of now
    pub fn snapshot(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Register into a copy and publish it. Readers holding an older
    /// snapshot keep seeing the old contents.
    pub fn register(&self, calculator: CalculatorDefinition) -> CalcResult<()> {
        let _guard = self.writer.lock();
        let mut next = Registry::clone(&self.current.load());
        next.register(calculator)?;
        self.current.store(Arc::new(next));
        Ok(())
    }

    pub fn get(&self, id: &str) -> CalcResult<Arc<CalculatorDefinition>> {
        self.current.load().get(id).cloned()
    }

    /// Calculators in registration order as of now, optionally filtered by category
    pub fn list(&self, category: Option<Category>) -> Vec<Arc<CalculatorDefinition>> {
        self.current.load().list(category).cloned().collect()
    }

    pub fn clear(&self) {
        let _guard = self.writer.lock();
        self.current.store(Arc::new(Registry::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CalcResult;
    use crate::schema::FieldSchema;
    use crate::values::{Bag, InputBag, OutputBag};

    fn constant(id: &str, category: Category, value: f64) -> CalculatorDefinition {
        CalculatorDefinition::builder(id, id, category)
            .input(FieldSchema::number("x", "X").optional())
            .output(FieldSchema::number("value", "Value"))
            .computation(move |_: &InputBag| -> CalcResult<OutputBag> { Ok(Bag::new().with("value", value)) })
            .report(|_: &InputBag, _: &OutputBag| -> CalcResult<String> { Ok(String::new()) })
            .build()
            .unwrap()
    }

    fn value_of(registry: &Registry, id: &str) -> f64 {
        match registry.evaluate(id, &RawInputs::new()).unwrap() {
            Evaluation::Completed { outputs, .. } => outputs.number("value").unwrap(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_does_not_overwrite() {
        let mut registry = Registry::new();
        registry.register(constant("calc", Category::Math, 1.0)).unwrap();
        let err = registry.register(constant("calc", Category::Math, 2.0)).unwrap_err();
        assert_eq!(err, CalcError::duplicate("calc"));
        assert_eq!(registry.len(), 1);
        assert_eq!(value_of(&registry, "calc"), 1.0);
    }

    #[test]
    fn test_get_unknown() {
        let registry = Registry::new();
        assert_eq!(registry.get("missing").unwrap_err().error_code(), "CALCULATOR_NOT_FOUND");
    }

    #[test]
    fn test_list_order_and_filter() {
        let mut registry = Registry::new();
        registry.register(constant("b", Category::Finance, 1.0)).unwrap();
        registry.register(constant("a", Category::Health, 1.0)).unwrap();
        registry.register(constant("c", Category::Finance, 1.0)).unwrap();

        let all: Vec<&str> = registry.list(None).map(|c| c.id()).collect();
        assert_eq!(all, vec!["b", "a", "c"]);

        let finance: Vec<&str> = registry.list(Some(Category::Finance)).map(|c| c.id()).collect();
        assert_eq!(finance, vec!["b", "c"]);

        assert_eq!(registry.list(Some(Category::Legal)).count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut registry = Registry::new();
        registry.register(constant("a", Category::Math, 1.0)).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.register(constant("a", Category::Math, 1.0)).is_ok());
    }

    #[test]
    fn test_shared_snapshots_are_stable() {
        let shared = SharedRegistry::new(Registry::new());
        shared.register(constant("a", Category::Math, 1.0)).unwrap();
        let before = shared.snapshot();
        shared.register(constant("b", Category::Math, 2.0)).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(shared.snapshot().len(), 2);
        assert!(shared.register(constant("a", Category::Math, 3.0)).is_err());
        assert_eq!(value_of(&shared.snapshot(), "a"), 1.0);
    }

    #[test]
    fn test_shared_concurrent_registration() {
        let shared = Arc::new(SharedRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || shared.register(constant(&format!("calc-{}", i), Category::Math, i as f64)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(shared.snapshot().len(), 8);
        assert!(shared.get("calc-3").is_ok());
    }

    #[test]
    fn test_shared_reads_during_registration() {
        let shared = Arc::new(SharedRegistry::new(Registry::new()));
        shared.register(constant("seed", Category::Finance, 0.0)).unwrap();

        let writer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..50 {
                    let category = if i % 2 == 0 { Category::Finance } else { Category::Math };
                    shared.register(constant(&format!("calc-{}", i), category, i as f64)).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    let mut seen = 0;
                    for _ in 0..200 {
                        assert!(shared.get("seed").is_ok());
                        let listed = shared.list(None);
                        assert!(listed.len() >= seen);
                        assert_eq!(listed[0].id(), "seed");
                        seen = listed.len();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(shared.list(None).len(), 51);
        assert_eq!(shared.list(Some(Category::Finance)).len(), 26);
        assert_eq!(shared.list(Some(Category::Math)).len(), 25);
    }
}
