//! Name-keyed registry of peak functions.

use super::peak::{PeakFunction, PeakKind};
use crate::error::{Result, StecaError};
use std::collections::HashMap;

/// Registry mapping function names to peak shapes.
pub struct FunctionRegistry {
    kinds: HashMap<&'static str, PeakKind>,
    order: Vec<PeakKind>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create a registry holding every built-in shape.
    pub fn new_with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in PeakKind::ALL {
            registry.register(kind);
        }
        registry
    }

    /// Register a shape under its name. Registering twice has no effect.
    pub fn register(&mut self, kind: PeakKind) {
        if self.kinds.insert(kind.name(), kind).is_none() {
            self.order.push(kind);
        }
    }

    pub fn get(&self, name: &str) -> Option<PeakKind> {
        self.kinds.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Fresh, unfitted function for `name`.
    pub fn create(&self, name: &str) -> Result<PeakFunction> {
        self.get(name)
            .map(PeakFunction::new)
            .ok_or_else(|| StecaError::UnknownFunction(name.to_string()))
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.order.iter().map(|k| k.name()).collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new_with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::ParametricFunction;

    #[test]
    fn test_registry_defaults() {
        let registry = FunctionRegistry::new_with_defaults();
        assert_eq!(
            registry.names(),
            vec!["Raw", "Gaussian", "Lorentzian", "PseudoVoigt1", "PseudoVoigt2"]
        );
        assert!(registry.contains("Lorentzian"));
        assert!(!registry.contains("Voigt"));
    }

    #[test]
    fn test_registry_create() {
        let mut registry = FunctionRegistry::new();
        registry.register(PeakKind::Gaussian);
        registry.register(PeakKind::Gaussian);
        assert_eq!(registry.names().len(), 1);

        let f = registry.create("Gaussian").unwrap();
        assert_eq!(f.kind(), PeakKind::Gaussian);
        assert_eq!(f.parameter_count(), 3);
        assert!(matches!(
            registry.create("Raw"),
            Err(StecaError::UnknownFunction(_))
        ));
    }
}
