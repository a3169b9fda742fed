//! Operation registry.
//!
//! The registry maps (operator name, mode) to a descriptor plus the
//! property rules for that pair. It is populated once, typically through
//! [`RegistryBuilder`], and is read-only afterwards: it is shared behind an
//! `Arc` and all lookups take `&self`.

use crate::core::descriptor::OperationDescriptor;
use crate::core::error::{RegistryError, RegistryResult};
use crate::core::mode::{Mode, ModeSet};
use crate::graph::properties::{PropertyGenerator, PropertyTable};
use indexmap::IndexMap;
use log::debug;
use std::sync::{Arc, OnceLock};

/// Registry entry for one (operator, mode) pair.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Shared descriptor.
    pub descriptor: Arc<OperationDescriptor>,
    /// Property rules captured by nodes at creation.
    pub properties: Arc<PropertyTable>,
}

/// Catalog of registered operators.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    /// Entries keyed by lowercase name and mode.
    entries: IndexMap<(String, Mode), RegistryEntry>,
}

impl OperationRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in operators.
    pub fn with_builtins() -> RegistryResult<Self> {
        let mut registry = Self::new();
        crate::operators::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Process-wide registry holding the built-in operators.
    ///
    /// Population runs once; a failure is reported to every caller.
    pub fn global() -> RegistryResult<Arc<OperationRegistry>> {
        static INSTANCE: OnceLock<RegistryResult<Arc<OperationRegistry>>> = OnceLock::new();
        INSTANCE
            .get_or_init(|| OperationRegistry::with_builtins().map(Arc::new))
            .clone()
    }

    /// Register a descriptor under each of `modes`.
    ///
    /// Either every mode is registered or none is.
    pub fn register(
        &mut self,
        descriptor: impl Into<Arc<OperationDescriptor>>,
        modes: impl IntoIterator<Item = Mode>,
    ) -> RegistryResult<()> {
        let descriptor = descriptor.into();
        let modes: ModeSet = modes.into_iter().collect();
        let name = descriptor.name().to_string();
        let key = name.to_ascii_lowercase();

        for mode in modes.iter() {
            if !descriptor.supports(mode) {
                return Err(RegistryError::ModeNotDeclared {
                    operation: name,
                    mode,
                });
            }
            if self.entries.contains_key(&(key.clone(), mode)) {
                return Err(RegistryError::DuplicateRegistration {
                    operation: name,
                    mode,
                });
            }
        }

        for mode in modes.iter() {
            let properties = Arc::new(PropertyTable::from_descriptor(&descriptor, mode));
            self.entries.insert(
                (key.clone(), mode),
                RegistryEntry {
                    descriptor: Arc::clone(&descriptor),
                    properties,
                },
            );
        }
        debug!("Registered {} for modes {}", name, modes);
        Ok(())
    }

    /// Register a descriptor under every mode it supports.
    pub fn register_all_modes(
        &mut self,
        descriptor: impl Into<Arc<OperationDescriptor>>,
    ) -> RegistryResult<()> {
        let descriptor = descriptor.into();
        let modes = descriptor.supported_modes();
        self.register(descriptor, modes.iter())
    }

    /// Resolve an operator name, ignoring case.
    pub fn lookup(&self, name: &str, mode: Mode) -> RegistryResult<Arc<OperationDescriptor>> {
        self.entry(name, mode)
            .map(|e| Arc::clone(&e.descriptor))
            .ok_or_else(|| RegistryError::NotFound {
                operation: name.to_string(),
                mode,
            })
    }

    /// Get a registry entry.
    pub fn entry(&self, name: &str, mode: Mode) -> Option<&RegistryEntry> {
        self.entries.get(&(name.to_ascii_lowercase(), mode))
    }

    /// Property rules for a registered pair.
    pub fn property_table(&self, name: &str, mode: Mode) -> Option<Arc<PropertyTable>> {
        self.entry(name, mode).map(|e| Arc::clone(&e.properties))
    }

    /// Check if an operator is registered for a mode.
    pub fn contains(&self, name: &str, mode: Mode) -> bool {
        self.entry(name, mode).is_some()
    }

    /// Modes an operator is registered for.
    pub fn modes_for(&self, name: &str) -> ModeSet {
        let key = name.to_ascii_lowercase();
        self.entries
            .keys()
            .filter(|(n, _)| *n == key)
            .map(|(_, m)| *m)
            .collect()
    }

    /// Registered operator names in registration order, without repeats.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in self.entries.values() {
            let name = entry.descriptor.name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Distinct descriptors in registration order.
    pub fn descriptors(&self) -> Vec<Arc<OperationDescriptor>> {
        let mut seen: Vec<Arc<OperationDescriptor>> = Vec::new();
        for entry in self.entries.values() {
            if !seen.iter().any(|d| Arc::ptr_eq(d, &entry.descriptor)) {
                seen.push(Arc::clone(&entry.descriptor));
            }
        }
        seen
    }

    /// Search operators by name or description.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.names()
            .into_iter()
            .filter(|name| {
                let description = self
                    .entries
                    .values()
                    .find(|e| e.descriptor.name() == *name)
                    .map(|e| e.descriptor.description().to_lowercase())
                    .unwrap_or_default();
                name.to_lowercase().contains(&query) || description.contains(&query)
            })
            .collect()
    }

    /// Number of (operator, mode) registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========================================================================
    // Property rules
    // ========================================================================

    fn table_mut(&mut self, name: &str, mode: Mode) -> RegistryResult<&mut PropertyTable> {
        let entry = self
            .entries
            .get_mut(&(name.to_ascii_lowercase(), mode))
            .ok_or_else(|| RegistryError::NotFound {
                operation: name.to_string(),
                mode,
            })?;
        Ok(Arc::make_mut(&mut entry.properties))
    }

    /// Append a generator after the descriptor's own generators.
    pub fn add_property_generator(
        &mut self,
        name: &str,
        mode: Mode,
        generator: PropertyGenerator,
    ) -> RegistryResult<()> {
        self.table_mut(name, mode)?.add_generator(generator);
        Ok(())
    }

    /// Make nodes take `property` from their source at `source_index`.
    pub fn copy_property_from_source(
        &mut self,
        name: &str,
        mode: Mode,
        property: &str,
        source_index: usize,
    ) -> RegistryResult<()> {
        self.table_mut(name, mode)?.copy_from_source(property, source_index);
        Ok(())
    }

    pub fn suppress_property(&mut self, name: &str, mode: Mode, property: &str) -> RegistryResult<()> {
        self.table_mut(name, mode)?.suppress(property);
        Ok(())
    }

    pub fn suppress_all_properties(&mut self, name: &str, mode: Mode) -> RegistryResult<()> {
        self.table_mut(name, mode)?.suppress_all();
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

enum PropertyRule {
    Generator(String, Mode, PropertyGenerator),
    Copy(String, Mode, String, usize),
    Suppress(String, Mode, String),
    SuppressAll(String, Mode),
}

/// Builder for creating a customized registry.
pub struct RegistryBuilder {
    include_builtins: bool,
    descriptors: Vec<(OperationDescriptor, Option<ModeSet>)>,
    rules: Vec<PropertyRule>,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            include_builtins: true,
            descriptors: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Include or exclude the built-in operators.
    pub fn with_builtins(mut self, include: bool) -> Self {
        self.include_builtins = include;
        self
    }

    /// Register an operator under every mode it supports.
    pub fn register(mut self, descriptor: OperationDescriptor) -> Self {
        self.descriptors.push((descriptor, None));
        self
    }

    /// Register an operator under selected modes.
    pub fn register_modes(mut self, descriptor: OperationDescriptor, modes: impl IntoIterator<Item = Mode>) -> Self {
        self.descriptors.push((descriptor, Some(modes.into_iter().collect())));
        self
    }

    pub fn property_generator(mut self, name: &str, mode: Mode, generator: PropertyGenerator) -> Self {
        self.rules
            .push(PropertyRule::Generator(name.to_string(), mode, generator));
        self
    }

    pub fn copy_property_from_source(mut self, name: &str, mode: Mode, property: &str, source_index: usize) -> Self {
        self.rules.push(PropertyRule::Copy(
            name.to_string(),
            mode,
            property.to_string(),
            source_index,
        ));
        self
    }

    pub fn suppress_property(mut self, name: &str, mode: Mode, property: &str) -> Self {
        self.rules
            .push(PropertyRule::Suppress(name.to_string(), mode, property.to_string()));
        self
    }

    pub fn suppress_all_properties(mut self, name: &str, mode: Mode) -> Self {
        self.rules.push(PropertyRule::SuppressAll(name.to_string(), mode));
        self
    }

    /// Build the registry. Built-ins are registered first, then custom
    /// operators in order, then property rules.
    pub fn build(self) -> RegistryResult<OperationRegistry> {
        let mut registry = OperationRegistry::new();
        if self.include_builtins {
            crate::operators::register_all(&mut registry)?;
        }
        for (descriptor, modes) in self.descriptors {
            match modes {
                Some(modes) => registry.register(descriptor, modes.iter())?,
                None => registry.register_all_modes(descriptor)?,
            }
        }
        for rule in self.rules {
            match rule {
                PropertyRule::Generator(name, mode, g) => {
                    registry.add_property_generator(&name, mode, g)?
                }
                PropertyRule::Copy(name, mode, property, index) => {
                    registry.copy_property_from_source(&name, mode, &property, index)?
                }
                PropertyRule::Suppress(name, mode, property) => {
                    registry.suppress_property(&name, mode, &property)?
                }
                PropertyRule::SuppressAll(name, mode) => registry.suppress_all_properties(&name, mode)?,
            }
        }
        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Value;

    fn invert() -> OperationDescriptor {
        OperationDescriptor::builder("Invert")
            .description("Inverts pixel values")
            .modes([Mode::PixelGrid, Mode::ResolutionIndependent])
            .source("source0")
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = OperationRegistry::new();
        registry.register_all_modes(invert()).unwrap();

        assert!(registry.contains("invert", Mode::PixelGrid));
        assert!(registry.contains("INVERT", Mode::ResolutionIndependent));
        assert_eq!(registry.lookup("Invert", Mode::PixelGrid).unwrap().name(), "Invert");
        assert!(matches!(
            registry.lookup("Invert", Mode::Collection),
            Err(RegistryError::NotFound { .. })
        ));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Invert"]);
    }

    #[test]
    fn test_duplicate_registration_is_atomic() {
        let mut registry = OperationRegistry::new();
        registry.register(invert(), [Mode::PixelGrid]).unwrap();

        let err = registry
            .register(invert(), [Mode::ResolutionIndependent, Mode::PixelGrid])
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration { mode: Mode::PixelGrid, .. }));
        assert!(!registry.contains("Invert", Mode::ResolutionIndependent));
    }

    #[test]
    fn test_undeclared_mode_rejected() {
        let mut registry = OperationRegistry::new();
        let err = registry.register(invert(), [Mode::Collection]).unwrap_err();
        assert!(matches!(err, RegistryError::ModeNotDeclared { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_property_rules_do_not_touch_existing_tables() {
        let mut registry = OperationRegistry::new();
        registry.register_all_modes(invert()).unwrap();
        let before = registry.property_table("Invert", Mode::PixelGrid).unwrap();

        registry
            .add_property_generator(
                "invert",
                Mode::PixelGrid,
                PropertyGenerator::constant("inverted", Value::Boolean(true), ModeSet::all()),
            )
            .unwrap();
        let after = registry.property_table("Invert", Mode::PixelGrid).unwrap();

        assert!(before.generators().is_empty());
        assert_eq!(after.generators().len(), 1);
        assert!(registry
            .suppress_property("Missing", Mode::PixelGrid, "x")
            .is_err());
    }

    #[test]
    fn test_builder_without_builtins() {
        let registry = RegistryBuilder::new()
            .with_builtins(false)
            .register(invert())
            .suppress_property("Invert", Mode::PixelGrid, "complex")
            .build()
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry
            .property_table("Invert", Mode::PixelGrid)
            .unwrap()
            .is_suppressed("COMPLEX"));
    }

    #[test]
    fn test_search() {
        let mut registry = OperationRegistry::new();
        registry.register_all_modes(invert()).unwrap();
        assert_eq!(registry.search("pixel"), vec!["Invert"]);
        assert!(registry.search("nonexistent").is_empty());
    }
}
