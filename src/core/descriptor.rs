//! Operation descriptors.
//!
//! A descriptor is the immutable contract of one operator: which modes it
//! supports, what sources and parameters it takes, and the hooks used for
//! custom validation, layout derivation and property generation.
//! Descriptors are built once with [`DescriptorBuilder`] and shared behind
//! an `Arc`; graph construction never mutates them.

use crate::core::context::ValidationContext;
use crate::core::error::{RegistryError, ValidationResult};
use crate::core::mode::{Mode, ModeSet};
use crate::core::params::ParameterBlock;
use crate::core::source::SourceKind;
use crate::core::types::{EnumValue, Layout, Value, ValueType};
use crate::graph::properties::PropertyGenerator;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Operator-specific check run after the structural checks pass.
pub type CustomValidator = Arc<dyn Fn(&ValidationContext<'_>) -> ValidationResult<()> + Send + Sync>;

/// Pure function deriving the output layout from a validated block.
pub type LayoutFn = Arc<dyn Fn(Mode, &ParameterBlock) -> Option<Layout> + Send + Sync>;

/// A declared source slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub kind: SourceKind,
    pub required: bool,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Default for a declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamDefault {
    /// Substituted when the parameter is omitted
    Value(Value),
    /// The parameter must be supplied
    NoDefault,
}

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    pub fn contains(&self, v: f64) -> bool {
        self.min.map_or(true, |min| v >= min) && self.max.map_or(true, |max| v <= max)
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min = self.min.map(|m| m.to_string()).unwrap_or_else(|| "-inf".to_string());
        let max = self.max.map(|m| m.to_string()).unwrap_or_else(|| "+inf".to_string());
        write!(f, "[{}, {}]", min, max)
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Name, matched without regard to case
    pub name: String,
    /// Declared type
    pub value_type: ValueType,
    /// Default or `NoDefault`
    pub default: ParamDefault,
    /// Numeric bounds, for integer and float parameters
    pub range: Option<ValueRange>,
    /// Permitted members, for enumerated parameters
    pub valid_values: Vec<EnumValue>,
    /// Description for documentation
    pub description: String,
}

impl ParameterSpec {
    /// A parameter with no default.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: ParamDefault::NoDefault,
            range: None,
            valid_values: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = ParamDefault::Value(value.into());
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.range.get_or_insert_with(ValueRange::default).min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.range.get_or_insert_with(ValueRange::default).max = Some(max);
        self
    }

    pub fn with_range(self, min: f64, max: f64) -> Self {
        self.with_min(min).with_max(max)
    }

    pub fn with_valid_values(mut self, values: Vec<EnumValue>) -> Self {
        self.valid_values = values;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn has_default(&self) -> bool {
        matches!(self.default, ParamDefault::Value(_))
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.default {
            ParamDefault::Value(v) => Some(v),
            ParamDefault::NoDefault => None,
        }
    }

    /// Check a value that already has the declared type against the
    /// declared range or valid set. The error is a description of the
    /// violated constraint.
    pub fn check_constraints(&self, value: &Value) -> Result<(), String> {
        if let (Some(range), Some(v)) = (&self.range, value.as_float()) {
            if !range.contains(v) {
                return Err(range.to_string());
            }
        }
        if let (false, Some(e)) = (self.valid_values.is_empty(), value.as_enum()) {
            let valid = self
                .valid_values
                .iter()
                .any(|m| m.name.eq_ignore_ascii_case(&e.name) && m.value == e.value);
            if !valid {
                let names: Vec<&str> = self.valid_values.iter().map(|m| m.name.as_str()).collect();
                return Err(format!("{{{}}}", names.join(", ")));
            }
        }
        Ok(())
    }
}

/// The immutable contract of one operator.
#[derive(Clone)]
pub struct OperationDescriptor {
    name: String,
    vendor: String,
    description: String,
    version: String,
    modes: ModeSet,
    generic_sources: Vec<SourceSpec>,
    mode_sources: IndexMap<Mode, Vec<SourceSpec>>,
    collection_element: Mode,
    parameters: Vec<ParameterSpec>,
    immediate: bool,
    validator: Option<CustomValidator>,
    layout: Option<LayoutFn>,
    generators: Vec<PropertyGenerator>,
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("modes", &self.modes)
            .field("parameters", &self.parameters.len())
            .field("immediate", &self.immediate)
            .field("validator", &self.validator.as_ref().map(|_| "<closure>"))
            .field("generators", &self.generators.len())
            .finish()
    }
}

impl OperationDescriptor {
    /// Create a new descriptor builder.
    pub fn builder(name: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn supported_modes(&self) -> ModeSet {
        self.modes
    }

    pub fn supports(&self, mode: Mode) -> bool {
        self.modes.contains(mode)
    }

    /// Mode of the per-member nodes built in collection mode.
    pub fn collection_element_mode(&self) -> Mode {
        self.collection_element
    }

    /// Source slots for a mode.
    ///
    /// Slots declared for a specific mode win. Otherwise the generic slots
    /// are used with their kind following the mode; in collection mode the
    /// kind follows the element mode and the validator lifts it.
    pub fn source_specs(&self, mode: Mode) -> Vec<SourceSpec> {
        if let Some(specs) = self.mode_sources.get(&mode) {
            return specs.clone();
        }
        let kind_mode = if mode == Mode::Collection {
            self.collection_element
        } else {
            mode
        };
        self.generic_sources
            .iter()
            .map(|s| SourceSpec {
                kind: SourceKind::for_mode(kind_mode),
                ..s.clone()
            })
            .collect()
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Find a declared parameter by name, ignoring case.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Whether nodes of this operator are evaluated at creation.
    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub fn validator(&self) -> Option<&CustomValidator> {
        self.validator.as_ref()
    }

    /// Output layout for a validated block. Falls back to the layout of
    /// source 0.
    pub fn derive_layout(&self, mode: Mode, block: &ParameterBlock) -> Option<Layout> {
        match &self.layout {
            Some(f) => f(mode, block),
            None => block.source(0).and_then(|s| s.layout()),
        }
    }

    /// Generators declared for a mode, in declaration order.
    pub fn property_generators(&self, mode: Mode) -> impl Iterator<Item = &PropertyGenerator> {
        self.generators.iter().filter(move |g| g.applies_to(mode))
    }

    /// Serializable view of the declarative parts.
    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            name: self.name.clone(),
            vendor: self.vendor.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            modes: self.modes.iter().collect(),
            sources: self.modes.iter().map(|m| (m, self.source_specs(m))).collect(),
            parameters: self.parameters.clone(),
            immediate: self.immediate,
            custom_validation: self.validator.is_some(),
            properties: self
                .generators
                .iter()
                .flat_map(|g| g.names().iter().cloned())
                .collect(),
        }
    }
}

/// Serializable description of an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorSummary {
    pub name: String,
    pub vendor: String,
    pub description: String,
    pub version: String,
    pub modes: Vec<Mode>,
    pub sources: IndexMap<Mode, Vec<SourceSpec>>,
    pub parameters: Vec<ParameterSpec>,
    pub immediate: bool,
    pub custom_validation: bool,
    pub properties: Vec<String>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`OperationDescriptor`].
pub struct DescriptorBuilder {
    descriptor: OperationDescriptor,
}

impl DescriptorBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: OperationDescriptor {
                name: name.into(),
                vendor: "org.opgraph".to_string(),
                description: String::new(),
                version: "1.0".to_string(),
                modes: ModeSet::empty(),
                generic_sources: Vec::new(),
                mode_sources: IndexMap::new(),
                collection_element: Mode::PixelGrid,
                parameters: Vec::new(),
                immediate: false,
                validator: None,
                layout: None,
                generators: Vec::new(),
            },
        }
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.descriptor.vendor = vendor.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.descriptor.version = version.into();
        self
    }

    /// Declare the supported modes.
    pub fn modes(mut self, modes: impl IntoIterator<Item = Mode>) -> Self {
        self.descriptor.modes = modes.into_iter().collect();
        self
    }

    /// Add a required source slot whose kind follows the mode.
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.descriptor
            .generic_sources
            .push(SourceSpec::new(name, SourceKind::Any));
        self
    }

    /// Add an optional source slot whose kind follows the mode.
    pub fn optional_source(mut self, name: impl Into<String>) -> Self {
        self.descriptor
            .generic_sources
            .push(SourceSpec::new(name, SourceKind::Any).optional());
        self
    }

    /// Add a source slot for one mode only. Once a mode has explicit
    /// slots, the generic slots no longer apply to it.
    pub fn mode_source(mut self, mode: Mode, spec: SourceSpec) -> Self {
        self.descriptor.mode_sources.entry(mode).or_default().push(spec);
        self
    }

    /// Declare that a mode takes no sources at all.
    pub fn no_sources(mut self, mode: Mode) -> Self {
        self.descriptor.mode_sources.entry(mode).or_default();
        self
    }

    /// Mode of the member nodes built in collection mode.
    pub fn collection_element(mut self, mode: Mode) -> Self {
        self.descriptor.collection_element = mode;
        self
    }

    pub fn parameter(mut self, spec: ParameterSpec) -> Self {
        self.descriptor.parameters.push(spec);
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.descriptor.immediate = immediate;
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&ValidationContext<'_>) -> ValidationResult<()> + Send + Sync + 'static,
    {
        self.descriptor.validator = Some(Arc::new(f));
        self
    }

    pub fn layout<F>(mut self, f: F) -> Self
    where
        F: Fn(Mode, &ParameterBlock) -> Option<Layout> + Send + Sync + 'static,
    {
        self.descriptor.layout = Some(Arc::new(f));
        self
    }

    pub fn property_generator(mut self, generator: PropertyGenerator) -> Self {
        self.descriptor.generators.push(generator);
        self
    }

    /// Build the descriptor, checking its internal consistency.
    pub fn build(self) -> Result<OperationDescriptor, RegistryError> {
        let d = self.descriptor;
        let invalid = |reason: String| RegistryError::InvalidDescriptor {
            operation: d.name.clone(),
            reason,
        };

        if d.name.trim().is_empty() {
            return Err(invalid("operator name is empty".to_string()));
        }
        if d.modes.is_empty() {
            return Err(invalid("no supported modes".to_string()));
        }
        if d.collection_element == Mode::Collection {
            return Err(invalid("collection element mode cannot be collection".to_string()));
        }
        for (i, p) in d.parameters.iter().enumerate() {
            if d.parameters[..i].iter().any(|q| q.name.eq_ignore_ascii_case(&p.name)) {
                return Err(invalid(format!("parameter '{}' declared twice", p.name)));
            }
            if let Some(default) = p.default_value() {
                if !p.value_type.matches(default) {
                    return Err(invalid(format!(
                        "default for '{}' is {}, declared {}",
                        p.name,
                        default.value_type(),
                        p.value_type
                    )));
                }
                if let Err(constraint) = p.check_constraints(default) {
                    return Err(invalid(format!(
                        "default for '{}' is outside {}",
                        p.name, constraint
                    )));
                }
            }
            if p.range.is_some() && !p.value_type.is_numeric() {
                return Err(invalid(format!("range declared on non-numeric '{}'", p.name)));
            }
        }
        Ok(d)
    }
}
