//! Parameter blocks.
//!
//! A parameter block bundles the sources and parameters for one node
//! construction. Parameters can be supplied by name or by position; the
//! validator binds both forms to the descriptor's declared parameters and
//! hands back a block with every parameter named, in declared order.

use crate::core::source::Source;
use crate::core::types::{EnumValue, Handle, Kernel, Value};

#[derive(Debug, Clone, PartialEq)]
struct ParamEntry {
    name: Option<String>,
    value: Value,
}

/// Ordered sources plus ordered parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterBlock {
    sources: Vec<Source>,
    params: Vec<ParamEntry>,
}

impl ParameterBlock {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Sources
    // ========================================================================

    /// Append a source (builder form).
    pub fn with_source(mut self, source: impl Into<Source>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn add_source(&mut self, source: impl Into<Source>) {
        self.sources.push(source.into());
    }

    /// Replace the source at `index`. Returns false if out of range.
    pub fn set_source(&mut self, index: usize, source: impl Into<Source>) -> bool {
        match self.sources.get_mut(index) {
            Some(slot) => {
                *slot = source.into();
                true
            }
            None => false,
        }
    }

    /// Move the sources out, leaving the block without any.
    pub(crate) fn take_sources(&mut self) -> Vec<Source> {
        std::mem::take(&mut self.sources)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn source(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    pub fn num_sources(&self) -> usize {
        self.sources.len()
    }

    /// Same parameters, different sources.
    pub fn with_sources_replaced(&self, sources: Vec<Source>) -> Self {
        Self {
            sources,
            params: self.params.clone(),
        }
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Set a named parameter (builder form).
    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Set a named parameter, replacing any earlier value under the same
    /// name regardless of case.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.named_index(name) {
            Some(i) => self.params[i].value = value,
            None => self.params.push(ParamEntry {
                name: Some(name.to_string()),
                value,
            }),
        }
    }

    /// Append a positional parameter. The n-th positional parameter binds
    /// to the n-th declared parameter.
    pub fn add_parameter(&mut self, value: impl Into<Value>) {
        self.params.push(ParamEntry {
            name: None,
            value: value.into(),
        });
    }

    /// Positional parameter (builder form).
    pub fn with_positional(mut self, value: impl Into<Value>) -> Self {
        self.add_parameter(value);
        self
    }

    /// Drop every parameter, keeping the sources.
    pub fn clear_parameters(&mut self) {
        self.params.clear();
    }

    /// Remove a named parameter, returning its value.
    pub fn remove_parameter(&mut self, name: &str) -> Option<Value> {
        self.named_index(name).map(|i| self.params.remove(i).value)
    }

    /// Look up a named parameter, ignoring case.
    pub fn get_parameter(&self, name: &str) -> Option<&Value> {
        self.named_index(name).map(|i| &self.params[i].value)
    }

    /// Parameter at a position in the block, named or not.
    pub fn parameter_at(&self, index: usize) -> Option<&Value> {
        self.params.get(index).map(|p| &p.value)
    }

    /// Number of parameter entries.
    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    /// Names of the named entries, in insertion order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter_map(|p| p.name.as_deref())
    }

    /// Named entries as pairs, in insertion order.
    pub fn named_parameters(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params
            .iter()
            .filter_map(|p| p.name.as_deref().map(|n| (n, &p.value)))
    }

    /// Positional entries, in insertion order.
    pub(crate) fn positional_parameters(&self) -> impl Iterator<Item = &Value> {
        self.params.iter().filter(|p| p.name.is_none()).map(|p| &p.value)
    }

    fn named_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| {
            p.name
                .as_deref()
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
    }

    // ========================================================================
    // Typed getters
    // ========================================================================

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get_parameter(name).and_then(|v| v.as_integer())
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get_parameter(name).and_then(|v| v.as_float())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_parameter(name).and_then(|v| v.as_bool())
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get_parameter(name).and_then(|v| v.as_string())
    }

    pub fn get_double_array(&self, name: &str) -> Option<&[f64]> {
        self.get_parameter(name).and_then(|v| v.as_double_array())
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumValue> {
        self.get_parameter(name).and_then(|v| v.as_enum())
    }

    pub fn get_kernel(&self, name: &str) -> Option<&Kernel> {
        self.get_parameter(name).and_then(|v| v.as_kernel())
    }

    pub fn get_kernel_list(&self, name: &str) -> Option<&[Kernel]> {
        self.get_parameter(name).and_then(|v| v.as_kernel_list())
    }

    pub fn get_handle(&self, name: &str) -> Option<&Handle> {
        self.get_parameter(name).and_then(|v| v.as_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::SourceImage;
    use crate::core::types::{ImageLayout, SampleType};

    #[test]
    fn test_named_parameters_ignore_case() {
        let mut pb = ParameterBlock::new().with_parameter("Width", 10i64);
        pb.set_parameter("WIDTH", 20i64);
        assert_eq!(pb.num_parameters(), 1);
        assert_eq!(pb.get_int("width"), Some(20));
        assert_eq!(pb.parameter_names().collect::<Vec<_>>(), vec!["Width"]);
    }

    #[test]
    fn test_positional_parameters_keep_order() {
        let pb = ParameterBlock::new()
            .with_positional(1i64)
            .with_parameter("name", "x")
            .with_positional(2.5);
        let positional: Vec<_> = pb.positional_parameters().cloned().collect();
        assert_eq!(positional, vec![Value::Integer(1), Value::Float(2.5)]);
        assert_eq!(pb.parameter_at(1), Some(&Value::String("x".into())));
    }

    #[test]
    fn test_remove_parameter() {
        let mut pb = ParameterBlock::new().with_parameter("threshold", 0.5);
        assert_eq!(pb.remove_parameter("THRESHOLD"), Some(Value::Float(0.5)));
        assert!(pb.get_parameter("threshold").is_none());
    }

    #[test]
    fn test_sources() {
        let img = SourceImage::new(ImageLayout::new(8, 8, 1, SampleType::Byte));
        let mut pb = ParameterBlock::new().with_source(img.clone());
        assert_eq!(pb.num_sources(), 1);
        assert!(pb.set_source(0, img.clone()));
        assert!(!pb.set_source(3, img));
        let replaced = pb.with_sources_replaced(Vec::new());
        assert_eq!(replaced.num_sources(), 0);
    }
}
