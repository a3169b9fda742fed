//! Message keys and the provider that turns them into display text.
//!
//! The library never formats user-facing text itself beyond an English
//! fallback. Callers that localize plug in their own [`MessageProvider`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable message key plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub key: String,
    pub args: Vec<String>,
}

impl MessageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument (`{0}`, `{1}`, ...).
    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DefaultMessages.message(self) {
            Some(text) => f.write_str(&text),
            None if self.args.is_empty() => f.write_str(&self.key),
            None => write!(f, "{} ({})", self.key, self.args.join(", ")),
        }
    }
}

/// Maps message keys to display strings.
pub trait MessageProvider: Send + Sync {
    /// Display text for `key`, or `None` if the provider has no entry.
    fn message(&self, key: &MessageKey) -> Option<String>;
}

/// Built-in English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessages;

impl DefaultMessages {
    fn template(key: &str) -> Option<&'static str> {
        let text = match key {
            "validation.unsupported_mode" => "{0} does not support {1} mode",
            "validation.missing_source" => "{0} requires source {1}",
            "validation.source_type_mismatch" => "{0}: source {1} must be {2}, found {3}",
            "validation.source_collection_invalid" => "{0}: source collection {1} is invalid: {2}",
            "validation.missing_parameter" => "{0} requires parameter '{1}'",
            "validation.parameter_type_mismatch" => "{0}: parameter '{1}' must be {2}, found {3}",
            "validation.parameter_out_of_range" => "{0}: parameter '{1}' is out of range",
            "validation.unknown_parameter" => "{0} does not declare parameter '{1}'",
            "registry.duplicate_registration" => "{0} is already registered for {1} mode",
            "registry.mode_not_declared" => "{0} does not declare {1} mode",
            "registry.not_found" => "no operator named {0} is registered for {1} mode",
            "registry.invalid_descriptor" => "descriptor for {0} is invalid: {1}",

            "binarize.single_band" => "source must be single-banded, found {0} bands",
            "crop.empty_rectangle" => "crop rectangle must have positive width and height",
            "crop.outside_source" => "crop rectangle lies outside the source bounds",
            "lookup.empty_table" => "lookup table must contain at least one entry",
            "dft.odd_band_count" => "complex data needs an even band count, found {0}",
            "dither.band_mismatch" => "{0} dither masks supplied for {1} bands",
            "dither.size_mismatch" => "dither masks must all have the same size",
            "dither.value_range" => "dither mask values must lie in [0, 1]",
            "dither.colormap_bands" => "color map has {0} bands, source has {1}",
            "dither.colormap_type" => "color map holds {0} samples, source holds {1}",
            "color.band_mismatch" => "color space {0} expects {1} bands, found {2}",
            "collection.too_small" => "needs at least {0} members, found {1}",
            "collection.empty" => "collection has no members",
            "collection.no_collection_source" => "no source is a collection",
            "io.unknown_format" => "no codec is registered for format '{0}'",
            "io.cannot_encode" => "codec '{0}' cannot encode this source",
            "io.not_writable" => "cannot write to '{0}'",
            "io.sample_type" => "codec '{0}' does not support {1} samples",
            _ => return None,
        };
        Some(text)
    }
}

impl MessageProvider for DefaultMessages {
    fn message(&self, key: &MessageKey) -> Option<String> {
        let mut text = Self::template(&key.key)?.to_string();
        for (i, arg) in key.args.iter().enumerate() {
            text = text.replace(&format!("{{{}}}", i), arg);
        }
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_messages_substitute_args() {
        let key = MessageKey::new("binarize.single_band").arg(3);
        assert_eq!(
            DefaultMessages.message(&key).as_deref(),
            Some("source must be single-banded, found 3 bands")
        );
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        let key = MessageKey::new("custom.rule").arg("a");
        assert!(DefaultMessages.message(&key).is_none());
        assert_eq!(key.to_string(), "custom.rule (a)");
    }
}
