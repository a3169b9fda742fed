//! Codec capability table.
//!
//! I/O operators consult this table during validation to decide whether a
//! named format exists and can encode a given source. The table only
//! describes capabilities; the bytes are produced by the renderer.

use crate::core::types::{ImageLayout, SampleType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Capabilities of one codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecInfo {
    /// Format name (e.g. "tiff")
    pub name: String,
    /// File extensions without dots
    pub extensions: Vec<String>,
    pub can_encode: bool,
    pub can_decode: bool,
    /// Sample types the encoder accepts
    pub sample_types: Vec<SampleType>,
    /// Band counts the encoder accepts; empty means any
    pub band_counts: Vec<u32>,
}

impl CodecInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: Vec::new(),
            can_encode: true,
            can_decode: true,
            sample_types: vec![SampleType::Byte],
            band_counts: Vec::new(),
        }
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn sample_types(mut self, types: &[SampleType]) -> Self {
        self.sample_types = types.to_vec();
        self
    }

    pub fn band_counts(mut self, counts: &[u32]) -> Self {
        self.band_counts = counts.to_vec();
        self
    }

    pub fn decode_only(mut self) -> Self {
        self.can_encode = false;
        self
    }

    /// Whether the encoder accepts an image with this layout.
    pub fn can_encode_layout(&self, layout: &ImageLayout) -> bool {
        self.can_encode
            && self.sample_types.contains(&layout.sample_type)
            && (self.band_counts.is_empty() || self.band_counts.contains(&layout.bands))
    }

    /// Matching format in the `image` crate, if it has one.
    pub fn image_format(&self) -> Option<image::ImageFormat> {
        image::ImageFormat::from_extension(&self.name).or_else(|| {
            self.extensions
                .iter()
                .find_map(|e| image::ImageFormat::from_extension(e))
        })
    }
}

/// Table of codecs keyed by lowercase name.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: IndexMap<String, CodecInfo>,
}

impl CodecRegistry {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the common raster formats.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            CodecInfo::new("tiff")
                .extensions(&["tif", "tiff"])
                .sample_types(&[
                    SampleType::Byte,
                    SampleType::UShort,
                    SampleType::Short,
                    SampleType::Int,
                    SampleType::Float,
                    SampleType::Double,
                ]),
        );
        registry.register(
            CodecInfo::new("png")
                .extensions(&["png"])
                .sample_types(&[SampleType::Byte, SampleType::UShort])
                .band_counts(&[1, 2, 3, 4]),
        );
        registry.register(
            CodecInfo::new("jpeg")
                .extensions(&["jpg", "jpeg"])
                .band_counts(&[1, 3]),
        );
        registry.register(CodecInfo::new("bmp").extensions(&["bmp"]).band_counts(&[1, 3, 4]));
        registry.register(
            CodecInfo::new("pnm")
                .extensions(&["pbm", "pgm", "ppm"])
                .sample_types(&[SampleType::Byte, SampleType::UShort])
                .band_counts(&[1, 3]),
        );
        registry.register(CodecInfo::new("gif").extensions(&["gif"]).decode_only());
        registry
    }

    /// Shared table with the default codecs.
    pub fn global() -> &'static CodecRegistry {
        static INSTANCE: OnceLock<CodecRegistry> = OnceLock::new();
        INSTANCE.get_or_init(CodecRegistry::with_defaults)
    }

    /// Register a codec, replacing any codec with the same name.
    pub fn register(&mut self, info: CodecInfo) {
        self.codecs.insert(info.name.to_ascii_lowercase(), info);
    }

    /// Find a codec by name or extension, ignoring case.
    pub fn get(&self, name: &str) -> Option<&CodecInfo> {
        let key = name.to_ascii_lowercase();
        self.codecs.get(&key).or_else(|| {
            self.codecs
                .values()
                .find(|c| c.extensions.iter().any(|e| e.eq_ignore_ascii_case(&key)))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codecs.values().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_extension() {
        let codecs = CodecRegistry::with_defaults();
        assert!(codecs.contains("TIFF"));
        assert_eq!(codecs.get("jpg").map(|c| c.name.as_str()), Some("jpeg"));
        assert!(codecs.get("exr").is_none());
    }

    #[test]
    fn test_encode_capabilities() {
        let codecs = CodecRegistry::with_defaults();
        let rgb = ImageLayout::new(10, 10, 3, SampleType::Byte);
        let float = ImageLayout::new(10, 10, 3, SampleType::Float);
        let five = ImageLayout::new(10, 10, 5, SampleType::Byte);

        let png = codecs.get("png").unwrap();
        assert!(png.can_encode_layout(&rgb));
        assert!(!png.can_encode_layout(&float));
        assert!(!png.can_encode_layout(&five));
        assert!(codecs.get("tiff").unwrap().can_encode_layout(&float));
        assert!(!codecs.get("gif").unwrap().can_encode_layout(&rgb));
    }

    #[test]
    fn test_image_format_mapping() {
        let codecs = CodecRegistry::with_defaults();
        assert_eq!(codecs.get("png").unwrap().image_format(), Some(image::ImageFormat::Png));
        assert_eq!(codecs.get("tiff").unwrap().image_format(), Some(image::ImageFormat::Tiff));
    }
}
