//! Immediate I/O operators.
//!
//! `FileStore` and `Encode` exist for their external effect, so nodes of
//! these operators are evaluated while they are created. Validation only
//! consults the codec table and the file system metadata; it never writes.

use crate::core::context::ValidationContext;
use crate::core::descriptor::{OperationDescriptor, ParameterSpec};
use crate::core::error::{RegistryResult, ValidationResult};
use crate::core::messages::MessageKey;
use crate::core::mode::Mode;
use crate::core::types::{Handle, ValueType};
use crate::graph::node::Node;
use crate::registry::codec::CodecRegistry;
use crate::registry::operation::OperationRegistry;
use image::DynamicImage;
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::Path;

/// Handle type name of the `stream` parameter.
pub const OUTPUT_STREAM: &str = "OutputStream";

const DEFAULT_FORMAT: &str = "tiff";

/// Register I/O operators.
pub fn register(registry: &mut OperationRegistry) -> RegistryResult<()> {
    registry.register_all_modes(file_store()?)?;
    registry.register_all_modes(encode()?)?;
    Ok(())
}

/// Writes an image to a file.
pub fn file_store() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("FileStore")
        .description("Stores an image to a file")
        .modes([Mode::PixelGrid])
        .source("source0")
        .immediate(true)
        .parameter(ParameterSpec::new("filename", ValueType::String))
        .parameter(ParameterSpec::new("format", ValueType::String).with_default(DEFAULT_FORMAT))
        .parameter(ParameterSpec::new("checkFileLocally", ValueType::Boolean).with_default(true))
        .validator(|ctx| {
            check_codec(ctx)?;
            let local = ctx.get_bool("checkFileLocally").unwrap_or(true);
            match ctx.get_string("filename") {
                Some(filename) if local && !is_writable(Path::new(filename)) => {
                    Err(ctx.fail(MessageKey::new("io.not_writable").arg(filename)))
                }
                _ => Ok(()),
            }
        })
        .build()
}

/// Encodes an image into an output stream.
pub fn encode() -> RegistryResult<OperationDescriptor> {
    OperationDescriptor::builder("Encode")
        .description("Encodes an image into an output stream")
        .modes([Mode::PixelGrid])
        .source("source0")
        .immediate(true)
        .parameter(ParameterSpec::new("stream", ValueType::Handle(OUTPUT_STREAM.to_string())))
        .parameter(ParameterSpec::new("format", ValueType::String).with_default(DEFAULT_FORMAT))
        .validator(check_codec)
        .build()
}

/// The named codec must exist and accept the source layout.
fn check_codec(ctx: &ValidationContext<'_>) -> ValidationResult<()> {
    let format = ctx.get_string("format").unwrap_or(DEFAULT_FORMAT);
    let codec = ctx
        .codecs()
        .get(format)
        .ok_or_else(|| ctx.fail(MessageKey::new("io.unknown_format").arg(format)))?;
    if !codec.can_encode {
        return Err(ctx.fail(MessageKey::new("io.cannot_encode").arg(&codec.name)));
    }
    if let Some(layout) = ctx.source_layout(0).and_then(|l| l.as_grid().copied()) {
        if !codec.sample_types.contains(&layout.sample_type) {
            return Err(ctx.fail(
                MessageKey::new("io.sample_type")
                    .arg(&codec.name)
                    .arg(layout.sample_type),
            ));
        }
        if !codec.can_encode_layout(&layout) {
            return Err(ctx
                .fail(MessageKey::new("io.cannot_encode").arg(&codec.name))
                .with_context("bands", layout.bands));
        }
    }
    Ok(())
}

/// Whether a file could be created or replaced at `path`.
fn is_writable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && !meta.permissions().readonly(),
        Err(_) => {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::metadata(parent)
                .map(|m| m.is_dir() && !m.permissions().readonly())
                .unwrap_or(false)
        }
    }
}

// ============================================================================
// Output sinks
// ============================================================================

/// In-memory byte sink for the `Encode` operator.
#[derive(Debug, Default)]
pub struct OutputStream {
    buffer: Mutex<Vec<u8>>,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh stream for use as a parameter value.
    pub fn handle() -> Handle {
        Handle::new(OUTPUT_STREAM, OutputStream::new())
    }

    pub fn write(&self, bytes: &[u8]) {
        self.buffer.lock().extend_from_slice(bytes);
    }

    /// Copy of everything written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deliver a rendered image to the sink of a `FileStore` or `Encode` node.
///
/// Renderers call this after producing the pixels of an I/O node. Nodes of
/// other operators are ignored.
pub fn write_output(node: &Node, image: &DynamicImage, codecs: &CodecRegistry) -> Result<(), String> {
    let block = node.parameters();
    let format_name = block.get_string("format").unwrap_or(DEFAULT_FORMAT);
    let format = codecs
        .get(format_name)
        .and_then(|c| c.image_format())
        .ok_or_else(|| format!("no encoder available for '{}'", format_name))?;

    match node.operation_name() {
        "FileStore" => {
            let filename = block
                .get_string("filename")
                .ok_or_else(|| "FileStore node has no filename".to_string())?;
            image
                .save_with_format(filename, format)
                .map_err(|e| format!("failed to write {}: {}", filename, e))
        }
        "Encode" => {
            let stream = block
                .get_handle("stream")
                .and_then(|h| h.downcast_ref::<OutputStream>())
                .ok_or_else(|| "Encode node has no output stream".to_string())?;
            let mut bytes = Cursor::new(Vec::new());
            image
                .write_to(&mut bytes, format)
                .map_err(|e| format!("failed to encode: {}", e))?;
            stream.write(bytes.get_ref());
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ValidationError, ValidationErrorKind};
    use crate::core::params::ParameterBlock;
    use crate::core::source::SourceImage;
    use crate::core::types::{ImageLayout, SampleType, Value};
    use crate::validation::ValidationPipeline;

    fn source(bands: u32, sample_type: SampleType) -> SourceImage {
        SourceImage::new(ImageLayout::new(4, 4, bands, sample_type))
    }

    fn run(d: &OperationDescriptor, block: ParameterBlock) -> Result<ParameterBlock, ValidationError> {
        ValidationPipeline::standard().validate(d, Mode::PixelGrid, &block, &CodecRegistry::with_defaults())
    }

    #[test]
    fn test_file_store_defaults_and_writable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tiff");
        let block = ParameterBlock::new()
            .with_source(source(3, SampleType::Byte))
            .with_parameter("filename", path.to_str().unwrap());
        let validated = run(&file_store().unwrap(), block).unwrap();
        assert_eq!(validated.get_parameter("format"), Some(&Value::from("tiff")));
        assert_eq!(validated.get_parameter("checkFileLocally"), Some(&Value::Boolean(true)));
        assert!(!path.exists());
    }

    #[test]
    fn test_file_store_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.tiff");
        let block = ParameterBlock::new()
            .with_source(source(1, SampleType::Byte))
            .with_parameter("filename", path.to_str().unwrap());
        let err = run(&file_store().unwrap(), block.clone()).unwrap_err();
        assert_eq!(err.message_key().key, "io.not_writable");

        let unchecked = block.with_parameter("checkFileLocally", false);
        assert!(run(&file_store().unwrap(), unchecked).is_ok());
    }

    #[test]
    fn test_codec_rules() {
        let d = encode().unwrap();
        let with = |bands, sample_type, format: &str| {
            ParameterBlock::new()
                .with_source(source(bands, sample_type))
                .with_parameter("stream", Value::Handle(OutputStream::handle()))
                .with_parameter("format", format)
        };

        let err = run(&d, with(1, SampleType::Byte, "webp")).unwrap_err();
        assert_eq!(err.message_key().key, "io.unknown_format");

        let err = run(&d, with(1, SampleType::Byte, "gif")).unwrap_err();
        assert_eq!(err.message_key().key, "io.cannot_encode");

        let err = run(&d, with(1, SampleType::Float, "png")).unwrap_err();
        assert_eq!(err.message_key().key, "io.sample_type");

        let err = run(&d, with(4, SampleType::Byte, "JPEG")).unwrap_err();
        assert_eq!(err.kind(), ValidationErrorKind::CustomValidationFailed);

        assert!(run(&d, with(3, SampleType::Float, "tiff")).is_ok());
    }

    #[test]
    fn test_output_stream_collects_bytes() {
        let handle = OutputStream::handle();
        let stream = handle.downcast_ref::<OutputStream>().unwrap();
        assert!(stream.is_empty());
        stream.write(b"II*");
        assert_eq!(stream.bytes(), b"II*".to_vec());
    }
}
