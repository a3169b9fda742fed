//! Core value and layout types.
//!
//! Parameters and properties share one closed value type. Validation
//! matches on the variant tag rather than on any runtime type identity:
//! - Closed set: every parameter kind an operator can declare is listed here
//! - Exhaustive matching catches missing cases at compile time
//! - serde handles the tagged representation natively

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A parameter or property value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// Boolean flag
    Boolean(bool),
    /// UTF-8 string
    String(String),
    /// Array of doubles (lookup tables, matrices, thresholds)
    DoubleArray(Vec<f64>),
    /// One member of a named enumeration
    Enumerated(EnumValue),
    /// A single convolution/dither kernel
    Kernel(Kernel),
    /// An ordered list of kernels (e.g. one per band)
    KernelList(Vec<Kernel>),
    /// Opaque reference to something the core never looks inside
    Handle(Handle),
}

/// Declared type of a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "inner")]
pub enum ValueType {
    Integer,
    Float,
    Boolean,
    String,
    DoubleArray,
    /// Enumeration identified by its type name
    Enumerated(String),
    Kernel,
    KernelList,
    /// Opaque handle identified by its type name
    Handle(String),
    /// Accepts any value
    Any,
}

/// A named member of an enumeration, e.g. `DataNature::COMPLEX_TO_REAL`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Name of the enumeration this member belongs to.
    pub type_name: String,
    /// Member name.
    pub name: String,
    /// Integral value of the member.
    pub value: i32,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, value: i32) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.name)
    }
}

/// A rectangular kernel with a key element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kernel {
    pub width: u32,
    pub height: u32,
    pub x_origin: u32,
    pub y_origin: u32,
    data: Vec<f32>,
}

impl Kernel {
    /// Create a kernel centred on its middle element.
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!("Kernel dimensions must be positive, got {}x{}", width, height));
        }
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(format!(
                "Kernel data length {} does not match {}x{}",
                data.len(),
                width,
                height
            ));
        }
        Ok(Self {
            width,
            height,
            x_origin: width / 2,
            y_origin: height / 2,
            data,
        })
    }

    /// Move the key element.
    pub fn with_origin(mut self, x: u32, y: u32) -> Result<Self, String> {
        if x >= self.width || y >= self.height {
            return Err(format!("Kernel origin ({}, {}) lies outside the kernel", x, y));
        }
        self.x_origin = x;
        self.y_origin = y;
        Ok(self)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// 3x3 box kernel with equal weights.
    pub fn box3() -> Self {
        Self {
            width: 3,
            height: 3,
            x_origin: 1,
            y_origin: 1,
            data: vec![1.0 / 9.0; 9],
        }
    }
}

/// Opaque reference passed through the graph untouched.
///
/// Equality is identity of the referenced object. Only the type name is
/// serialized; a deserialized handle is detached and refers to nothing.
#[derive(Clone)]
pub struct Handle {
    type_name: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Handle {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// A handle that keeps its type name but refers to no object.
    pub fn detached(type_name: impl Into<String>) -> Self {
        Self::new(type_name, Detached)
    }

    /// Whether this handle was read back from a description.
    pub fn is_detached(&self) -> bool {
        self.inner.is::<Detached>()
    }

    /// Borrow the referenced object if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

/// Referent of a detached handle.
#[derive(Debug)]
struct Detached;

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type_name", &self.type_name)
            .field("inner", &"<opaque>")
            .finish()
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.type_name)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Handle::detached)
    }
}

/// Storage type of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Byte,
    UShort,
    Short,
    Int,
    Float,
    Double,
}

impl SampleType {
    pub fn bits(&self) -> u32 {
        match self {
            SampleType::Byte => 8,
            SampleType::UShort | SampleType::Short => 16,
            SampleType::Int | SampleType::Float => 32,
            SampleType::Double => 64,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, SampleType::Float | SampleType::Double)
    }

    /// Parse a lowercase name such as `"byte"` or `"double"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "byte" => Some(SampleType::Byte),
            "ushort" => Some(SampleType::UShort),
            "short" => Some(SampleType::Short),
            "int" => Some(SampleType::Int),
            "float" => Some(SampleType::Float),
            "double" => Some(SampleType::Double),
            _ => None,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleType::Byte => "byte",
            SampleType::UShort => "ushort",
            SampleType::Short => "short",
            SampleType::Int => "int",
            SampleType::Float => "float",
            SampleType::Double => "double",
        };
        f.write_str(name)
    }
}

/// Raster layout of a pixel-grid image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageLayout {
    pub min_x: i32,
    pub min_y: i32,
    pub width: u32,
    pub height: u32,
    pub bands: u32,
    pub sample_type: SampleType,
}

impl ImageLayout {
    /// Layout anchored at the origin.
    pub fn new(width: u32, height: u32, bands: u32, sample_type: SampleType) -> Self {
        Self {
            min_x: 0,
            min_y: 0,
            width,
            height,
            bands,
            sample_type,
        }
    }

    pub fn with_origin(mut self, min_x: i32, min_y: i32) -> Self {
        self.min_x = min_x;
        self.min_y = min_y;
        self
    }

    pub fn max_x(&self) -> i64 {
        self.min_x as i64 + self.width as i64
    }

    pub fn max_y(&self) -> i64 {
        self.min_y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersection of the two bounds. Keeps the smaller band count and the
    /// wider sample type. Returns `None` when the bounds do not overlap.
    pub fn intersect(&self, other: &ImageLayout) -> Option<ImageLayout> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if max_x <= min_x as i64 || max_y <= min_y as i64 {
            return None;
        }
        Some(ImageLayout {
            min_x,
            min_y,
            width: (max_x - min_x as i64) as u32,
            height: (max_y - min_y as i64) as u32,
            bands: self.bands.min(other.bands),
            sample_type: self.sample_type.max(other.sample_type),
        })
    }

    /// Whether the rectangle `(x, y, w, h)` lies entirely inside these bounds.
    pub fn contains_rect(&self, x: f64, y: f64, width: f64, height: f64) -> bool {
        x >= self.min_x as f64
            && y >= self.min_y as f64
            && x + width <= self.max_x() as f64
            && y + height <= self.max_y() as f64
    }
}

/// Bounds of a resolution-independent image in user space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderableLayout {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
    pub bands: u32,
}

impl RenderableLayout {
    pub fn new(min_x: f32, min_y: f32, width: f32, height: f32, bands: u32) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
            bands,
        }
    }

    pub fn contains_rect(&self, x: f64, y: f64, width: f64, height: f64) -> bool {
        x >= self.min_x as f64
            && y >= self.min_y as f64
            && x + width <= (self.min_x + self.width) as f64
            && y + height <= (self.min_y + self.height) as f64
    }
}

/// Layout of either kind of image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "layout")]
pub enum Layout {
    Grid(ImageLayout),
    Renderable(RenderableLayout),
}

impl Layout {
    pub fn bands(&self) -> u32 {
        match self {
            Layout::Grid(l) => l.bands,
            Layout::Renderable(l) => l.bands,
        }
    }

    pub fn as_grid(&self) -> Option<&ImageLayout> {
        match self {
            Layout::Grid(l) => Some(l),
            Layout::Renderable(_) => None,
        }
    }

    pub fn as_renderable(&self) -> Option<&RenderableLayout> {
        match self {
            Layout::Renderable(l) => Some(l),
            Layout::Grid(_) => None,
        }
    }

    /// Whether the rectangle lies inside the layout's bounds.
    pub fn contains_rect(&self, x: f64, y: f64, width: f64, height: f64) -> bool {
        match self {
            Layout::Grid(l) => l.contains_rect(x, y, width, height),
            Layout::Renderable(l) => l.contains_rect(x, y, width, height),
        }
    }
}

// ============================================================================
// Value Implementation
// ============================================================================

impl Value {
    /// Tag of this value as a declared type.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Boolean(_) => ValueType::Boolean,
            Value::String(_) => ValueType::String,
            Value::DoubleArray(_) => ValueType::DoubleArray,
            Value::Enumerated(e) => ValueType::Enumerated(e.type_name.clone()),
            Value::Kernel(_) => ValueType::Kernel,
            Value::KernelList(_) => ValueType::KernelList,
            Value::Handle(h) => ValueType::Handle(h.type_name.clone()),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Numeric view used for range checks. Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_double_array(&self) -> Option<&[f64]> {
        if let Value::DoubleArray(values) = self {
            Some(values)
        } else {
            None
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        if let Value::Enumerated(e) = self {
            Some(e)
        } else {
            None
        }
    }

    pub fn as_kernel(&self) -> Option<&Kernel> {
        if let Value::Kernel(k) = self {
            Some(k)
        } else {
            None
        }
    }

    pub fn as_kernel_list(&self) -> Option<&[Kernel]> {
        if let Value::KernelList(k) = self {
            Some(k)
        } else {
            None
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        if let Value::Handle(h) = self {
            Some(h)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:.4}", fl),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::DoubleArray(arr) => write!(f, "DoubleArray[{}]", arr.len()),
            Value::Enumerated(e) => write!(f, "{}", e),
            Value::Kernel(k) => write!(f, "Kernel({}x{})", k.width, k.height),
            Value::KernelList(k) => write!(f, "KernelList[{}]", k.len()),
            Value::Handle(h) => write!(f, "Handle<{}>", h.type_name),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Value::Enumerated(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::DoubleArray(v)
    }
}

impl From<Kernel> for Value {
    fn from(v: Kernel) -> Self {
        Value::Kernel(v)
    }
}

impl From<Vec<Kernel>> for Value {
    fn from(v: Vec<Kernel>) -> Self {
        Value::KernelList(v)
    }
}

impl From<Handle> for Value {
    fn from(v: Handle) -> Self {
        Value::Handle(v)
    }
}

// ============================================================================
// ValueType Implementation
// ============================================================================

impl ValueType {
    /// Check if a value has this declared type. No implicit conversions.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Any, _) => true,
            (ValueType::Integer, Value::Integer(_)) => true,
            (ValueType::Float, Value::Float(_)) => true,
            (ValueType::Boolean, Value::Boolean(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::DoubleArray, Value::DoubleArray(_)) => true,
            (ValueType::Enumerated(name), Value::Enumerated(e)) => {
                name.eq_ignore_ascii_case(&e.type_name)
            }
            (ValueType::Kernel, Value::Kernel(_)) => true,
            (ValueType::KernelList, Value::KernelList(_)) => true,
            (ValueType::Handle(name), Value::Handle(h)) => name.eq_ignore_ascii_case(&h.type_name),
            _ => false,
        }
    }

    /// Whether min/max bounds make sense for this type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    pub fn display_name(&self) -> String {
        match self {
            ValueType::Integer => "Integer".to_string(),
            ValueType::Float => "Float".to_string(),
            ValueType::Boolean => "Boolean".to_string(),
            ValueType::String => "String".to_string(),
            ValueType::DoubleArray => "DoubleArray".to_string(),
            ValueType::Enumerated(name) => format!("Enum<{}>", name),
            ValueType::Kernel => "Kernel".to_string(),
            ValueType::KernelList => "KernelList".to_string(),
            ValueType::Handle(name) => format!("Handle<{}>", name),
            ValueType::Any => "Any".to_string(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
