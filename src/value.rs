//! The token type that flows between pipes.
//!
//! The runtime is type-erased by design: a [`Value`] carries whatever shape a stage
//! produces, and the next stage in line declares the shape it expects. A closed set of
//! scalar and collection variants covers most stages; [`Value::Dynamic`] is the escape
//! hatch for stage-specific structs (the demo's `Product`, for instance) that don't need
//! a dedicated variant of their own.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::error::PipelineError;

/// A token flowing between pipes.
#[derive(Clone)]
pub enum Value {
    /// No payload. The default source/sink token for pipelines that only care about side effects.
    Unit,
    /// A boolean, typically produced by a `Decider`.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// An ordered collection of values, as produced by a `Splitter` or consumed by a `Joiner`.
    List(Vec<Value>),
    /// An opaque payload for shapes that don't warrant their own variant.
    Dynamic(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wraps an arbitrary `Send + Sync` payload as a [`Value::Dynamic`].
    pub fn new<T>(payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Value::Dynamic(Arc::new(payload))
    }

    /// Borrows the dynamic payload as `T`, failing with [`PipelineError::TypeMismatch`] if the
    /// variant isn't [`Value::Dynamic`] or the payload isn't a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Result<&T, PipelineError> {
        match self {
            Value::Dynamic(payload) => {
                payload
                    .downcast_ref::<T>()
                    .ok_or(PipelineError::TypeMismatch {
                        expected: type_name::<T>(),
                        found: "dynamic(other)",
                    })
            }
            other => Err(PipelineError::TypeMismatch {
                expected: type_name::<T>(),
                found: other.shape_name(),
            }),
        }
    }

    /// Clones the dynamic payload out as `T`. See [`Value::downcast_ref`].
    pub fn downcast<T: Any + Clone>(&self) -> Result<T, PipelineError> {
        self.downcast_ref::<T>().map(Clone::clone)
    }

    /// Extracts a [`bool`], failing with [`PipelineError::TypeMismatch`] otherwise.
    pub fn as_bool(&self) -> Result<bool, PipelineError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(PipelineError::TypeMismatch {
                expected: "bool",
                found: other.shape_name(),
            }),
        }
    }

    /// Extracts an [`i64`], failing with [`PipelineError::TypeMismatch`] otherwise.
    pub fn as_int(&self) -> Result<i64, PipelineError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(PipelineError::TypeMismatch {
                expected: "int",
                found: other.shape_name(),
            }),
        }
    }

    /// Extracts an [`f64`], failing with [`PipelineError::TypeMismatch`] otherwise.
    pub fn as_float(&self) -> Result<f64, PipelineError> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(PipelineError::TypeMismatch {
                expected: "float",
                found: other.shape_name(),
            }),
        }
    }

    /// Borrows the string payload, failing with [`PipelineError::TypeMismatch`] otherwise.
    pub fn as_str(&self) -> Result<&str, PipelineError> {
        match self {
            Value::Str(s) => Ok(s.as_str()),
            other => Err(PipelineError::TypeMismatch {
                expected: "str",
                found: other.shape_name(),
            }),
        }
    }

    /// Borrows the list payload, failing with [`PipelineError::TypeMismatch`] otherwise.
    pub fn as_list(&self) -> Result<&[Value], PipelineError> {
        match self {
            Value::List(items) => Ok(items.as_slice()),
            other => Err(PipelineError::TypeMismatch {
                expected: "list",
                found: other.shape_name(),
            }),
        }
    }

    /// Consumes self and returns the list payload, failing with [`PipelineError::TypeMismatch`] otherwise.
    pub fn into_list(self) -> Result<Vec<Value>, PipelineError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(PipelineError::TypeMismatch {
                expected: "list",
                found: other.shape_name(),
            }),
        }
    }

    fn shape_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dynamic(_) => "dynamic",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "Unit"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Dynamic(_) => write!(f, "Dynamic(..)"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
