//! The closed set of descriptors a node class may declare.
//!
//! Descriptors are pure metadata; per-instance storage lives in the node's
//! cell map and is keyed by descriptor key. Declaration order is preserved by
//! the class builder and becomes the rendering order in the editor.

use super::datatype::DataType;
use crate::error::{CortexError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An input port: receives one upstream signal per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPort {
    /// Cell key (also the connection endpoint key).
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Declared data type.
    pub data_type: DataType,
}

impl InputPort {
    /// Create an input port.
    pub fn new(key: impl Into<String>, label: impl Into<String>, data_type: DataType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            data_type,
        }
    }
}

/// An output port: written by node code, published as a signal downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPort {
    /// Cell key (also the connection endpoint key).
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Declared data type.
    pub data_type: DataType,
}

impl OutputPort {
    /// Create an output port.
    pub fn new(key: impl Into<String>, label: impl Into<String>, data_type: DataType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            data_type,
        }
    }
}

/// The kind of a tunable property, with kind-specific validation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyKind {
    /// Bounded float; writes are clamped into `[min, max]`.
    Range {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// UI scale hint.
        scale: Scale,
    },
    /// Integer with optional bounds; writes are clamped when bounds are set.
    Integer {
        /// Optional lower bound.
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        /// Optional upper bound.
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// Boolean toggle.
    Bool,
    /// One of a fixed set of string options.
    Enum {
        /// The allowed options.
        options: Vec<String>,
    },
}

/// UI scale hint for range properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    /// Linear slider.
    #[default]
    Linear,
    /// Logarithmic slider.
    Log,
}

/// A user-tunable parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    /// Cell key.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Kind and validation metadata.
    #[serde(flatten)]
    pub kind: PropertyKind,
    /// Default value.
    pub default: Value,
    /// Optional on-change callback name, dispatched through
    /// `NodeBehavior::property_changed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_change: Option<String>,
}

impl Property {
    /// A bounded float property with a linear scale.
    pub fn range(
        key: impl Into<String>,
        label: impl Into<String>,
        default: f64,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: PropertyKind::Range {
                min,
                max,
                scale: Scale::Linear,
            },
            default: Value::Float(default),
            on_change: None,
        }
    }

    /// An unbounded integer property.
    pub fn integer(key: impl Into<String>, label: impl Into<String>, default: i64) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: PropertyKind::Integer {
                min: None,
                max: None,
            },
            default: Value::Int(default),
            on_change: None,
        }
    }

    /// A boolean property.
    pub fn toggle(key: impl Into<String>, label: impl Into<String>, default: bool) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: PropertyKind::Bool,
            default: Value::Bool(default),
            on_change: None,
        }
    }

    /// An enumerated property.
    pub fn choice(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: PropertyKind::Enum { options },
            default: Value::Str(default.into()),
            on_change: None,
        }
    }

    /// Switch a range property to a log scale.
    pub fn log_scale(mut self) -> Self {
        if let PropertyKind::Range { scale, .. } = &mut self.kind {
            *scale = Scale::Log;
        }
        self
    }

    /// Set integer bounds.
    pub fn bounds(mut self, lower: i64, upper: i64) -> Self {
        if let PropertyKind::Integer { min, max } = &mut self.kind {
            *min = Some(lower);
            *max = Some(upper);
        }
        self
    }

    /// Declare an on-change callback name.
    pub fn on_change(mut self, callback: impl Into<String>) -> Self {
        self.on_change = Some(callback.into());
        self
    }

    /// Coerce and clamp a candidate value per this property's kind.
    ///
    /// Returns the value that would be stored, or `Validation` if the
    /// candidate cannot be coerced.
    pub fn coerce(&self, value: &Value) -> Result<Value> {
        match &self.kind {
            PropertyKind::Range { min, max, .. } => {
                let v = value.as_f64().ok_or_else(|| self.bad_value(value))?;
                Ok(Value::Float(v.clamp(*min, *max)))
            }
            PropertyKind::Integer { min, max } => {
                let v = match value {
                    Value::Int(i) => *i,
                    Value::Float(f) => *f as i64,
                    _ => return Err(self.bad_value(value)),
                };
                let v = match (min, max) {
                    (Some(lo), _) if v < *lo => *lo,
                    (_, Some(hi)) if v > *hi => *hi,
                    _ => v,
                };
                Ok(Value::Int(v))
            }
            PropertyKind::Bool => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::Float(f) => Ok(Value::Bool(*f != 0.0)),
                _ => Err(self.bad_value(value)),
            },
            PropertyKind::Enum { options } => {
                let s = value.as_str().ok_or_else(|| self.bad_value(value))?;
                if options.iter().any(|o| o == s) {
                    Ok(Value::Str(s.to_string()))
                } else {
                    Err(CortexError::validation(
                        &self.key,
                        format!("must be one of {options:?}, got '{s}'"),
                    ))
                }
            }
        }
    }

    fn bad_value(&self, value: &Value) -> CortexError {
        CortexError::validation(
            &self.key,
            format!("cannot coerce {} value", value.type_name()),
        )
    }
}

/// The kind of a display, with render hints for the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayKind {
    /// A scalar readout.
    Numeric {
        /// Number format hint (e.g. `.4f`).
        format: String,
    },
    /// A text readout.
    Text,
    /// A 1D array visualization.
    #[serde(rename = "vector1d")]
    Vector1D,
    /// A 2D array visualization.
    #[serde(rename = "vector2d")]
    Vector2D {
        /// Colormap hint (e.g. `grayscale`, `bwr`).
        color_mode: String,
    },
}

/// A display-only output streamed to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Display {
    /// Cell key.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Kind and render hints.
    #[serde(flatten)]
    pub kind: DisplayKind,
}

impl Display {
    /// A scalar readout with the default `.4f` format.
    pub fn numeric(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: DisplayKind::Numeric {
                format: ".4f".to_string(),
            },
        }
    }

    /// A text readout.
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: DisplayKind::Text,
        }
    }

    /// A 1D array visualization.
    pub fn vector1d(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: DisplayKind::Vector1D,
        }
    }

    /// A 2D array visualization with the grayscale colormap.
    pub fn vector2d(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind: DisplayKind::Vector2D {
                color_mode: "grayscale".to_string(),
            },
        }
    }

    /// Override the number format hint.
    pub fn format(mut self, fmt: impl Into<String>) -> Self {
        if let DisplayKind::Numeric { format } = &mut self.kind {
            *format = fmt.into();
        }
        self
    }

    /// Override the colormap hint.
    pub fn color_mode(mut self, mode: impl Into<String>) -> Self {
        if let DisplayKind::Vector2D { color_mode } = &mut self.kind {
            *color_mode = mode.into();
        }
        self
    }

    /// The initial cell value for this display kind.
    pub fn default_value(&self) -> Value {
        match self.kind {
            DisplayKind::Numeric { .. } => Value::Float(0.0),
            DisplayKind::Text => Value::Str(String::new()),
            DisplayKind::Vector1D | DisplayKind::Vector2D { .. } => Value::Null,
        }
    }
}

/// An action invokable from the editor, dispatched to a named callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Action key.
    pub key: String,
    /// Button label.
    pub label: String,
    /// Callback name passed to `NodeBehavior::action`.
    pub callback: String,
    /// Whether the editor should ask for confirmation before invoking.
    #[serde(default)]
    pub confirm: bool,
}

impl Action {
    /// Create an action.
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        callback: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            callback: callback.into(),
            confirm: false,
        }
    }

    /// Require confirmation before invoking.
    pub fn confirm(mut self) -> Self {
        self.confirm = true;
        self
    }
}

/// Persistent per-instance state surviving save/load and hot reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    /// Cell key.
    pub key: String,
    /// Default value for fresh instances.
    pub default: Value,
}

impl Store {
    /// Create a store slot.
    pub fn new(key: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            default: default.into(),
        }
    }
}
