//! Parameter model
//!
//! A [`ParameterSpec`] is one search dimension of a campaign: how its values
//! are generated, how they are coerced, and how a value becomes a fragment of
//! a simulation directory name.

mod format;
mod generator;

pub use format::{FormatRule, FormatSpec};
pub use generator::{
    Generator, ReplicateItem, bounds_from_config, linear_slice, log_slice, replicate,
    uniform_random,
};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Inclusive `[lower, upper]` range of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// `(min, max)` regardless of declaration order
    pub fn ordered(&self) -> (f64, f64) {
        (self.lower.min(self.upper), self.lower.max(self.upper))
    }

    pub fn span(&self) -> f64 {
        let (lower, upper) = self.ordered();
        upper - lower
    }
}

impl From<[f64; 2]> for Bounds {
    fn from([lower, upper]: [f64; 2]) -> Self {
        Self { lower, upper }
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(bounds: Bounds) -> Self {
        [bounds.lower, bounds.upper]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    #[default]
    Float,
}

impl ValueType {
    /// Integer coercion truncates toward zero
    pub fn coerce(&self, value: f64) -> f64 {
        match self {
            ValueType::Integer => value.trunc(),
            ValueType::Float => value,
        }
    }
}

/// One parameter value: a scalar, or a replicated sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Sequence(Vec<f64>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ParamValue::Scalar(v) => Some(*v),
            ParamValue::Sequence(_) => None,
        }
    }

    fn coerced(&self, value_type: ValueType) -> Self {
        match self {
            ParamValue::Scalar(v) => ParamValue::Scalar(value_type.coerce(*v)),
            ParamValue::Sequence(vs) => {
                ParamValue::Sequence(vs.iter().map(|v| value_type.coerce(*v)).collect())
            }
        }
    }
}

/// The shared surface of anything that holds indexed values and can render
/// them into a directory-name fragment.
pub trait ValueSource {
    fn value_count(&self) -> usize;

    fn fragment(&self, index: usize) -> Result<String, ParameterError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub label: String,
    pub format_rule: FormatRule,
    #[serde(default)]
    pub generator: Option<Generator>,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default)]
    pub values: Vec<ParamValue>,
}

impl ParameterSpec {
    pub fn new(label: impl Into<String>, format_rule: FormatRule) -> Self {
        let value_type = if format_rule.forces_integer() {
            ValueType::Integer
        } else {
            ValueType::Float
        };
        Self {
            label: label.into(),
            format_rule,
            generator: None,
            value_type,
            values: Vec::new(),
        }
    }

    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// A `{:d}` rule keeps the type integer whatever is requested here
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        if !self.format_rule.forces_integer() {
            self.value_type = value_type;
        }
        self
    }

    pub fn with_values(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.set_scalars(values);
        self
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.generator.as_ref().map(Generator::bounds)
    }

    /// Bounds, or a configuration error naming this parameter
    pub fn require_bounds(&self) -> Result<Bounds, ParameterError> {
        self.bounds()
            .ok_or_else(|| ParameterError::configuration(&self.label, "no bounds declared"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&ParamValue, ParameterError> {
        self.values
            .get(index)
            .ok_or_else(|| ParameterError::IndexOutOfRange {
                label: self.label.clone(),
                index,
                len: self.values.len(),
            })
    }

    pub fn scalar(&self, index: usize) -> Result<f64, ParameterError> {
        self.value(index)?.as_scalar().ok_or_else(|| {
            ParameterError::configuration(&self.label, "sequence values cannot be optimized")
        })
    }

    /// Replace all values, coercing to the value type
    pub fn set_scalars(&mut self, values: impl IntoIterator<Item = f64>) {
        let value_type = self.value_type;
        self.values = values
            .into_iter()
            .map(|v| ParamValue::Scalar(value_type.coerce(v)))
            .collect();
    }

    pub fn set_scalar(&mut self, index: usize, value: f64) -> Result<(), ParameterError> {
        let coerced = self.value_type.coerce(value);
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| ParameterError::IndexOutOfRange {
                label: self.label.clone(),
                index,
                len,
            })?;
        *slot = ParamValue::Scalar(coerced);
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// The generator, provided every range it samples has finite ends
    fn checked_generator(&self) -> Result<&Generator, ParameterError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| ParameterError::configuration(&self.label, "no generator declared"))?;
        if !generator.has_finite_bounds() {
            return Err(ParameterError::configuration(&self.label, "bounds must be finite"));
        }
        Ok(generator)
    }

    /// Reject a declared generator that could not produce values
    pub fn validate(&self) -> Result<(), ParameterError> {
        match self.generator {
            Some(_) => self.checked_generator().map(|_| ()),
            None => Ok(()),
        }
    }

    /// Replace the values with the generator's full list
    pub fn generate<R: Rng>(&mut self, rng: &mut R) -> Result<(), ParameterError> {
        let generator = self.checked_generator()?;
        let value_type = self.value_type;
        self.values = generator
            .generate(rng)?
            .iter()
            .map(|v| v.coerced(value_type))
            .collect();
        Ok(())
    }

    /// Append one drawn value
    pub fn draw_value<R: Rng>(&mut self, rng: &mut R) -> Result<(), ParameterError> {
        let value = self
            .checked_generator()?
            .draw(rng)
            .ok_or_else(|| {
                ParameterError::configuration(
                    &self.label,
                    "generator cannot draw single values (use UniformRandom)",
                )
            })?;
        self.values
            .push(ParamValue::Scalar(self.value_type.coerce(value)));
        Ok(())
    }

    /// Render a value; sequences render their length
    pub fn format(&self, value: &ParamValue) -> String {
        match value {
            ParamValue::Scalar(v) => self.format_rule.render(*v, self.value_type),
            ParamValue::Sequence(vs) => self.format_rule.render_count(vs.len()),
        }
    }

    /// The value as written to a generation database or a config file
    pub fn raw(&self, index: usize) -> Result<String, ParameterError> {
        let render = |v: f64| match self.value_type {
            ValueType::Integer => format!("{}", v as i64),
            ValueType::Float => format!("{v:?}"),
        };
        Ok(match self.value(index)? {
            ParamValue::Scalar(v) => render(*v),
            ParamValue::Sequence(vs) => {
                let items: Vec<String> = vs.iter().map(|v| render(*v)).collect();
                format!("[{}]", items.join(","))
            }
        })
    }

    /// The binding that writes value `index` into a rendered config
    pub fn push_value(&self, index: usize) -> Result<(String, String), ParameterError> {
        Ok((self.label.clone(), self.raw(index)?))
    }
}

impl ValueSource for ParameterSpec {
    fn value_count(&self) -> usize {
        self.values.len()
    }

    fn fragment(&self, index: usize) -> Result<String, ParameterError> {
        if self.format_rule.is_empty() {
            return Ok(String::new());
        }
        Ok(self.format(self.value(index)?))
    }
}
