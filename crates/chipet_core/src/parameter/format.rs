//! Directory-name format rules
//!
//! A rule is a literal prefix, at most one `{...}` placeholder and a literal
//! suffix, written with the Python format-string subset campaign files have
//! always used: `{}`, `{0}`, `{:d}`, `{:.3f}`, `{:.2e}`, `{:g}`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValueType;
use crate::error::ParameterError;

/// How the placeholder renders its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    /// `{}`: integers bare, floats with at least one decimal
    Plain,
    /// `{:d}`: truncated integer; forces the parameter to integer type
    Integer,
    /// `{:.Nf}`
    Fixed(usize),
    /// `{:.Ne}` with a Python-style signed two-digit exponent
    Exponent(usize),
    /// `{:g}`: shortest representation
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormatRule {
    raw: String,
    prefix: String,
    spec: Option<FormatSpec>,
    suffix: String,
}

impl FormatRule {
    pub fn parse(rule: &str) -> Result<Self, ParameterError> {
        let err = |reason| ParameterError::FormatRule {
            rule: rule.to_string(),
            reason,
        };

        let Some(open) = rule.find('{') else {
            return Ok(Self {
                raw: rule.to_string(),
                prefix: rule.to_string(),
                spec: None,
                suffix: String::new(),
            });
        };
        let close = rule[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| err("unterminated placeholder"))?;
        let suffix = &rule[close + 1..];
        if suffix.contains('{') {
            return Err(err("more than one placeholder"));
        }

        let body = &rule[open + 1..close];
        let (index, spec) = body.split_once(':').unwrap_or((body, ""));
        if !(index.is_empty() || index == "0") {
            return Err(err("only positional index 0 is supported"));
        }

        Ok(Self {
            raw: rule.to_string(),
            prefix: rule[..open].to_string(),
            spec: Some(parse_spec(spec).ok_or_else(|| err("unsupported format spec"))?),
            suffix: suffix.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Literal text before the placeholder
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn forces_integer(&self) -> bool {
        self.spec == Some(FormatSpec::Integer)
    }

    /// Render one scalar
    pub fn render(&self, value: f64, value_type: ValueType) -> String {
        let Some(spec) = self.spec else {
            return self.raw.clone();
        };
        let body = match spec {
            FormatSpec::Plain => match value_type {
                ValueType::Integer => format!("{}", value.trunc() as i64),
                ValueType::Float => format!("{value:?}"),
            },
            FormatSpec::Integer => format!("{}", value.trunc() as i64),
            FormatSpec::Fixed(precision) => format!("{value:.precision$}"),
            FormatSpec::Exponent(precision) => python_exponent(value, precision),
            FormatSpec::General => format!("{value}"),
        };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }

    /// Render a count (used for sequence-valued parameters)
    pub fn render_count(&self, count: usize) -> String {
        self.render(count as f64, ValueType::Integer)
    }
}

fn parse_spec(spec: &str) -> Option<FormatSpec> {
    match spec {
        "" => return Some(FormatSpec::Plain),
        "d" => return Some(FormatSpec::Integer),
        "g" => return Some(FormatSpec::General),
        "f" => return Some(FormatSpec::Fixed(6)),
        "e" => return Some(FormatSpec::Exponent(6)),
        _ => {}
    }
    let precision = spec.strip_prefix('.')?;
    if let Some(digits) = precision.strip_suffix('f') {
        digits.parse().ok().map(FormatSpec::Fixed)
    } else if let Some(digits) = precision.strip_suffix('e') {
        digits.parse().ok().map(FormatSpec::Exponent)
    } else {
        None
    }
}

/// `1.50e+03` rather than Rust's `1.50e3`
fn python_exponent(value: f64, precision: usize) -> String {
    let rendered = format!("{value:.precision$e}");
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => rendered,
    }
}

impl TryFrom<String> for FormatRule {
    type Error = ParameterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FormatRule::parse(&value)
    }
}

impl From<FormatRule> for String {
    fn from(rule: FormatRule) -> Self {
        rule.raw
    }
}

impl fmt::Display for FormatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
