//! Value-generation strategies
//!
//! Every strategy is a closed, structured variant. Campaign files written for
//! the older expression syntax (`LinearSlice(bounds=[0, 10], n_vars=5)`) are
//! parsed into the same variants by [`Generator::parse`]; nothing is ever
//! evaluated.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Bounds, ParamValue};
use crate::error::ParameterError;

fn default_count() -> usize {
    10
}

fn default_log_base() -> f64 {
    2.0
}

/// What each repeat of a [`Generator::Replicate`] step produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplicateItem {
    Constant { value: f64 },
    UniformRandom { bounds: Bounds },
}

impl ReplicateItem {
    fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            ReplicateItem::Constant { value } => *value,
            ReplicateItem::UniformRandom { bounds } => uniform_random(*bounds, rng),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Generator {
    /// `count` evenly spaced values, both endpoints included
    LinearSlice {
        bounds: Bounds,
        #[serde(default = "default_count")]
        count: usize,
    },

    /// `count` log-spaced values in the given base, both endpoints included
    LogSlice {
        bounds: Bounds,
        #[serde(default = "default_count")]
        count: usize,
        #[serde(default = "default_log_base")]
        base: f64,
    },

    /// One sequence per integer step; step `i` holds `i` drawn items
    Replicate {
        bounds: Bounds,
        #[serde(default)]
        count: Option<usize>,
        item: ReplicateItem,
    },

    /// A single uniform draw
    UniformRandom { bounds: Bounds },
}

impl Generator {
    pub fn bounds(&self) -> Bounds {
        match self {
            Generator::LinearSlice { bounds, .. }
            | Generator::LogSlice { bounds, .. }
            | Generator::Replicate { bounds, .. }
            | Generator::UniformRandom { bounds } => *bounds,
        }
    }

    /// Every range this generator samples from, including a replicated
    /// item's, has finite ends
    pub fn has_finite_bounds(&self) -> bool {
        let finite = |b: &Bounds| b.lower.is_finite() && b.upper.is_finite();
        match self {
            Generator::Replicate {
                bounds,
                item: ReplicateItem::UniformRandom { bounds: item_bounds },
                ..
            } => finite(bounds) && finite(item_bounds),
            other => finite(&other.bounds()),
        }
    }

    /// Full value list for a sweep
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Result<Vec<ParamValue>, ParameterError> {
        let values = match self {
            Generator::LinearSlice { bounds, count } => scalars(linear_slice(*bounds, *count)),
            Generator::LogSlice {
                bounds,
                count,
                base,
            } => scalars(log_slice(*bounds, *count, *base)?),
            Generator::Replicate {
                bounds,
                count,
                item,
            } => replicate(item, *bounds, *count, rng)
                .into_iter()
                .map(ParamValue::Sequence)
                .collect(),
            Generator::UniformRandom { bounds } => vec![ParamValue::Scalar(uniform_random(*bounds, rng))],
        };
        Ok(values)
    }

    /// Exactly one scalar, as used when filling one value per particle
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Option<f64> {
        match self {
            Generator::UniformRandom { bounds } => Some(uniform_random(*bounds, rng)),
            _ => None,
        }
    }

    /// Parse the legacy expression syntax
    pub fn parse(expr: &str) -> Result<Self, ParameterError> {
        let err = |reason: &str| ParameterError::GeneratorExpression {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let caps = CALL_RE.captures(expr).ok_or_else(|| err("expected Name(arguments)"))?;
        let args = &caps["args"];
        let bounds = bounds_from_config(args).ok_or_else(|| err("missing bounds=[lower, upper]"))?;
        let count = keyword(&N_VARS_RE, args)
            .map(|n| n.parse::<usize>().map_err(|_| err("n_vars must be an integer")))
            .transpose()?;

        match &caps["name"] {
            "LinearSlice" => Ok(Generator::LinearSlice {
                bounds,
                count: count.unwrap_or_else(default_count),
            }),
            "LogSlice" => {
                let base = keyword(&BASE_RE, args)
                    .map(|b| b.parse::<f64>().map_err(|_| err("base must be a number")))
                    .transpose()?
                    .unwrap_or_else(default_log_base);
                Ok(Generator::LogSlice {
                    bounds,
                    count: count.unwrap_or_else(default_count),
                    base,
                })
            }
            "UniformRandom" => Ok(Generator::UniformRandom { bounds }),
            "Replicate" => {
                let item = ITEM_RE
                    .captures(args)
                    .map(|c| c["item"].to_string())
                    .ok_or_else(|| err("Replicate needs a quoted item expression"))?;
                let item = if let Ok(value) = item.trim().parse::<f64>() {
                    ReplicateItem::Constant { value }
                } else if let Some(item_bounds) = bounds_from_config(&item) {
                    ReplicateItem::UniformRandom {
                        bounds: item_bounds,
                    }
                } else {
                    return Err(err("Replicate item must be a number or UniformRandom(bounds=[a,b])"));
                };
                // The item's own bounds appear first in the argument text
                let outer = ITEM_RE.replace(args, "");
                let bounds = bounds_from_config(&outer).ok_or_else(|| err("missing bounds=[lower, upper]"))?;
                Ok(Generator::Replicate {
                    bounds,
                    count,
                    item,
                })
            }
            _ => Err(err("unknown generator")),
        }
    }
}

static CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?P<name>\w+)\s*\((?P<args>.*)\)\s*$").expect("valid regex"));
static BOUNDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"bounds\s*=\s*\[\s*(?P<lower>[^,\]]+?)\s*,\s*(?P<upper>[^\]]+?)\s*\]").expect("valid regex")
});
static N_VARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"n_vars\s*=\s*(?P<value>[^,\s)]+)").expect("valid regex"));
static BASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"base\s*=\s*(?P<value>[^,\s)]+)").expect("valid regex"));
static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*['"](?P<item>[^'"]*)['"]"#).expect("valid regex"));

fn keyword<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text).and_then(|c| c.name("value")).map(|m| m.as_str())
}

/// Extract `bounds=[a,b]` from generator text. `None` when the clause is
/// absent or either bound is not a number.
pub fn bounds_from_config(text: &str) -> Option<Bounds> {
    let caps = BOUNDS_RE.captures(text)?;
    let lower = caps["lower"].parse().ok()?;
    let upper = caps["upper"].parse().ok()?;
    Some(Bounds::new(lower, upper))
}

fn scalars(values: Vec<f64>) -> Vec<ParamValue> {
    values.into_iter().map(ParamValue::Scalar).collect()
}

pub fn linear_slice(bounds: Bounds, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![bounds.lower],
        _ => {
            let step = (bounds.upper - bounds.lower) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| bounds.lower + step * i as f64).collect();
            values[count - 1] = bounds.upper;
            values
        }
    }
}

pub fn log_slice(bounds: Bounds, count: usize, base: f64) -> Result<Vec<f64>, ParameterError> {
    if bounds.lower <= 0.0 || bounds.upper <= 0.0 {
        return Err(ParameterError::Domain(format!(
            "log spacing needs positive bounds, got [{}, {}]",
            bounds.lower, bounds.upper
        )));
    }
    if base <= 0.0 || base == 1.0 || !base.is_finite() {
        return Err(ParameterError::Domain(format!("invalid logarithm base {base}")));
    }

    let exponents = linear_slice(Bounds::new(bounds.lower.log(base), bounds.upper.log(base)), count);
    let mut values: Vec<f64> = exponents.into_iter().map(|e| base.powf(e)).collect();
    if let Some(first) = values.first_mut() {
        *first = bounds.lower;
    }
    if count > 1 {
        values[count - 1] = bounds.upper;
    }
    Ok(values)
}

pub fn replicate<R: Rng>(
    item: &ReplicateItem,
    bounds: Bounds,
    count: Option<usize>,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let start = bounds.lower as i64;
    let end = bounds.upper as i64;
    let step = match count {
        Some(n) if n > 0 => ((end - start) / n as i64).max(1),
        _ => 1,
    };
    (start..=end)
        .step_by(step as usize)
        .map(|repeats| (0..repeats.max(0)).map(|_| item.draw(rng)).collect())
        .collect()
}

pub fn uniform_random<R: Rng>(bounds: Bounds, rng: &mut R) -> f64 {
    let (lower, upper) = bounds.ordered();
    rng.random_range(lower..=upper)
}
