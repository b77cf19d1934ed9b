//! Bias files
//!
//! One particle per line: the particle id followed by one value per
//! parameter, whitespace separated. Blank lines and `#` comments are ignored.
//!
//! ```text
//! # id  kd    motors
//! 0     0.25  40
//! 3     0.80  12
//! ```

use std::fs;
use std::path::Path;

use chipet_core::BiasRow;
use color_eyre::eyre::{Context, eyre};

pub fn parse_bias(text: &str) -> color_eyre::Result<Vec<BiasRow>> {
    let mut rows = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let particle = fields
            .next()
            .unwrap_or_default()
            .parse::<usize>()
            .map_err(|e| eyre!("line {}: bad particle id: {e}", number + 1))?;
        let values = fields
            .map(|f| f.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| eyre!("line {}: bad value: {e}", number + 1))?;
        if values.is_empty() {
            return Err(eyre!("line {}: particle {particle} has no values", number + 1));
        }
        rows.push(BiasRow { particle, values });
    }
    Ok(rows)
}

pub fn load_bias(path: &Path) -> color_eyre::Result<Vec<BiasRow>> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read bias file {}", path.display()))?;
    parse_bias(&text).wrap_err_with(|| format!("invalid bias file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bias_rows() {
        let rows = parse_bias("# id kd n\n0 0.25 40\n\n3 0.8 12  # tuned\n").unwrap();
        assert_eq!(
            rows,
            vec![
                BiasRow {
                    particle: 0,
                    values: vec![0.25, 40.0],
                },
                BiasRow {
                    particle: 3,
                    values: vec![0.8, 12.0],
                },
            ]
        );
    }

    #[test]
    fn test_parse_bias_errors() {
        assert!(parse_bias("x 1.0\n").is_err());
        assert!(parse_bias("1 abc\n").is_err());
        assert!(parse_bias("2\n").is_err());
    }
}
