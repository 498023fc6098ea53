// Thu Oct 15 2026 - Alex

use crate::parser::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("bad regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid constraint '{0}'")]
    InvalidConstraint(String),
    #[error("'{0}' is not a template-id")]
    NotATemplateId(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("cannot parse type '{text}': {source}")]
    InvalidType { text: String, source: ParseError },
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses `0x..`, `0o..`, `0b..`, a leading-zero octal or a decimal
/// number, optionally negative.
pub fn parse_number(text: &str) -> Result<i64, QueryError> {
    let invalid = || QueryError::InvalidNumber(text.to_string());
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let lower = digits.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        i64::from_str_radix(&lower[1..], 8)
    } else {
        lower.parse::<i64>()
    }
    .map_err(|_| invalid())?;
    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x10").unwrap(), 16);
        assert_eq!(parse_number("010").unwrap(), 8);
        assert_eq!(parse_number("0b101").unwrap(), 5);
        assert_eq!(parse_number("-3").unwrap(), -3);
        assert_eq!(parse_number("0").unwrap(), 0);
        assert!(parse_number("12z").is_err());
    }
}
