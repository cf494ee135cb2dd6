//! Scalar, range and identifier parsing
//!
//! `-1` and empty reads are the driver's "not available" sentinel and map
//! to `ParseError::NotAvailable`, never to zero.

use crate::domain::Bound;
use crate::error::ParseError;

/// Strip a trailing unit suffix (`MHz`, `mV`, `%`, `*`, ...) from a token
pub fn strip_unit(token: &str) -> &str {
    token
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%' || c == '*' || c == '/')
}

/// Parse a numeric reading, tolerating units and trailing text
pub fn parse_numeric(text: &str) -> Result<f64, ParseError> {
    let token = text.split_whitespace().next().unwrap_or_default();
    let stripped = strip_unit(token);
    if stripped.is_empty() {
        return Err(ParseError::NotAvailable);
    }
    let value: f64 = stripped.parse().map_err(|_| ParseError::InvalidValue {
        what: "number",
        text: text.trim().to_string(),
    })?;
    if value == -1.0 {
        return Err(ParseError::NotAvailable);
    }
    Ok(value)
}

/// Parse an integer reading; fractional input is rejected
pub fn parse_int(text: &str) -> Result<i64, ParseError> {
    let token = text.split_whitespace().next().unwrap_or_default();
    let stripped = strip_unit(token);
    if stripped.is_empty() {
        return Err(ParseError::NotAvailable);
    }
    let value: i64 = stripped.parse().map_err(|_| ParseError::InvalidValue {
        what: "integer",
        text: text.trim().to_string(),
    })?;
    if value == -1 {
        return Err(ParseError::NotAvailable);
    }
    Ok(value)
}

/// Parse `min max` or `[min, max]`, units allowed on either endpoint
pub fn parse_range(text: &str) -> Result<Bound, ParseError> {
    let values: Vec<i64> = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == '[' || c == ']')
        .filter(|t| !t.is_empty())
        .map(|t| strip_unit(t).parse::<i64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ParseError::InvalidValue {
            what: "range",
            text: text.trim().to_string(),
        })?;

    match values.as_slice() {
        [min, max] => Ok(Bound::new(*min, *max)),
        [] => Err(ParseError::NotAvailable),
        _ => Err(ParseError::InvalidValue {
            what: "range",
            text: text.trim().to_string(),
        }),
    }
}

/// Parse a hexadecimal PCI identifier such as `0x1002`
pub fn parse_hex_id(text: &str) -> Result<u16, ParseError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u16::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidValue {
        what: "PCI id",
        text: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_unit() {
        assert_eq!(strip_unit("300MHz"), "300");
        assert_eq!(strip_unit("750mV "), "750");
        assert_eq!(strip_unit("42%"), "42");
        assert_eq!(strip_unit("8.0"), "8.0");
    }

    #[test]
    fn test_parse_numeric_sentinels() {
        assert_eq!(parse_numeric("-1\n"), Err(ParseError::NotAvailable));
        assert_eq!(parse_numeric(""), Err(ParseError::NotAvailable));
        assert_eq!(parse_numeric("   \n"), Err(ParseError::NotAvailable));
        assert_eq!(parse_numeric("0\n"), Ok(0.0));
    }

    #[test]
    fn test_parse_numeric_with_units() {
        assert_eq!(parse_numeric("8.0 GT/s PCIe\n"), Ok(8.0));
        assert_eq!(parse_numeric("1200MHz"), Ok(1200.0));
        assert!(matches!(
            parse_numeric("garbage"),
            Err(ParseError::NotAvailable) | Err(ParseError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_numeric("12x4"),
            Err(ParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("45000\n"), Ok(45000));
        assert_eq!(parse_int("-1"), Err(ParseError::NotAvailable));
        assert!(parse_int("4.5").is_err());
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(parse_range("0 255"), Ok(Bound::new(0, 255)));
        assert_eq!(parse_range("[800, 1200]"), Ok(Bound::new(800, 1200)));
        assert_eq!(parse_range("300MHz       2000MHz"), Ok(Bound::new(300, 2000)));
        assert_eq!(parse_range(""), Err(ParseError::NotAvailable));
        assert!(parse_range("1 2 3").is_err());
    }

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(parse_hex_id("0x1002\n"), Ok(0x1002));
        assert_eq!(parse_hex_id("687f"), Ok(0x687f));
        assert!(parse_hex_id("0xzz").is_err());
    }
}
