//! Amount cells: `-4.50`, `$1,234.56`, `(12.00)` (accounting negative), `1e3`.

use rust_decimal::Decimal;
use std::str::FromStr;

pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let (negative, body) = match s.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;

    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Option<Decimal> {
        Some(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_plain_and_signed() {
        assert_eq!(parse_amount("-4.50"), dec("-4.50"));
        assert_eq!(parse_amount("2000.00"), dec("2000.00"));
        assert_eq!(parse_amount(" 12 "), dec("12"));
    }

    #[test]
    fn test_currency_and_separators() {
        assert_eq!(parse_amount("$1,234.56"), dec("1234.56"));
        assert_eq!(parse_amount("-$14.05"), dec("-14.05"));
    }

    #[test]
    fn test_accounting_parens() {
        assert_eq!(parse_amount("(75.25)"), dec("-75.25"));
    }

    #[test]
    fn test_scientific() {
        assert_eq!(parse_amount("1e3"), dec("1000"));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("12.3.4"), None);
    }
}
