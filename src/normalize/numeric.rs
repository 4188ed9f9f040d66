//! Numeric cell parsing.
//!
//! A cell goes through [`NumericRule::ORDER`] one rule at a time. Each rule
//! either passes a cleaned [`Numeral`] on, settles the value, or rejects the
//! cell. Output of [`canonical_string`] parses back to the same value under
//! every locale, so normalizing twice changes nothing.

use crate::config::NumericLocale;
use crate::error::{NumericField, RowError};

/// Dash characters read as a minus sign or, alone, as zero.
const DASHES: [char; 4] = ['-', '\u{2013}', '\u{2014}', '\u{2212}'];

/// A cell part-way through the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Numeral {
    pub text: String,
    pub negative: bool,
}

impl Numeral {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            negative: false,
        }
    }
}

/// Result of applying one rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Continue with the next rule
    Next(Numeral),
    /// The value is settled
    Value(f64),
    /// The cell is not a number
    Invalid,
}

/// The numeric coercion steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericRule {
    /// Remove all whitespace, including no-break and thin spaces
    StripWhitespace,
    /// Drop a trailing percent sign (net assets only)
    StripPercent,
    /// A dash on its own means zero
    LoneDash,
    /// Parentheses or a leading dash mean negative
    Sign,
    /// Resolve decimal and thousands separators
    Separators,
    /// Parse and require a finite value
    Finite,
}

impl NumericRule {
    pub const ORDER: [NumericRule; 6] = [
        NumericRule::StripWhitespace,
        NumericRule::StripPercent,
        NumericRule::LoneDash,
        NumericRule::Sign,
        NumericRule::Separators,
        NumericRule::Finite,
    ];

    /// Apply this rule.
    pub fn apply(self, numeral: Numeral, field: NumericField, locale: &NumericLocale) -> Outcome {
        match self {
            NumericRule::StripWhitespace => strip_whitespace(numeral),
            NumericRule::StripPercent => strip_percent(numeral, field),
            NumericRule::LoneDash => lone_dash(numeral),
            NumericRule::Sign => sign(numeral),
            NumericRule::Separators => separators(numeral, locale),
            NumericRule::Finite => finite(numeral),
        }
    }
}

fn strip_whitespace(mut n: Numeral) -> Outcome {
    n.text.retain(|c| !c.is_whitespace());
    if n.text.is_empty() {
        Outcome::Invalid
    } else {
        Outcome::Next(n)
    }
}

fn strip_percent(mut n: Numeral, field: NumericField) -> Outcome {
    if field == NumericField::NetAssets {
        if let Some(stripped) = n.text.strip_suffix('%') {
            n.text = stripped.to_string();
        }
    }
    Outcome::Next(n)
}

fn lone_dash(n: Numeral) -> Outcome {
    let mut chars = n.text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if DASHES.contains(&c) => Outcome::Value(0.0),
        _ => Outcome::Next(n),
    }
}

fn sign(mut n: Numeral) -> Outcome {
    if let Some(inner) = n
        .text
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        n.text = inner.to_string();
        n.negative = !n.negative;
    }
    if let Some(rest) = n.text.strip_prefix(DASHES) {
        n.text = rest.to_string();
        n.negative = !n.negative;
    } else if let Some(rest) = n.text.strip_prefix('+') {
        n.text = rest.to_string();
    }
    if n.text.is_empty() {
        Outcome::Invalid
    } else {
        Outcome::Next(n)
    }
}

/// Check that thousands groups are well formed: a leading group of one to
/// three digits, then groups of exactly three. Only the last group may carry
/// the decimal part.
fn valid_grouping(text: &str, thousands: char, decimal: char) -> bool {
    let groups: Vec<&str> = text.split(thousands).collect();
    let last = groups.len() - 1;
    groups.iter().enumerate().all(|(i, group)| {
        let integer = if i == last {
            group.split(decimal).next().unwrap_or("")
        } else {
            group
        };
        let digits = integer.len() == integer.chars().filter(char::is_ascii_digit).count();
        let width_ok = if i == 0 {
            (1..=3).contains(&integer.len())
        } else {
            integer.len() == 3
        };
        digits && width_ok
    })
}

fn separators(mut n: Numeral, locale: &NumericLocale) -> Outcome {
    let decimal = locale.decimal_separator;
    let thousands = locale.thousands_separator;

    let allowed = |c: char| c.is_ascii_digit() || c == decimal || Some(c) == thousands;
    if !n.text.chars().all(allowed) || !n.text.chars().any(|c| c.is_ascii_digit()) {
        return Outcome::Invalid;
    }

    if let Some(t) = thousands {
        let count = n.text.matches(t).count();
        if count > 0 {
            if n.text.matches(decimal).count() <= 1 && valid_grouping(&n.text, t, decimal) {
                n.text = n.text.replace(t, "");
            } else if count == 1 && !n.text.contains(decimal) {
                // Not a grouping separator: read it as the decimal point
                n.text = n.text.replace(t, ".");
                return Outcome::Next(n);
            } else {
                return Outcome::Invalid;
            }
        }
    }

    match n.text.matches(decimal).count() {
        0 => Outcome::Next(n),
        1 => {
            n.text = n.text.replace(decimal, ".");
            Outcome::Next(n)
        }
        _ => Outcome::Invalid,
    }
}

fn finite(n: Numeral) -> Outcome {
    match n.text.parse::<f64>() {
        Ok(v) if v.is_finite() => Outcome::Value(if n.negative { -v } else { v }),
        _ => Outcome::Invalid,
    }
}

/// Parses numeric cells under one locale.
#[derive(Debug, Clone, Copy)]
pub struct NumericParser {
    locale: NumericLocale,
}

impl NumericParser {
    pub fn new(locale: NumericLocale) -> Self {
        Self { locale }
    }

    /// Parse a cell into a finite number.
    pub fn parse(&self, raw: &str, field: NumericField) -> Result<f64, RowError> {
        let mut numeral = Numeral::new(raw);
        for rule in NumericRule::ORDER {
            match rule.apply(numeral, field, &self.locale) {
                Outcome::Next(next) => numeral = next,
                Outcome::Value(v) => return Ok(v),
                Outcome::Invalid => break,
            }
        }
        Err(RowError::NumericParse {
            field,
            value: raw.to_string(),
        })
    }
}

/// Render a value so that parsing it again yields the same value.
///
/// Plain decimal notation with a dot; exactly three fractional digits are
/// padded to four so they cannot be mistaken for a thousands group.
pub fn canonical_string(value: f64) -> String {
    let mut s = format!("{}", value);
    if let Some(dot) = s.find('.') {
        if s.len() - dot - 1 == 3 {
            s.push('0');
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comma() -> NumericParser {
        NumericParser::new(NumericLocale::comma_decimal())
    }

    fn dot() -> NumericParser {
        NumericParser::new(NumericLocale::dot_decimal())
    }

    fn mv(parser: &NumericParser, raw: &str) -> Result<f64, RowError> {
        parser.parse(raw, NumericField::MarketValue)
    }

    #[test]
    fn test_parentheses_negative() {
        assert_eq!(mv(&comma(), "(1.234,56)"), Ok(-1234.56));
        assert_eq!(mv(&comma(), "1.234,56"), Ok(1234.56));
        assert_eq!(mv(&dot(), "(1,234.56)"), Ok(-1234.56));
    }

    #[test]
    fn test_lone_dash_is_zero() {
        for dash in ["-", "–", "—", " − "] {
            assert_eq!(mv(&comma(), dash), Ok(0.0), "dash {:?}", dash);
        }
    }

    #[test]
    fn test_leading_dash_negative() {
        assert_eq!(mv(&comma(), "–12,5"), Ok(-12.5));
        assert_eq!(mv(&comma(), "-0,25"), Ok(-0.25));
        assert_eq!(mv(&comma(), "+3"), Ok(3.0));
    }

    #[test]
    fn test_whitespace_grouping() {
        assert_eq!(mv(&comma(), "1 234 567,89"), Ok(1234567.89));
        assert_eq!(mv(&comma(), "1\u{00A0}234,5"), Ok(1234.5));
        assert_eq!(mv(&comma(), "12\u{202F}000"), Ok(12000.0));
    }

    #[test]
    fn test_percent_only_on_net_assets() {
        let p = comma();
        assert_eq!(p.parse("0,52%", NumericField::NetAssets), Ok(0.52));
        assert_eq!(p.parse("0,52 %", NumericField::NetAssets), Ok(0.52));
        assert!(p.parse("0,52%", NumericField::MarketValue).is_err());
    }

    #[test]
    fn test_lone_separator_is_decimal() {
        assert_eq!(mv(&comma(), "12.5"), Ok(12.5));
        assert_eq!(mv(&comma(), "1.234"), Ok(1234.0));
        assert_eq!(mv(&dot(), "12,5"), Ok(12.5));
        assert_eq!(mv(&dot(), "1,234"), Ok(1234.0));
    }

    #[test]
    fn test_invalid_cells() {
        for raw in ["", "  ", "abc", "1,2,3", "EUR", "()", "1.23.4,5,6"] {
            assert!(mv(&comma(), raw).is_err(), "raw {:?}", raw);
        }
        assert_eq!(
            mv(&comma(), "n/a"),
            Err(RowError::NumericParse {
                field: NumericField::MarketValue,
                value: "n/a".into()
            })
        );
    }

    #[test]
    fn test_canonical_string() {
        assert_eq!(canonical_string(1234.56), "1234.56");
        assert_eq!(canonical_string(123.456), "123.4560");
        assert_eq!(canonical_string(-5.0), "-5");
        assert_eq!(canonical_string(0.25), "0.25");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["(1.234,56)", "1 234 567,89", "–", "0,52", "123,456", "1.000.000", "-7,125"] {
            for parser in [comma(), dot()] {
                let Ok(first) = mv(&comma(), raw) else {
                    continue;
                };
                let again = mv(&parser, &canonical_string(first)).unwrap();
                assert_eq!(again, first, "raw {:?}", raw);
            }
        }
    }

    #[test]
    fn test_rule_order_is_fixed() {
        assert_eq!(NumericRule::ORDER[0], NumericRule::StripWhitespace);
        assert_eq!(NumericRule::ORDER[5], NumericRule::Finite);
    }
}
