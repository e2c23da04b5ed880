//! FILENAME: core/engine/src/number_format.rs
//! PURPOSE: Number format specifications: parsing patterns, formatting values,
//! and reading numbers back from formatted text.
//! CONTEXT: A column's number format is declared as a pattern string such as
//! "#,##0.00", "$#,##0.00", "#.##0,00 €" or "0.0%". The pattern is parsed once
//! into a `NumberFormatSpec`, which both renders values and parses cell text.

use crate::value::NumberKind;
use serde::{Deserialize, Serialize};

/// Where the symbol sits relative to the digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolPosition {
    Before,
    After,
}

/// A parsed number format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberFormatSpec {
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
    /// Fixed number of decimals; `None` renders the shortest representation.
    pub precision: Option<u8>,
    /// Literal affix text, including its spacing (e.g. "$", " €", "%").
    pub symbol: Option<String>,
    pub symbol_position: SymbolPosition,
    /// Values are stored as fractions and displayed multiplied by 100.
    pub percent: bool,
}

impl Default for NumberFormatSpec {
    /// The general format: '.' decimal, no grouping, shortest representation.
    fn default() -> Self {
        NumberFormatSpec {
            decimal_separator: '.',
            thousands_separator: None,
            precision: None,
            symbol: None,
            symbol_position: SymbolPosition::Before,
            percent: false,
        }
    }
}

const PLACEHOLDERS: [char; 2] = ['#', '0'];
const SEPARATORS: [char; 5] = [',', '.', ' ', '\'', '\u{a0}'];

impl NumberFormatSpec {
    /// Parses a pattern string. Returns `None` for empty or unparseable
    /// patterns (no digit placeholder, or ambiguous separators).
    pub fn parse_pattern(pattern: &str) -> Option<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let start = chars.iter().position(|c| PLACEHOLDERS.contains(c))?;

        let mut end = start;
        while end < chars.len() && (PLACEHOLDERS.contains(&chars[end]) || SEPARATORS.contains(&chars[end])) {
            end += 1;
        }
        // Trailing separators belong to the suffix ("0 €")
        while end > start && SEPARATORS.contains(&chars[end - 1]) {
            end -= 1;
        }

        let prefix: String = chars[..start].iter().collect();
        let core = &chars[start..end];
        let suffix: String = chars[end..].iter().collect();

        let (decimal_separator, thousands_separator, precision) = Self::split_core(core)?;

        let percent = prefix.contains('%') || suffix.contains('%');
        let (symbol, symbol_position) = if !prefix.trim().is_empty() {
            (Some(prefix), SymbolPosition::Before)
        } else if !suffix.trim().is_empty() {
            (Some(suffix), SymbolPosition::After)
        } else {
            (None, SymbolPosition::Before)
        };

        Some(NumberFormatSpec {
            decimal_separator,
            thousands_separator,
            precision: Some(precision),
            symbol,
            symbol_position,
            percent,
        })
    }

    /// Parses `pattern`, falling back to the general format when it is
    /// absent, empty or unparseable.
    pub fn from_pattern_or_default(pattern: Option<&str>) -> Self {
        pattern
            .and_then(Self::parse_pattern)
            .unwrap_or_default()
    }

    /// Works out (decimal separator, thousands separator, precision) from the
    /// digit core of a pattern, e.g. "#,##0.00".
    fn split_core(core: &[char]) -> Option<(char, Option<char>, u8)> {
        let mut distinct: Vec<char> = Vec::new();
        for c in core.iter().filter(|c| SEPARATORS.contains(c)) {
            if !distinct.contains(c) {
                distinct.push(*c);
            }
        }

        let decimal = match distinct.as_slice() {
            [] => None,
            [only] => {
                let occurrences = core.iter().filter(|c| *c == only).count();
                let after = core.len() - 1 - core.iter().rposition(|c| c == only)?;
                let is_decimal = occurrences == 1
                    && match only {
                        '.' => true,
                        ',' => after != 3,
                        _ => false,
                    };
                is_decimal.then_some(*only)
            }
            [first, last] => {
                // The decimal separator comes last, once, after all grouping
                let last_pos = core.iter().position(|c| c == last)?;
                if core.iter().filter(|c| *c == last).count() != 1
                    || core[last_pos..].iter().any(|c| c == first)
                {
                    return None;
                }
                Some(*last)
            }
            _ => return None,
        };

        let thousands = distinct.iter().copied().find(|c| Some(*c) != decimal);
        let precision = match decimal {
            Some(sep) => {
                let pos = core.iter().rposition(|c| *c == sep)?;
                let decimals = core[pos + 1..].iter().filter(|c| PLACEHOLDERS.contains(c)).count();
                u8::try_from(decimals).unwrap_or(u8::MAX)
            }
            None => 0,
        };

        let decimal_separator = decimal.unwrap_or(if thousands == Some('.') { ',' } else { '.' });
        Some((decimal_separator, thousands, precision))
    }

    /// The metadata a number parsed with this spec carries.
    pub fn kind(&self) -> NumberKind {
        if self.percent {
            NumberKind::Percent
        } else {
            match &self.symbol {
                Some(symbol) => NumberKind::Currency(symbol.trim().to_string()),
                None => NumberKind::Decimal,
            }
        }
    }

    /// Formats a value according to this spec.
    pub fn format(&self, value: f64) -> String {
        let scaled = if self.percent { value * 100.0 } else { value };
        if !scaled.is_finite() {
            return scaled.to_string();
        }

        let digits = match self.precision {
            Some(p) => format!("{:.prec$}", scaled.abs(), prec = p as usize),
            None => format_general(scaled.abs()),
        };
        let negative = scaled < 0.0 && digits.chars().any(|c| c.is_ascii_digit() && c != '0');

        let (integer_part, fraction_part) = match digits.split_once('.') {
            Some((i, f)) => (i.to_string(), Some(f.to_string())),
            None => (digits, None),
        };

        let mut body = match self.thousands_separator {
            Some(sep) => add_thousands_separator(&integer_part, sep),
            None => integer_part,
        };
        if let Some(fraction) = fraction_part {
            body.push(self.decimal_separator);
            body.push_str(&fraction);
        }

        let with_symbol = match (&self.symbol, self.symbol_position) {
            (Some(symbol), SymbolPosition::Before) => format!("{}{}", symbol, body),
            (Some(symbol), SymbolPosition::After) => format!("{}{}", body, symbol),
            (None, _) => body,
        };

        if negative {
            format!("-{}", with_symbol)
        } else {
            with_symbol
        }
    }

    /// Reads a number from cell text written in this format.
    ///
    /// Accepts the symbol on either side (or missing), grouping separators,
    /// a leading minus or accounting parentheses. Percent specs divide the
    /// displayed number by 100. Returns `None` when the text is not a number.
    pub fn parse_text(&self, text: &str) -> Option<f64> {
        let mut s = text.trim();
        if s.is_empty() {
            return None;
        }

        let mut negative = false;
        if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
            negative = true;
            s = s[1..s.len() - 1].trim();
        }
        if let Some(rest) = s.strip_prefix('-') {
            negative = !negative;
            s = rest.trim_start();
        }

        let mut owned = s.to_string();
        if let Some(symbol) = self.symbol.as_deref().map(str::trim).filter(|sym| !sym.is_empty()) {
            owned = owned.replace(symbol, "");
        }
        if self.percent {
            owned = owned.replace('%', "");
        }
        let mut s = owned.trim();
        if let Some(rest) = s.strip_prefix('-') {
            negative = !negative;
            s = rest.trim_start();
        }

        let mut normalized = String::with_capacity(s.len());
        for c in s.chars() {
            if Some(c) == self.thousands_separator
                || (self.thousands_separator == Some(' ') && c == '\u{a0}')
            {
                continue;
            }
            if c == self.decimal_separator {
                normalized.push('.');
            } else if c.is_ascii_digit() {
                normalized.push(c);
            } else {
                return None;
            }
        }

        if !normalized.chars().any(|c| c.is_ascii_digit())
            || normalized.chars().filter(|c| *c == '.').count() > 1
        {
            return None;
        }

        let magnitude: f64 = normalized.parse().ok()?;
        let value = if negative { -magnitude } else { magnitude };
        Some(if self.percent { value / 100.0 } else { value })
    }
}

/// Format a number in general format (auto-detect best representation).
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let abs_value = value.abs();

    // Use scientific notation for very large or very small numbers
    if abs_value >= 1e15 || (abs_value < 1e-9 && abs_value > 0.0) {
        return format!("{:e}", value);
    }

    // For integers, don't show decimal point
    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }

    // For decimals, show up to 10 decimal places but trim trailing zeros
    let formatted = format!("{:.10}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Add thousands separators to a string of integer digits.
fn add_thousands_separator(digits: &str, separator: char) -> String {
    let mut result = String::new();
    let len = digits.chars().count();

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(separator);
        }
        result.push(c);
    }

    result
}
