//! Free-text parsers for screening parameters.
//!
//! Both parsers are total: any input yields a value, an explicit unset or
//! an invalid marker.

/// Outcome of parsing one reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed<T> {
    Value(T),
    /// The user asked for no filter (`-`)
    Unset,
    Invalid,
}

impl<T> Parsed<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Self::Value(v) => Parsed::Value(f(v)),
            Self::Unset => Parsed::Unset,
            Self::Invalid => Parsed::Invalid,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }
}

const TRUE_WORDS: [&str; 5] = ["1", "yes", "y", "true", "t"];
const FALSE_WORDS: [&str; 5] = ["0", "no", "n", "false", "f"];

/// Parse a yes/no reply. `-` reads as "no".
pub fn parse_optional_bool(text: &str) -> Parsed<bool> {
    let text = text.trim().to_lowercase();
    if text == "-" {
        return Parsed::Value(false);
    }
    parse_strict_bool(&text)
}

/// Parse a yes/no reply without the `-` shorthand.
pub fn parse_strict_bool(text: &str) -> Parsed<bool> {
    let text = text.trim().to_lowercase();
    if TRUE_WORDS.contains(&text.as_str()) {
        Parsed::Value(true)
    } else if FALSE_WORDS.contains(&text.as_str()) {
        Parsed::Value(false)
    } else {
        Parsed::Invalid
    }
}

/// Parse a number. `-` means no filter; non-finite numbers are invalid.
pub fn parse_optional_float(text: &str) -> Parsed<f64> {
    let text = text.trim();
    if text == "-" {
        return Parsed::Unset;
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Parsed::Value(v),
        _ => Parsed::Invalid,
    }
}
