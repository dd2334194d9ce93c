//! Screening parameters.
//!
//! The ten filter parameters, their prompts, defaults and parsers, and the
//! typed `ScreenParams` set the compiler consumes. Values arrive either as
//! free text (one reply per parameter, see [`session`]) or as a structured
//! JSON request (see [`request`]).

pub mod parse;
pub mod request;
pub mod session;

pub use parse::{parse_optional_bool, parse_optional_float, Parsed};
pub use request::ScreenRequest;
pub use session::{ParamSession, SessionStep};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Parameter Names
// ============================================================================

/// Identifier of a screening parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamName {
    UsExchangesOnly,
    MinPrice,
    MinRelativeVolume,
    MinChange,
    MinSma20AbovePct,
    MaxSma20AbovePct,
    MinAtrPct,
    MaxAtrPct,
    MinAdrPct,
    BullishCandlestickPatternsOnly,
}

impl ParamName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsExchangesOnly => "us_exchanges_only",
            Self::MinPrice => "min_price",
            Self::MinRelativeVolume => "min_relative_volume",
            Self::MinChange => "min_change",
            Self::MinSma20AbovePct => "min_sma20_above_pct",
            Self::MaxSma20AbovePct => "max_sma20_above_pct",
            Self::MinAtrPct => "min_atr_pct",
            Self::MaxAtrPct => "max_atr_pct",
            Self::MinAdrPct => "min_adr_pct",
            Self::BullishCandlestickPatternsOnly => "bullish_candlestick_patterns_only",
        }
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamName {
    type Err = InvalidParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PARAMS
            .iter()
            .map(|p| p.name)
            .find(|name| name.as_str() == s)
            .ok_or_else(|| InvalidParameter::UnknownName(s.to_string()))
    }
}

// ============================================================================
// Parameter Values
// ============================================================================

/// Kind of value a parameter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Flag,
    Number,
}

/// A parsed parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Number(f64),
    /// No filter on this field
    Unset,
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Unset => f.write_str("-"),
        }
    }
}

/// Parameter parse or conversion failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidParameter {
    /// Text that none of the parameter's accepted forms match
    #[error("Invalid value {input:?} for {name}. {prompt}")]
    Unparseable {
        name: ParamName,
        prompt: &'static str,
        input: String,
    },

    #[error("Invalid value for {name}: {reason}")]
    OutOfRange { name: ParamName, reason: String },

    #[error("Unknown parameter: {0}")]
    UnknownName(String),

    /// Request body that is not a valid parameter object
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

// ============================================================================
// Parameter Table
// ============================================================================

/// Static description of one screening parameter.
#[derive(Debug, Clone, Copy)]
pub struct QueryParam {
    pub name: ParamName,
    /// Text shown when asking for (or re-asking for) this value
    pub prompt: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    /// Applied to parsed numbers only, never to unset values
    pub postprocess: Option<fn(f64) -> f64>,
    pub order: usize,
}

fn percent_to_fraction(value: f64) -> f64 {
    value / 100.0
}

/// All parameters, in prompt order.
pub static PARAMS: [QueryParam; 10] = [
    QueryParam {
        name: ParamName::UsExchangesOnly,
        prompt: "US exchanges only? yes/no or '-':",
        kind: ParamKind::Flag,
        default: ParamValue::Flag(true),
        postprocess: None,
        order: 0,
    },
    QueryParam {
        name: ParamName::MinPrice,
        prompt: "Min price (e.g. 1 or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Number(1.0),
        postprocess: None,
        order: 1,
    },
    QueryParam {
        name: ParamName::MinRelativeVolume,
        prompt: "Min relative volume (e.g. 1.5 or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Number(1.0),
        postprocess: None,
        order: 2,
    },
    QueryParam {
        name: ParamName::MinChange,
        prompt: "Min % change (e.g. 5 or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Unset,
        postprocess: Some(percent_to_fraction),
        order: 3,
    },
    QueryParam {
        name: ParamName::MinSma20AbovePct,
        prompt: "Min SMA20/close ratio (e.g. 1.1 or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Number(1.1),
        postprocess: None,
        order: 4,
    },
    QueryParam {
        name: ParamName::MaxSma20AbovePct,
        prompt: "Max SMA20/close ratio (or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Unset,
        postprocess: None,
        order: 5,
    },
    QueryParam {
        name: ParamName::MinAtrPct,
        prompt: "Min ATR % (e.g. 5 or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Number(5.0),
        postprocess: None,
        order: 6,
    },
    QueryParam {
        name: ParamName::MaxAtrPct,
        prompt: "Max ATR % (e.g. 10 or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Unset,
        postprocess: None,
        order: 7,
    },
    QueryParam {
        name: ParamName::MinAdrPct,
        prompt: "Min ADR % (e.g. 3 or '-'):",
        kind: ParamKind::Number,
        default: ParamValue::Number(3.0),
        postprocess: None,
        order: 8,
    },
    QueryParam {
        name: ParamName::BullishCandlestickPatternsOnly,
        prompt: "Only bullish candlestick patterns? yes/no or '-':",
        kind: ParamKind::Flag,
        default: ParamValue::Flag(true),
        postprocess: None,
        order: 9,
    },
];

impl QueryParam {
    /// Look up a parameter by name.
    pub fn get(name: ParamName) -> &'static QueryParam {
        // The table holds every variant, in declaration order.
        &PARAMS[name as usize]
    }

    /// Parse one free-text reply into a value, applying `postprocess`.
    pub fn parse(&self, raw: &str) -> Result<ParamValue, InvalidParameter> {
        let parsed = match self.kind {
            ParamKind::Flag => parse_optional_bool(raw).map(ParamValue::Flag),
            ParamKind::Number => parse_optional_float(raw).map(|v| ParamValue::Number(self.apply(v))),
        };

        match parsed {
            Parsed::Value(value) => Ok(value),
            Parsed::Unset => Ok(ParamValue::Unset),
            Parsed::Invalid => Err(InvalidParameter::Unparseable {
                name: self.name,
                prompt: self.prompt,
                input: raw.to_string(),
            }),
        }
    }

    /// Run `postprocess` on a parsed number.
    pub fn apply(&self, value: f64) -> f64 {
        self.postprocess.map_or(value, |f| f(value))
    }
}

// ============================================================================
// Screen Parameters
// ============================================================================

/// A complete, typed parameter set. `None` means "do not filter".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenParams {
    pub us_exchanges_only: bool,
    pub min_price: Option<f64>,
    pub min_relative_volume: Option<f64>,
    /// Fraction, not percent (5% is 0.05)
    pub min_change: Option<f64>,
    pub min_sma20_above_pct: Option<f64>,
    pub max_sma20_above_pct: Option<f64>,
    pub min_atr_pct: Option<f64>,
    pub max_atr_pct: Option<f64>,
    pub min_adr_pct: Option<f64>,
    pub bullish_candlestick_patterns_only: bool,
}

impl Default for ScreenParams {
    fn default() -> Self {
        let mut params = Self::unfiltered();
        for param in &PARAMS {
            params.set(param.name, param.default);
        }
        params
    }
}

impl ScreenParams {
    /// Every optional filter off.
    pub fn unfiltered() -> Self {
        Self {
            us_exchanges_only: false,
            min_price: None,
            min_relative_volume: None,
            min_change: None,
            min_sma20_above_pct: None,
            max_sma20_above_pct: None,
            min_atr_pct: None,
            max_atr_pct: None,
            min_adr_pct: None,
            bullish_candlestick_patterns_only: false,
        }
    }

    fn number_slot(&mut self, name: ParamName) -> Option<&mut Option<f64>> {
        match name {
            ParamName::MinPrice => Some(&mut self.min_price),
            ParamName::MinRelativeVolume => Some(&mut self.min_relative_volume),
            ParamName::MinChange => Some(&mut self.min_change),
            ParamName::MinSma20AbovePct => Some(&mut self.min_sma20_above_pct),
            ParamName::MaxSma20AbovePct => Some(&mut self.max_sma20_above_pct),
            ParamName::MinAtrPct => Some(&mut self.min_atr_pct),
            ParamName::MaxAtrPct => Some(&mut self.max_atr_pct),
            ParamName::MinAdrPct => Some(&mut self.min_adr_pct),
            ParamName::UsExchangesOnly | ParamName::BullishCandlestickPatternsOnly => None,
        }
    }

    fn flag_slot(&mut self, name: ParamName) -> Option<&mut bool> {
        match name {
            ParamName::UsExchangesOnly => Some(&mut self.us_exchanges_only),
            ParamName::BullishCandlestickPatternsOnly => {
                Some(&mut self.bullish_candlestick_patterns_only)
            }
            _ => None,
        }
    }

    /// Store an already-parsed value. A value of the wrong kind is ignored;
    /// `Unset` turns a flag off.
    pub fn set(&mut self, name: ParamName, value: ParamValue) {
        match value {
            ParamValue::Number(n) => {
                if let Some(slot) = self.number_slot(name) {
                    *slot = Some(n);
                }
            }
            ParamValue::Flag(b) => {
                if let Some(slot) = self.flag_slot(name) {
                    *slot = b;
                }
            }
            ParamValue::Unset => {
                if let Some(slot) = self.number_slot(name) {
                    *slot = None;
                } else if let Some(slot) = self.flag_slot(name) {
                    *slot = false;
                }
            }
        }
    }

    /// Current value of a parameter.
    pub fn get(&self, name: ParamName) -> ParamValue {
        let number = |v: Option<f64>| v.map_or(ParamValue::Unset, ParamValue::Number);
        match name {
            ParamName::UsExchangesOnly => ParamValue::Flag(self.us_exchanges_only),
            ParamName::MinPrice => number(self.min_price),
            ParamName::MinRelativeVolume => number(self.min_relative_volume),
            ParamName::MinChange => number(self.min_change),
            ParamName::MinSma20AbovePct => number(self.min_sma20_above_pct),
            ParamName::MaxSma20AbovePct => number(self.max_sma20_above_pct),
            ParamName::MinAtrPct => number(self.min_atr_pct),
            ParamName::MaxAtrPct => number(self.max_atr_pct),
            ParamName::MinAdrPct => number(self.min_adr_pct),
            ParamName::BullishCandlestickPatternsOnly => {
                ParamValue::Flag(self.bullish_candlestick_patterns_only)
            }
        }
    }
}

/// Serializable view of a parameter for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ParamInfo {
    pub name: ParamName,
    pub prompt: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub order: usize,
}

impl From<&QueryParam> for ParamInfo {
    fn from(param: &QueryParam) -> Self {
        Self {
            name: param.name,
            prompt: param.prompt,
            kind: param.kind,
            default: param.default,
            order: param.order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_names() {
        for (idx, param) in PARAMS.iter().enumerate() {
            assert_eq!(param.order, idx);
            assert_eq!(param.name as usize, idx);
            assert_eq!(QueryParam::get(param.name).name, param.name);
        }
    }

    #[test]
    fn test_defaults() {
        let params = ScreenParams::default();
        assert!(params.us_exchanges_only);
        assert_eq!(params.min_price, Some(1.0));
        assert_eq!(params.min_relative_volume, Some(1.0));
        assert_eq!(params.min_change, None);
        assert_eq!(params.min_sma20_above_pct, Some(1.1));
        assert_eq!(params.max_sma20_above_pct, None);
        assert_eq!(params.min_atr_pct, Some(5.0));
        assert_eq!(params.max_atr_pct, None);
        assert_eq!(params.min_adr_pct, Some(3.0));
        assert!(params.bullish_candlestick_patterns_only);
    }

    #[test]
    fn test_parse_applies_postprocess() {
        let param = QueryParam::get(ParamName::MinChange);
        assert_eq!(param.parse("5"), Ok(ParamValue::Number(0.05)));
        assert_eq!(param.parse("-"), Ok(ParamValue::Unset));
    }

    #[test]
    fn test_parse_invalid_carries_prompt() {
        let param = QueryParam::get(ParamName::MinPrice);
        let err = param.parse("cheap").unwrap_err();
        assert!(matches!(
            err,
            InvalidParameter::Unparseable { name: ParamName::MinPrice, .. }
        ));
        assert!(err.to_string().contains(param.prompt));
    }

    #[test]
    fn test_flag_parse() {
        let param = QueryParam::get(ParamName::UsExchangesOnly);
        assert_eq!(param.parse("yes"), Ok(ParamValue::Flag(true)));
        assert_eq!(param.parse("-"), Ok(ParamValue::Flag(false)));
        assert!(param.parse("sure").is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut params = ScreenParams::unfiltered();
        params.set(ParamName::MaxAtrPct, ParamValue::Number(10.0));
        params.set(ParamName::UsExchangesOnly, ParamValue::Flag(true));
        assert_eq!(params.get(ParamName::MaxAtrPct), ParamValue::Number(10.0));
        assert_eq!(params.get(ParamName::UsExchangesOnly), ParamValue::Flag(true));

        params.set(ParamName::MaxAtrPct, ParamValue::Unset);
        assert_eq!(params.max_atr_pct, None);

        // Wrong kind is ignored
        params.set(ParamName::MinPrice, ParamValue::Flag(true));
        assert_eq!(params.min_price, None);
    }

    #[test]
    fn test_name_from_str() {
        assert_eq!("min_adr_pct".parse::<ParamName>(), Ok(ParamName::MinAdrPct));
        assert!("max_adr_pct".parse::<ParamName>().is_err());
    }
}
