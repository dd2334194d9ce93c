//! Structured screening request.
//!
//! JSON body accepted by the query endpoint. A missing field takes the
//! parameter default, an explicit `null` switches the filter off. `min_change`
//! is given in percent and converted with the parameter's postprocess step.

use serde::{Deserialize, Deserializer, Serialize};

use super::{InvalidParameter, ParamName, ParamValue, QueryParam, ScreenParams};

/// Distinguish an absent field (`None`) from an explicit null (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenRequest {
    #[serde(default, deserialize_with = "present")]
    pub us_exchanges_only: Option<Option<bool>>,
    #[serde(default, deserialize_with = "present")]
    pub min_price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub min_relative_volume: Option<Option<f64>>,
    /// Percent (5 means 5%)
    #[serde(default, deserialize_with = "present")]
    pub min_change: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub min_sma20_above_pct: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub max_sma20_above_pct: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub min_atr_pct: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub max_atr_pct: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub min_adr_pct: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub bullish_candlestick_patterns_only: Option<Option<bool>>,
}

impl ScreenRequest {
    fn number(&self, name: ParamName) -> Option<Option<f64>> {
        match name {
            ParamName::MinPrice => self.min_price,
            ParamName::MinRelativeVolume => self.min_relative_volume,
            ParamName::MinChange => self.min_change,
            ParamName::MinSma20AbovePct => self.min_sma20_above_pct,
            ParamName::MaxSma20AbovePct => self.max_sma20_above_pct,
            ParamName::MinAtrPct => self.min_atr_pct,
            ParamName::MaxAtrPct => self.max_atr_pct,
            ParamName::MinAdrPct => self.min_adr_pct,
            ParamName::UsExchangesOnly | ParamName::BullishCandlestickPatternsOnly => None,
        }
    }

    fn flag(&self, name: ParamName) -> Option<Option<bool>> {
        match name {
            ParamName::UsExchangesOnly => self.us_exchanges_only,
            ParamName::BullishCandlestickPatternsOnly => self.bullish_candlestick_patterns_only,
            _ => None,
        }
    }

    /// Resolve into a full parameter set.
    pub fn into_params(self) -> Result<ScreenParams, InvalidParameter> {
        let mut params = ScreenParams::default();

        for name in super::PARAMS.iter().map(|p| p.name) {
            let param = QueryParam::get(name);

            if let Some(value) = self.flag(name) {
                params.set(name, value.map_or(ParamValue::Unset, ParamValue::Flag));
                continue;
            }

            match self.number(name) {
                None => {}
                Some(None) => params.set(name, ParamValue::Unset),
                Some(Some(v)) if !v.is_finite() => {
                    return Err(InvalidParameter::OutOfRange {
                        name,
                        reason: "must be a finite number".into(),
                    });
                }
                Some(Some(v)) => params.set(name, ParamValue::Number(param.apply(v))),
            }
        }

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request_uses_defaults() {
        let request: ScreenRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.into_params().unwrap(), ScreenParams::default());
    }

    #[test]
    fn test_null_unsets_filter() {
        let request: ScreenRequest =
            serde_json::from_str(r#"{"min_price": null, "us_exchanges_only": null}"#).unwrap();
        let params = request.into_params().unwrap();
        assert_eq!(params.min_price, None);
        assert!(!params.us_exchanges_only);
        assert_eq!(params.min_atr_pct, Some(5.0));
    }

    #[test]
    fn test_min_change_percent_conversion() {
        let request: ScreenRequest = serde_json::from_str(r#"{"min_change": 5}"#).unwrap();
        let params = request.into_params().unwrap();
        assert_eq!(params.min_change, Some(0.05));
    }

    #[test]
    fn test_explicit_values() {
        let request: ScreenRequest = serde_json::from_str(
            r#"{"max_atr_pct": 10, "bullish_candlestick_patterns_only": false}"#,
        )
        .unwrap();
        let params = request.into_params().unwrap();
        assert_eq!(params.max_atr_pct, Some(10.0));
        assert!(!params.bullish_candlestick_patterns_only);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_str::<ScreenRequest>(r#"{"min_volume": 5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let request = ScreenRequest {
            min_price: Some(Some(f64::INFINITY)),
            ..Default::default()
        };
        assert!(matches!(
            request.into_params(),
            Err(InvalidParameter::OutOfRange { name: ParamName::MinPrice, .. })
        ));
    }
}
