//! Per-market constants: currency, quote link, volume multiplier, price floor.

use crate::domain::error::ScannerError;
use crate::ports::config_port::ConfigPort;

pub const NAVER_LINK_TEMPLATE: &str = "https://m.stock.naver.com/domestic/stock/{code}/total";

const DEFAULT_VOLUME_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketProfile {
    pub id: String,
    pub currency: String,
    /// Quote page URL with a `{code}` placeholder.
    pub link_template: Option<String>,
    /// Multiplier for the volume-spike leg of the built-in screens.
    pub volume_multiplier: f64,
    /// Price floor for the golden-cross screen.
    pub min_close: f64,
}

impl MarketProfile {
    /// Built-in profile. Unknown markets get neutral defaults: no currency
    /// suffix, no link, 1.5x volume, no price floor.
    pub fn builtin(id: &str) -> Self {
        let id = id.trim().to_uppercase();
        match id.as_str() {
            "KOSPI" => Self {
                id,
                currency: "원".to_string(),
                link_template: Some(NAVER_LINK_TEMPLATE.to_string()),
                volume_multiplier: 1.5,
                min_close: 1000.0,
            },
            "KOSDAQ" => Self {
                id,
                currency: "원".to_string(),
                link_template: Some(NAVER_LINK_TEMPLATE.to_string()),
                volume_multiplier: 2.0,
                min_close: 1000.0,
            },
            _ => Self {
                id,
                currency: String::new(),
                link_template: None,
                volume_multiplier: DEFAULT_VOLUME_MULTIPLIER,
                min_close: 0.0,
            },
        }
    }

    /// Built-in profile overlaid with the `[market.<ID>]` section.
    pub fn from_config(config: &dyn ConfigPort, id: &str) -> Result<Self, ScannerError> {
        let mut profile = Self::builtin(id);
        let section = format!("market.{}", profile.id);

        if let Some(currency) = config.get_string(&section, "currency") {
            profile.currency = currency.trim().to_string();
        }
        if let Some(template) = config.get_string(&section, "link_template") {
            let template = template.trim();
            profile.link_template = if template.is_empty() {
                None
            } else if template.contains("{code}") {
                Some(template.to_string())
            } else {
                return Err(ScannerError::ConfigInvalid {
                    section,
                    key: "link_template".to_string(),
                    reason: "link_template must contain {code}".to_string(),
                });
            };
        }

        profile.volume_multiplier =
            config.get_double(&section, "volume_multiplier", profile.volume_multiplier);
        if !(profile.volume_multiplier.is_finite() && profile.volume_multiplier > 0.0) {
            return Err(ScannerError::ConfigInvalid {
                section,
                key: "volume_multiplier".to_string(),
                reason: "volume_multiplier must be positive".to_string(),
            });
        }

        profile.min_close = config.get_double(&section, "min_close", profile.min_close);
        if !(profile.min_close.is_finite() && profile.min_close >= 0.0) {
            return Err(ScannerError::ConfigInvalid {
                section,
                key: "min_close".to_string(),
                reason: "min_close must be non-negative".to_string(),
            });
        }

        Ok(profile)
    }

    pub fn link_for(&self, code: &str) -> Option<String> {
        self.link_template
            .as_ref()
            .map(|template| template.replace("{code}", code))
    }

    /// Price with thousands separators and the market's currency suffix.
    /// Whole prices print without decimals; anything else keeps two.
    pub fn format_price(&self, price: f64) -> String {
        let text = if price.fract() == 0.0 {
            format!("{:.0}", price)
        } else {
            format!("{:.2}", price)
        };
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (text.as_str(), None),
        };
        let (sign, digits) = match int_part.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", int_part),
        };

        let mut grouped = String::new();
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        let mut out = format!("{}{}", sign, grouped);
        if let Some(frac) = frac_part {
            out.push('.');
            out.push_str(frac);
        }
        out.push_str(&self.currency);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn builtin_korean_markets() {
        let kospi = MarketProfile::builtin("kospi");
        assert_eq!(kospi.id, "KOSPI");
        assert_eq!(kospi.currency, "원");
        assert_eq!(kospi.volume_multiplier, 1.5);
        assert_eq!(kospi.min_close, 1000.0);

        let kosdaq = MarketProfile::builtin("KOSDAQ");
        assert_eq!(kosdaq.volume_multiplier, 2.0);
        assert_eq!(
            kosdaq.link_for("091990").as_deref(),
            Some("https://m.stock.naver.com/domestic/stock/091990/total")
        );
    }

    #[test]
    fn unknown_market_is_neutral() {
        let profile = MarketProfile::builtin("ASX");
        assert_eq!(profile.currency, "");
        assert_eq!(profile.link_for("BHP"), None);
        assert_eq!(profile.min_close, 0.0);
    }

    #[test]
    fn config_overrides_builtin() {
        let config = FileConfigAdapter::from_string(
            "[market.KOSPI]\nvolume_multiplier = 3\nmin_close = 5000\nlink_template = https://example.com/q/{code}\n",
        )
        .unwrap();
        let profile = MarketProfile::from_config(&config, "KOSPI").unwrap();
        assert_eq!(profile.volume_multiplier, 3.0);
        assert_eq!(profile.min_close, 5000.0);
        assert_eq!(
            profile.link_for("005930").as_deref(),
            Some("https://example.com/q/005930")
        );
        assert_eq!(profile.currency, "원");
    }

    #[test]
    fn config_rejects_bad_values() {
        let config =
            FileConfigAdapter::from_string("[market.KOSPI]\nvolume_multiplier = 0\n").unwrap();
        assert!(matches!(
            MarketProfile::from_config(&config, "KOSPI"),
            Err(ScannerError::ConfigInvalid { .. })
        ));

        let config =
            FileConfigAdapter::from_string("[market.NYSE]\nlink_template = https://x.test\n")
                .unwrap();
        assert!(MarketProfile::from_config(&config, "NYSE").is_err());
    }

    #[test]
    fn format_price_groups_thousands() {
        let kospi = MarketProfile::builtin("KOSPI");
        assert_eq!(kospi.format_price(71200.0), "71,200원");
        assert_eq!(kospi.format_price(1234567.0), "1,234,567원");
        assert_eq!(kospi.format_price(999.0), "999원");

        let neutral = MarketProfile::builtin("NYSE");
        assert_eq!(neutral.format_price(1234.5), "1,234.50");
    }
}
