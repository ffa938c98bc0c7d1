//! Sponsorship price from average views and a named conversion-rate scenario.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    Conservative,
    #[default]
    Median,
    BestCase,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Conservative, Scenario::Median, Scenario::BestCase];

    pub fn rate(self) -> f64 {
        match self {
            Scenario::Conservative => 0.003,
            Scenario::Median => 0.0035,
            Scenario::BestCase => 0.005,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Conservative => "conservative",
            Scenario::Median => "median",
            Scenario::BestCase => "best-case",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Scenario::Conservative => "Conservative (0.3%)",
            Scenario::Median => "Median (0.35%)",
            Scenario::BestCase => "Best Case (0.5%)",
        }
    }

    pub fn from_rate(rate: f64) -> Option<Scenario> {
        Self::ALL
            .into_iter()
            .find(|s| (s.rate() - rate).abs() < 1e-12)
    }

    pub fn price(self, average_views: u64) -> u64 {
        price_at(average_views, self.rate())
    }

    pub fn quote(self, average_views: u64) -> PriceQuote {
        PriceQuote {
            scenario: self,
            label: self.label().to_string(),
            rate: self.rate(),
            average_views,
            price: self.price(average_views),
        }
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|sc| sc.name() == key || (key == "best" && *sc == Scenario::BestCase))
            .ok_or_else(|| {
                Error::InvalidScenario(format!(
                    "unknown scenario {s:?} (allowed: conservative, median, best-case)"
                ))
            })
    }
}

fn price_at(average_views: u64, rate: f64) -> u64 {
    (average_views as f64 * rate).round() as u64
}

/// `round(average_views * conversion_rate)`. The rate must be one of the
/// [`Scenario`] rates.
pub fn recommended_price(average_views: u64, conversion_rate: f64) -> Result<u64> {
    if !conversion_rate.is_finite() || conversion_rate <= 0.0 {
        return Err(Error::InvalidScenario(format!(
            "conversion rate must be a positive fraction, got {conversion_rate}"
        )));
    }
    let scenario = Scenario::from_rate(conversion_rate).ok_or_else(|| {
        Error::InvalidScenario(format!(
            "conversion rate {conversion_rate} is not one of the configured scenarios"
        ))
    })?;
    Ok(scenario.price(average_views))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub scenario: Scenario,
    pub label: String,
    pub rate: f64,
    pub average_views: u64,
    pub price: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_rate_on_ten_thousand_views() {
        assert_eq!(recommended_price(10_000, 0.0035).unwrap(), 35);
        assert_eq!(Scenario::Median.price(10_000), 35);
    }

    #[test]
    fn every_scenario_rate_is_accepted() {
        for s in Scenario::ALL {
            assert_eq!(recommended_price(200_000, s.rate()).unwrap(), s.price(200_000));
        }
        assert_eq!(Scenario::Conservative.price(200_000), 600);
        assert_eq!(Scenario::BestCase.price(200_000), 1000);
        assert_eq!(Scenario::Median.price(0), 0);
    }

    #[test]
    fn out_of_set_rates_are_invalid() {
        for rate in [-0.003, 0.0, 0.004, 1.0, f64::NAN, f64::INFINITY] {
            let err = recommended_price(1_000, rate).unwrap_err();
            assert_eq!(err.kind(), "invalid_scenario", "rate {rate}");
        }
    }

    #[test]
    fn scenario_names_parse() {
        assert_eq!("Median".parse::<Scenario>().unwrap(), Scenario::Median);
        assert_eq!("best_case".parse::<Scenario>().unwrap(), Scenario::BestCase);
        assert_eq!("best".parse::<Scenario>().unwrap(), Scenario::BestCase);
        assert!("wild".parse::<Scenario>().is_err());
        assert_eq!(Scenario::default(), Scenario::Median);
    }

    #[test]
    fn quote_carries_inputs() {
        let q = Scenario::Conservative.quote(12_345);
        assert_eq!(q.price, 37);
        assert_eq!(q.label, "Conservative (0.3%)");
        let js = serde_json::to_value(&q).unwrap();
        assert_eq!(js["scenario"], "conservative");
    }
}
