//! Rate selection and compounding primitives shared by every projection.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Economic index families the engine knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFamily {
    /// Índice Nacional de Custo da Construção.
    Incc,
    /// Índice Nacional de Preços ao Consumidor Amplo.
    Ipca,
    /// Índice Geral de Preços do Mercado.
    Igpm,
    /// Custo Unitário Básico da construção.
    Cub,
}

impl IndexFamily {
    pub const ALL: [IndexFamily; 4] = [
        IndexFamily::Incc,
        IndexFamily::Ipca,
        IndexFamily::Igpm,
        IndexFamily::Cub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexFamily::Incc => "incc",
            IndexFamily::Ipca => "ipca",
            IndexFamily::Igpm => "igpm",
            IndexFamily::Cub => "cub",
        }
    }
}

impl fmt::Display for IndexFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "incc" | "inccm" | "inccdi" => Ok(IndexFamily::Incc),
            "ipca" => Ok(IndexFamily::Ipca),
            "igpm" => Ok(IndexFamily::Igpm),
            "cub" => Ok(IndexFamily::Cub),
            _ => Err(anyhow::anyhow!("Unknown index family: {s}")),
        }
    }
}

/// How a monthly rate is chosen for correction or appreciation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RateMode {
    /// A fixed monthly percentage supplied by the caller (0.5 for 0.5%).
    Manual(Decimal),
    /// Monthly percentages read from an index family's historical cycle.
    Index(IndexFamily),
}

impl Default for RateMode {
    fn default() -> Self {
        RateMode::Manual(Decimal::ZERO)
    }
}

impl FromStr for RateMode {
    type Err = anyhow::Error;

    /// Parses `"manual"`, `"manual:0.5"` or an index family name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("manual") {
            let rate = rest.trim_start_matches([':', '=']).trim();
            if rate.is_empty() {
                return Ok(RateMode::Manual(Decimal::ZERO));
            }
            let value = Decimal::from_str(rate)
                .map_err(|e| anyhow::anyhow!("Invalid manual rate '{rate}': {e}"))?;
            return Ok(RateMode::Manual(value));
        }
        Ok(RateMode::Index(trimmed.parse()?))
    }
}

/// Running product of `(1 + rate)` over successive months.
///
/// Month zero has a factor of one; each call to [`CompoundingFactor::advance`]
/// folds in the rate for the next month. Negative rates compound as-is.
///
/// Once the product no longer fits in a [`Decimal`] it stops compounding and
/// holds its last representable value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompoundingFactor {
    value: Decimal,
    saturated: bool,
}

impl CompoundingFactor {
    pub fn new() -> Self {
        Self {
            value: Decimal::ONE,
            saturated: false,
        }
    }

    /// Folds one monthly rate (as a decimal fraction) into the product.
    pub fn advance(&mut self, rate: Decimal) -> Decimal {
        if self.saturated {
            return self.value;
        }
        match Decimal::ONE
            .checked_add(rate)
            .and_then(|step| self.value.checked_mul(step))
        {
            Some(value) => self.value = value,
            None => {
                warn!(factor = %self.value, rate = %rate, "compounding overflowed, holding factor");
                self.saturated = true;
            }
        }
        self.value
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}

impl Default for CompoundingFactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::MathematicalOps;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("INCC", IndexFamily::Incc)]
    #[case("incc-m", IndexFamily::Incc)]
    #[case("IGP-M", IndexFamily::Igpm)]
    #[case(" ipca ", IndexFamily::Ipca)]
    #[case("Cub", IndexFamily::Cub)]
    fn test_index_family_parsing_ignores_case_and_punctuation(
        #[case] raw: &str,
        #[case] expected: IndexFamily,
    ) {
        assert_eq!(raw.parse::<IndexFamily>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_family_is_an_error() {
        assert!("selic".parse::<IndexFamily>().is_err());
    }

    #[rstest]
    #[case("manual", RateMode::Manual(dec!(0)))]
    #[case("Manual:0.75", RateMode::Manual(dec!(0.75)))]
    #[case("manual=-0.2", RateMode::Manual(dec!(-0.2)))]
    #[case("cub", RateMode::Index(IndexFamily::Cub))]
    fn test_rate_mode_parsing(#[case] raw: &str, #[case] expected: RateMode) {
        assert_eq!(raw.parse::<RateMode>().unwrap(), expected);
    }

    #[test]
    fn test_rate_mode_serializes_as_tagged_variant() {
        let json = serde_json::to_string(&RateMode::Index(IndexFamily::Igpm)).unwrap();
        assert_eq!(json, r#"{"kind":"index","value":"igpm"}"#);
    }

    #[test]
    fn test_compounding_factor_handles_negative_months() {
        let mut factor = CompoundingFactor::new();
        assert_eq!(factor.value(), dec!(1));
        factor.advance(dec!(0.01));
        factor.advance(dec!(-0.01));
        assert_eq!(factor.value(), dec!(0.9999));

        let mut steady = CompoundingFactor::new();
        for _ in 0..12 {
            steady.advance(dec!(0.01));
        }
        assert_eq!(steady.value(), dec!(1.01).powu(12));
    }

    #[test]
    fn test_compounding_factor_holds_once_it_overflows() {
        let mut factor = CompoundingFactor::new();
        let mut previous = factor.value();
        for _ in 0..720 {
            let value = factor.advance(dec!(0.1));
            assert!(value >= previous);
            previous = value;
        }

        assert!(factor.is_saturated());
        assert!(factor.value() > dec!(1_000_000_000_000_000_000_000_000_000));
        assert_eq!(factor.advance(dec!(-0.5)), previous);
    }
}
