//! Severance-pay (TFR) and pension-fund tax coefficients.
//!
//! These mirror the figures the calculators have always used. Their legal basis has not
//! been reviewed, so they are plain data with `Default` values that callers can override.

use serde::{Deserialize, Serialize};

use super::error::{CalcError, CalcResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TfrPolicy {
    /// Fixed part of the yearly revaluation.
    pub fixed_revaluation_percent: f64,
    /// Share of inflation added to the revaluation.
    pub inflation_share: f64,
    /// Substitute tax withheld every year on the revaluation.
    pub revaluation_tax_percent: f64,
    /// Separate taxation applied when the employer pays the TFR out.
    pub separate_taxation_percent: f64,
}

impl Default for TfrPolicy {
    fn default() -> Self {
        Self {
            fixed_revaluation_percent: 1.5,
            inflation_share: 0.75,
            revaluation_tax_percent: 17.0,
            separate_taxation_percent: 23.0,
        }
    }
}

impl TfrPolicy {
    pub fn revaluation_percent(&self, inflation_percent: f64) -> f64 {
        self.fixed_revaluation_percent + self.inflation_share * inflation_percent
    }

    /// Yearly revaluation after the substitute tax.
    pub fn net_revaluation_percent(&self, inflation_percent: f64) -> f64 {
        self.revaluation_percent(inflation_percent) * (1.0 - self.revaluation_tax_percent / 100.0)
    }

    pub fn validate(&self) -> CalcResult<()> {
        check_percent(self.revaluation_tax_percent, "TFR revaluation tax")?;
        check_percent(self.separate_taxation_percent, "TFR separate taxation")?;
        if !self.fixed_revaluation_percent.is_finite() || !self.inflation_share.is_finite() {
            return Err(CalcError::invalid("TFR revaluation coefficients must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PensionFundPolicy {
    /// Tax withheld every year on the fund's returns.
    pub annual_return_tax_percent: f64,
    pub base_final_tax_percent: f64,
    pub floor_final_tax_percent: f64,
    /// Reduction per year of membership past `reduction_after_years`.
    pub reduction_per_year_percent: f64,
    pub reduction_after_years: u32,
}

impl Default for PensionFundPolicy {
    fn default() -> Self {
        Self {
            annual_return_tax_percent: 20.0,
            base_final_tax_percent: 15.0,
            floor_final_tax_percent: 9.0,
            reduction_per_year_percent: 0.3,
            reduction_after_years: 15,
        }
    }
}

impl PensionFundPolicy {
    pub fn net_return_percent(&self, gross_return_percent: f64) -> f64 {
        if gross_return_percent <= 0.0 {
            // losses carry no withholding
            return gross_return_percent;
        }
        gross_return_percent * (1.0 - self.annual_return_tax_percent / 100.0)
    }

    /// Final tax rate after `membership_years` in the fund, linear between base and floor.
    pub fn final_tax_percent(&self, membership_years: u32) -> f64 {
        let extra_years = membership_years.saturating_sub(self.reduction_after_years);
        (self.base_final_tax_percent - self.reduction_per_year_percent * extra_years as f64)
            .max(self.floor_final_tax_percent)
    }

    pub fn validate(&self) -> CalcResult<()> {
        check_percent(self.annual_return_tax_percent, "pension fund return tax")?;
        check_percent(self.base_final_tax_percent, "pension fund final tax")?;
        check_percent(self.floor_final_tax_percent, "pension fund floor tax")?;
        if self.floor_final_tax_percent > self.base_final_tax_percent {
            return Err(CalcError::invalid(
                "pension fund floor tax must not exceed the base rate",
            ));
        }
        if !self.reduction_per_year_percent.is_finite() || self.reduction_per_year_percent < 0.0 {
            return Err(CalcError::invalid(
                "pension fund yearly reduction must be >= 0",
            ));
        }
        Ok(())
    }
}

fn check_percent(value: f64, what: &str) -> CalcResult<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(CalcError::invalid(format!(
            "{what} must be between 0 and 100 percent"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn tfr_revaluation_tracks_inflation() {
        let policy = TfrPolicy::default();
        assert_close(policy.revaluation_percent(2.0), 3.0, 1e-12);
        assert_close(policy.net_revaluation_percent(2.0), 2.49, 1e-12);
    }

    #[test]
    fn fund_final_tax_declines_to_floor() {
        let policy = PensionFundPolicy::default();
        assert_close(policy.final_tax_percent(10), 15.0, 1e-12);
        assert_close(policy.final_tax_percent(15), 15.0, 1e-12);
        assert_close(policy.final_tax_percent(25), 12.0, 1e-12);
        assert_close(policy.final_tax_percent(35), 9.0, 1e-12);
        assert_close(policy.final_tax_percent(50), 9.0, 1e-12);
    }

    #[test]
    fn fund_losses_are_not_withheld() {
        let policy = PensionFundPolicy::default();
        assert_close(policy.net_return_percent(5.0), 4.0, 1e-12);
        assert_eq!(policy.net_return_percent(-3.0), -3.0);
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let policy: PensionFundPolicy =
            serde_json::from_str(r#"{"baseFinalTaxPercent": 14.0}"#).expect("valid json");
        assert_eq!(policy.base_final_tax_percent, 14.0);
        assert_eq!(policy.floor_final_tax_percent, 9.0);
    }

    #[test]
    fn validation_rejects_inverted_floor() {
        let policy = PensionFundPolicy {
            floor_final_tax_percent: 20.0,
            ..PensionFundPolicy::default()
        };
        assert!(policy.validate().is_err());
        assert!(TfrPolicy::default().validate().is_ok());
    }
}
