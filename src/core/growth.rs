use super::error::{CalcError, CalcResult, ensure_finite, require_non_negative};
use super::types::{Compounding, GrowthParams, GrowthPoint};

/// Upper bound on any horizon: 1000 years of monthly periods.
pub const MAX_PERIODS: u32 = 12_000;

pub fn per_period_rate(annual_rate_percent: f64, compounding: Compounding) -> f64 {
    annual_rate_percent / 100.0 / compounding.periods_per_year() as f64
}

/// `(1+r)^n`.
pub fn growth_factor(rate: f64, periods: u32) -> CalcResult<f64> {
    ensure_finite((1.0 + rate).powf(periods as f64), "growth factor (1+r)^n")
}

/// `((1+r)^n - 1) / r`, degenerating to `n` when `r == 0`.
pub fn annuity_factor(rate: f64, periods: u32) -> CalcResult<f64> {
    if periods == 0 {
        return Ok(0.0);
    }
    if rate == 0.0 {
        return Ok(periods as f64);
    }
    // expm1/ln_1p keep precision when r is close to zero
    let factor = (periods as f64 * rate.ln_1p()).exp_m1() / rate;
    ensure_finite(factor, "annuity factor")
}

/// One end-of-period step of the recurrence.
pub fn step(balance: f64, rate: f64, contribution: f64) -> f64 {
    balance * (1.0 + rate) + contribution
}

pub(crate) fn validate_rate(rate: f64) -> CalcResult<()> {
    if !rate.is_finite() {
        return Err(CalcError::invalid("annual rate must be finite"));
    }
    if rate < -1.0 {
        return Err(CalcError::invalid(
            "per-period rate must not fall below -100%",
        ));
    }
    Ok(())
}

fn validate(params: &GrowthParams) -> CalcResult<f64> {
    require_non_negative(params.principal, "principal")?;
    require_non_negative(params.periodic_contribution, "periodic contribution")?;
    if params.periods > MAX_PERIODS {
        return Err(CalcError::invalid(format!(
            "periods must be <= {MAX_PERIODS}"
        )));
    }
    if !params.contribution_growth_percent.is_finite() || params.contribution_growth_percent <= -100.0
    {
        return Err(CalcError::invalid(
            "contribution growth must be finite and > -100%",
        ));
    }
    let rate = per_period_rate(params.annual_rate_percent, params.compounding);
    validate_rate(rate)?;
    Ok(rate)
}

/// Running state of a projection. `project` and the solver's forward search both
/// drive this, so every figure derives from the same recurrence.
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    principal: f64,
    contribution: f64,
    contribution_step_up: f64,
    periods_per_year: u32,
    rate: f64,
    index: u32,
    balance: f64,
    contributions: f64,
}

impl Accumulator {
    pub(crate) fn new(params: &GrowthParams) -> CalcResult<Self> {
        let rate = validate(params)?;
        Ok(Self {
            principal: params.principal,
            contribution: params.periodic_contribution,
            contribution_step_up: params.contribution_growth_percent / 100.0,
            periods_per_year: params.compounding.periods_per_year(),
            rate,
            index: 0,
            balance: params.principal,
            contributions: 0.0,
        })
    }

    fn is_flat(&self) -> bool {
        self.rate == 0.0 && self.contribution_step_up == 0.0
    }

    fn contribution_for(&self, period: u32) -> f64 {
        if self.contribution_step_up == 0.0 {
            return self.contribution;
        }
        let year = (period - 1) / self.periods_per_year;
        self.contribution * (1.0 + self.contribution_step_up).powi(year as i32)
    }

    pub(crate) fn current(&self) -> GrowthPoint {
        GrowthPoint {
            period_index: self.index,
            balance: self.balance,
            cumulative_contributions: self.contributions,
            cumulative_growth: self.balance - self.principal - self.contributions,
        }
    }

    pub(crate) fn advance(&mut self) -> CalcResult<GrowthPoint> {
        let period = self.index + 1;
        if self.is_flat() {
            // P + C*k directly, so zero-rate balances carry no summation drift
            self.contributions = self.contribution * period as f64;
            self.balance = self.principal + self.contributions;
        } else {
            let contribution = self.contribution_for(period);
            self.balance = ensure_finite(
                step(self.balance, self.rate, contribution),
                "projected balance",
            )?;
            self.contributions += contribution;
        }
        self.index = period;
        Ok(self.current())
    }
}

/// Period-by-period trajectory; index 0 is the initial state.
pub fn project(params: &GrowthParams) -> CalcResult<Vec<GrowthPoint>> {
    let mut acc = Accumulator::new(params)?;
    let mut points = Vec::with_capacity(params.periods as usize + 1);
    points.push(acc.current());
    for _ in 0..params.periods {
        points.push(acc.advance()?);
    }
    Ok(points)
}

/// Headline value: the last point of `project`.
pub fn final_point(params: &GrowthParams) -> CalcResult<GrowthPoint> {
    let mut acc = Accumulator::new(params)?;
    let mut point = acc.current();
    for _ in 0..params.periods {
        point = acc.advance()?;
    }
    Ok(point)
}

pub fn final_balance(params: &GrowthParams) -> CalcResult<f64> {
    final_point(params).map(|p| p.balance)
}

/// `FV = P(1+r)^n + C((1+r)^n - 1)/r`. Undefined with a contribution step-up.
pub fn closed_form_future_value(params: &GrowthParams) -> CalcResult<f64> {
    let rate = validate(params)?;
    if params.contribution_growth_percent != 0.0 {
        return Err(CalcError::invalid(
            "closed form requires a flat contribution",
        ));
    }
    let fv = params.principal * growth_factor(rate, params.periods)?
        + params.periodic_contribution * annuity_factor(rate, params.periods)?;
    ensure_finite(fv, "future value")
}

/// Every year-end point (plus index 0), for yearly charts of monthly projections.
pub fn yearly_points(points: &[GrowthPoint], compounding: Compounding) -> Vec<GrowthPoint> {
    let per_year = compounding.periods_per_year();
    let mut yearly: Vec<GrowthPoint> = points
        .iter()
        .filter(|p| p.period_index % per_year == 0)
        .copied()
        .collect();
    if let Some(last) = points.last() {
        if yearly.last().map(|p| p.period_index) != Some(last.period_index) {
            yearly.push(*last);
        }
    }
    yearly
}
