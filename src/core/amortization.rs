use super::error::{CalcError, CalcResult, ensure_finite};
use super::growth::{MAX_PERIODS, annuity_factor, growth_factor, per_period_rate};
use super::types::{AmortizationRow, Compounding, LoanParams, LoanSummary, RateReset};

/// Fixed installment for `principal` over `periods` at per-period `rate`.
pub fn payment(principal: f64, rate: f64, periods: u32) -> CalcResult<f64> {
    if periods == 0 {
        return Err(CalcError::invalid("periods must be > 0"));
    }
    if rate == 0.0 {
        return Ok(principal / periods as f64);
    }
    // P*r(1+r)^n / ((1+r)^n - 1), written through the shared annuity factor
    let installment = principal * growth_factor(rate, periods)? / annuity_factor(rate, periods)?;
    ensure_finite(installment, "loan payment")
}

fn validate_loan(principal: f64, periods: u32) -> CalcResult<()> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(CalcError::invalid("loan principal must be > 0"));
    }
    if periods == 0 {
        return Err(CalcError::invalid("loan periods must be > 0"));
    }
    if periods > MAX_PERIODS {
        return Err(CalcError::invalid(format!(
            "loan periods must be <= {MAX_PERIODS}"
        )));
    }
    Ok(())
}

fn validate_loan_rate(annual_rate_percent: f64) -> CalcResult<()> {
    if !annual_rate_percent.is_finite() || annual_rate_percent < 0.0 {
        return Err(CalcError::invalid("loan rate must be a finite value >= 0"));
    }
    Ok(())
}

pub fn schedule(params: &LoanParams) -> CalcResult<Vec<AmortizationRow>> {
    schedule_with_resets(
        params.principal,
        params.periods,
        &[RateReset {
            from_period: 1,
            annual_rate_percent: params.annual_rate_percent,
        }],
    )
}

/// Variable-rate schedule: at every reset the installment is recomputed over the
/// remaining term from the outstanding balance. A single reset at period 1 is a
/// fixed-rate loan.
pub fn schedule_with_resets(
    principal: f64,
    periods: u32,
    resets: &[RateReset],
) -> CalcResult<Vec<AmortizationRow>> {
    validate_loan(principal, periods)?;
    match resets.first() {
        Some(first) if first.from_period == 1 => {}
        _ => return Err(CalcError::invalid("first rate reset must start at period 1")),
    }
    for pair in resets.windows(2) {
        if pair[1].from_period <= pair[0].from_period {
            return Err(CalcError::invalid(
                "rate resets must be in strictly increasing period order",
            ));
        }
    }
    if let Some(last) = resets.last() {
        if last.from_period > periods {
            return Err(CalcError::invalid("rate reset falls after the final period"));
        }
    }
    for reset in resets {
        validate_loan_rate(reset.annual_rate_percent)?;
    }

    let mut rows = Vec::with_capacity(periods as usize);
    let mut remaining = principal;
    let mut rate = 0.0;
    let mut installment = 0.0;
    let mut pending = resets.iter().peekable();

    for period in 1..=periods {
        if let Some(reset) = pending.next_if(|r| r.from_period == period) {
            rate = per_period_rate(reset.annual_rate_percent, Compounding::Monthly);
            installment = payment(remaining, rate, periods - period + 1)?;
        }

        let interest = remaining * rate;
        let (principal_portion, row_payment) = if period == periods {
            // final row absorbs the rounding residue so the loan closes at exactly 0
            (remaining, interest + remaining)
        } else {
            (installment - interest, installment)
        };
        remaining = if period == periods {
            0.0
        } else {
            remaining - principal_portion
        };

        rows.push(AmortizationRow {
            period_index: period,
            payment: row_payment,
            interest_portion: interest,
            principal_portion,
            remaining_balance: remaining,
        });
    }

    Ok(rows)
}

impl LoanSummary {
    pub fn from_rows(rows: &[AmortizationRow]) -> Self {
        Self {
            payment: rows.first().map_or(0.0, |r| r.payment),
            total_paid: rows.iter().map(|r| r.payment).sum(),
            total_interest: rows.iter().map(|r| r.interest_portion).sum(),
        }
    }
}

pub fn summary(params: &LoanParams) -> CalcResult<LoanSummary> {
    schedule(params).map(|rows| LoanSummary::from_rows(&rows))
}
