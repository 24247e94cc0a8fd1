use super::error::{CalcError, CalcResult, ensure_finite, require_non_negative};
use super::growth::{
    Accumulator, MAX_PERIODS, annuity_factor, growth_factor, per_period_rate, validate_rate,
};
use super::types::{GapQuery, GrowthParams, SolveFor, TargetHorizon};

/// Search horizon used when the caller gives none.
pub const DEFAULT_SEARCH_YEARS: u32 = 100;

fn validate_query(query: &GapQuery) -> CalcResult<f64> {
    require_non_negative(query.target_future_value, "target future value")?;
    require_non_negative(query.known_principal, "known principal")?;
    require_non_negative(query.known_contribution, "known contribution")?;
    if query.periods > MAX_PERIODS {
        return Err(CalcError::invalid(format!(
            "periods must be <= {MAX_PERIODS}"
        )));
    }
    let rate = per_period_rate(query.annual_rate_percent, query.compounding);
    validate_rate(rate)?;
    Ok(rate)
}

/// Solves the unknown of `query`, never returning a negative amount.
pub fn solve(query: &GapQuery) -> CalcResult<f64> {
    let rate = validate_query(query)?;
    let target = query.target_future_value;
    let unreachable = CalcError::Unreachable {
        target,
        horizon_periods: query.periods,
    };

    let solved = match query.solve_for {
        SolveFor::Contribution => {
            let projected_principal = query.known_principal * growth_factor(rate, query.periods)?;
            if projected_principal >= target {
                log::debug!("principal alone reaches {target:.2}; no contribution needed");
                return Ok(0.0);
            }
            if query.periods == 0 {
                return Err(unreachable);
            }
            // r != 0: (T - P(1+r)^n) * r / ((1+r)^n - 1); r == 0: (T - P) / n
            (target - projected_principal) / annuity_factor(rate, query.periods)?
        }
        SolveFor::Principal => {
            let accumulated = query.known_contribution * annuity_factor(rate, query.periods)?;
            if accumulated >= target {
                log::debug!("contributions alone reach {target:.2}; no principal needed");
                return Ok(0.0);
            }
            let factor = growth_factor(rate, query.periods)?;
            if factor <= 0.0 {
                return Err(unreachable);
            }
            (target - accumulated) / factor
        }
    };

    ensure_finite(solved.max(0.0), "solved amount")
}

/// Periods until the balance of `params` first meets `target`, searched forward on the
/// projection recurrence and linearly interpolated inside the crossing period.
/// `params.periods` is ignored; the search stops after `max_periods`.
pub fn years_to_target(
    params: &GrowthParams,
    target: f64,
    max_periods: u32,
) -> CalcResult<TargetHorizon> {
    require_non_negative(target, "target")?;
    if max_periods > MAX_PERIODS {
        return Err(CalcError::invalid(format!(
            "search cap must be <= {MAX_PERIODS} periods"
        )));
    }
    let per_year = params.compounding.periods_per_year() as f64;
    let search = GrowthParams {
        periods: 0,
        ..*params
    };
    let mut acc = Accumulator::new(&search)?;
    let mut prev = acc.current().balance;
    if prev >= target {
        return Ok(TargetHorizon {
            periods: 0.0,
            years: 0.0,
        });
    }

    for period in 1..=max_periods {
        let next = acc.advance()?.balance;
        if next >= target {
            let fraction = (target - prev) / (next - prev);
            let periods = (period - 1) as f64 + fraction;
            log::debug!("target {target:.2} reached after {periods:.2} periods");
            return Ok(TargetHorizon {
                periods,
                years: periods / per_year,
            });
        }
        prev = next;
    }

    Err(CalcError::Unreachable {
        target,
        horizon_periods: max_periods,
    })
}

pub fn default_search_cap(params: &GrowthParams) -> u32 {
    DEFAULT_SEARCH_YEARS * params.compounding.periods_per_year()
}

fn validate_withdrawal_rate(swr_percent: f64) -> CalcResult<f64> {
    if !swr_percent.is_finite() || swr_percent <= 0.0 || swr_percent > 100.0 {
        return Err(CalcError::invalid(
            "safe withdrawal rate must be in (0, 100] percent",
        ));
    }
    Ok(swr_percent / 100.0)
}

/// Capital whose safe withdrawal covers `annual_spending`.
pub fn fire_number(annual_spending: f64, swr_percent: f64) -> CalcResult<f64> {
    require_non_negative(annual_spending, "annual spending")?;
    let swr = validate_withdrawal_rate(swr_percent)?;
    ensure_finite(annual_spending / swr, "target capital")
}

/// Capital needed to fund the part of `desired_annual_income` the pension leaves uncovered.
pub fn pension_gap_capital(
    desired_annual_income: f64,
    expected_annual_pension: f64,
    swr_percent: f64,
) -> CalcResult<f64> {
    require_non_negative(desired_annual_income, "desired income")?;
    require_non_negative(expected_annual_pension, "expected pension")?;
    let gap = (desired_annual_income - expected_annual_pension).max(0.0);
    fire_number(gap, swr_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::growth::final_balance;
    use crate::core::types::Compounding;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn contribution_query(target: f64, principal: f64, rate: f64, periods: u32) -> GapQuery {
        GapQuery {
            target_future_value: target,
            known_principal: principal,
            known_contribution: 0.0,
            annual_rate_percent: rate,
            periods,
            compounding: Compounding::Monthly,
            solve_for: SolveFor::Contribution,
        }
    }

    #[test]
    fn monthly_saving_for_half_million_in_twenty_years() {
        let contribution =
            solve(&contribution_query(500_000.0, 0.0, 6.0, 240)).expect("solvable");
        assert_close(contribution, 1_080.0, 5.0);
    }

    #[test]
    fn zero_rate_contribution_is_linear() {
        let contribution =
            solve(&contribution_query(13_000.0, 1_000.0, 0.0, 120)).expect("solvable");
        assert_close(contribution, 100.0, 1e-9);
    }

    #[test]
    fn principal_already_enough_needs_no_contribution() {
        let contribution =
            solve(&contribution_query(10_000.0, 20_000.0, 2.0, 60)).expect("solvable");
        assert_eq!(contribution, 0.0);
    }

    #[test]
    fn zero_periods_with_shortfall_is_unreachable() {
        let err = solve(&contribution_query(10_000.0, 1_000.0, 5.0, 0)).expect_err("no time");
        assert_eq!(
            err,
            CalcError::Unreachable {
                target: 10_000.0,
                horizon_periods: 0
            }
        );
    }

    #[test]
    fn solves_principal_given_contribution() {
        let query = GapQuery {
            target_future_value: 100_000.0,
            known_principal: 0.0,
            known_contribution: 200.0,
            annual_rate_percent: 5.0,
            periods: 120,
            compounding: Compounding::Monthly,
            solve_for: SolveFor::Principal,
        };
        let principal = solve(&query).expect("solvable");
        let params = GrowthParams::new(principal, 200.0, 5.0, 120, Compounding::Monthly);
        assert_close(final_balance(&params).expect("finite"), 100_000.0, 1e-6);
    }

    #[test]
    fn contributions_already_enough_need_no_principal() {
        let query = GapQuery {
            target_future_value: 1_000.0,
            known_principal: 0.0,
            known_contribution: 100.0,
            annual_rate_percent: 3.0,
            periods: 12,
            compounding: Compounding::Monthly,
            solve_for: SolveFor::Principal,
        };
        assert_eq!(solve(&query).expect("solvable"), 0.0);
    }

    #[test]
    fn principal_cannot_survive_total_decay() {
        let query = GapQuery {
            target_future_value: 1_000.0,
            known_principal: 0.0,
            known_contribution: 0.0,
            annual_rate_percent: -100.0,
            periods: 2,
            compounding: Compounding::Annual,
            solve_for: SolveFor::Principal,
        };
        assert!(matches!(solve(&query), Err(CalcError::Unreachable { .. })));
    }

    #[test]
    fn years_to_target_interpolates_crossing_period() {
        let params = GrowthParams::new(0.0, 100.0, 0.0, 0, Compounding::Annual);
        let horizon = years_to_target(&params, 250.0, 10).expect("reachable");
        assert_close(horizon.periods, 2.5, 1e-12);
        assert_close(horizon.years, 2.5, 1e-12);
    }

    #[test]
    fn years_to_target_is_zero_when_already_there() {
        let params = GrowthParams::new(5_000.0, 0.0, 4.0, 0, Compounding::Monthly);
        let horizon = years_to_target(&params, 1_000.0, 12).expect("reachable");
        assert_eq!(horizon.periods, 0.0);
    }

    #[test]
    fn years_to_target_reports_unreachable_at_cap() {
        let params = GrowthParams::new(1_000.0, 0.0, 0.0, 0, Compounding::Monthly);
        let cap = default_search_cap(&params);
        let err = years_to_target(&params, 2_000.0, cap).expect_err("flat balance");
        assert_eq!(
            err,
            CalcError::Unreachable {
                target: 2_000.0,
                horizon_periods: 1_200
            }
        );
    }

    #[test]
    fn years_to_target_ignores_projection_horizon() {
        let params = GrowthParams::new(0.0, 100.0, 0.0, MAX_PERIODS + 1, Compounding::Annual);
        let horizon = years_to_target(&params, 250.0, 10).expect("reachable");
        assert_close(horizon.periods, 2.5, 1e-12);
    }

    #[test]
    fn years_to_target_agrees_with_projection() {
        let params = GrowthParams::new(10_000.0, 500.0, 7.0, 0, Compounding::Monthly);
        let horizon = years_to_target(&params, 300_000.0, 1_200).expect("reachable");
        let whole = horizon.periods.ceil() as u32;
        let before = GrowthParams { periods: whole - 1, ..params };
        let after = GrowthParams { periods: whole, ..params };
        assert!(final_balance(&before).expect("finite") < 300_000.0);
        assert!(final_balance(&after).expect("finite") >= 300_000.0);
    }

    #[test]
    fn fire_number_uses_withdrawal_rate() {
        assert_close(fire_number(40_000.0, 4.0).expect("valid"), 1_000_000.0, 1e-6);
        assert!(fire_number(40_000.0, 0.0).is_err());
        assert_close(
            pension_gap_capital(30_000.0, 18_000.0, 3.0).expect("valid"),
            400_000.0,
            1e-6,
        );
        assert_eq!(pension_gap_capital(10_000.0, 18_000.0, 3.0).expect("valid"), 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_solved_contribution_reaches_target(
            target in 1_000u32..2_000_000,
            principal in 0u32..200_000,
            rate_bp in -500i32..1_500,
            periods in 1u32..480
        ) {
            let query = contribution_query(
                target as f64,
                principal as f64,
                rate_bp as f64 / 100.0,
                periods,
            );
            let contribution = solve(&query).expect("solvable");
            prop_assert!(contribution >= 0.0);
            let params = GrowthParams::new(
                principal as f64,
                contribution,
                query.annual_rate_percent,
                periods,
                Compounding::Monthly,
            );
            let balance = final_balance(&params).expect("finite");
            if contribution > 0.0 {
                prop_assert!((balance - target as f64).abs() <= 1e-6 * target as f64);
            } else {
                prop_assert!(balance >= target as f64 * (1.0 - 1e-9));
            }
        }
    }
}
