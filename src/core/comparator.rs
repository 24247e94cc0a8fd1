use std::collections::HashSet;

use super::amortization;
use super::error::{CalcError, CalcResult, ensure_finite};
use super::growth;
use super::policy::{PensionFundPolicy, TfrPolicy};
use super::types::{
    Compounding, GrowthParams, PairwiseDelta, Scenario, ScenarioOutcome, ScenarioResult,
    Strategy, StrategyKind, TaxRule,
};

/// Tax owed at the horizon on accumulated `growth`. Losses are untaxed.
pub fn tax_on_growth(growth: f64, rule: &TaxRule) -> CalcResult<f64> {
    let taxable = growth.max(0.0);
    match rule {
        TaxRule::None => Ok(0.0),
        TaxRule::Flat { rate_percent } => {
            if !rate_percent.is_finite() || !(0.0..=100.0).contains(rate_percent) {
                return Err(CalcError::invalid(
                    "flat tax rate must be between 0 and 100 percent",
                ));
            }
            Ok(taxable * rate_percent / 100.0)
        }
        TaxRule::Progressive(table) => table.compute(taxable).map(|r| r.total_tax),
    }
}

fn evaluate(scenario: &Scenario) -> CalcResult<ScenarioOutcome> {
    let outcome = match &scenario.strategy {
        Strategy::Growth(params) => {
            let last = growth::final_point(params)?;
            let tax = tax_on_growth(last.cumulative_growth, &scenario.tax)?;
            ScenarioOutcome {
                name: scenario.name.clone(),
                kind: StrategyKind::Growth,
                gross_value: last.balance,
                contributed: params.principal + last.cumulative_contributions,
                growth: last.cumulative_growth,
                tax,
                net_value: last.balance - tax,
            }
        }
        Strategy::Loan(params) => {
            if scenario.tax != TaxRule::None {
                return Err(CalcError::invalid(format!(
                    "scenario '{}': tax rules apply only to growth strategies",
                    scenario.name
                )));
            }
            let summary = amortization::summary(params)?;
            ScenarioOutcome {
                name: scenario.name.clone(),
                kind: StrategyKind::Loan,
                gross_value: -summary.total_paid,
                contributed: params.principal,
                growth: -summary.total_interest,
                tax: 0.0,
                net_value: -summary.total_paid,
            }
        }
    };
    ensure_finite(outcome.net_value, "scenario net value")?;
    Ok(outcome)
}

/// `delta / |against|` in percent, `None` when `against` is zero.
pub fn percent_advantage(delta: f64, against: f64) -> Option<f64> {
    if against == 0.0 {
        None
    } else {
        Some(delta / against.abs() * 100.0)
    }
}

pub fn compare(scenarios: &[Scenario]) -> CalcResult<ScenarioResult> {
    if scenarios.len() < 2 {
        return Err(CalcError::invalid("at least two scenarios are required"));
    }
    let mut seen = HashSet::with_capacity(scenarios.len());
    for scenario in scenarios {
        if !seen.insert(scenario.name.as_str()) {
            return Err(CalcError::invalid(format!(
                "duplicate scenario name '{}'",
                scenario.name
            )));
        }
    }

    let outcomes = scenarios
        .iter()
        .map(evaluate)
        .collect::<CalcResult<Vec<_>>>()?;

    let mut deltas = Vec::with_capacity(outcomes.len() * (outcomes.len() - 1));
    for a in &outcomes {
        for b in &outcomes {
            if a.name == b.name {
                continue;
            }
            let delta = a.net_value - b.net_value;
            deltas.push(PairwiseDelta {
                scenario: a.name.clone(),
                against: b.name.clone(),
                delta,
                percent_advantage: percent_advantage(delta, b.net_value),
            });
        }
    }

    // first scenario wins ties
    let mut best_index = 0;
    for (idx, outcome) in outcomes.iter().enumerate().skip(1) {
        if outcome.net_value > outcomes[best_index].net_value {
            best_index = idx;
        }
    }
    let best_name = outcomes[best_index].name.clone();
    log::debug!(
        "compared {} scenarios; best is '{best_name}' at {:.2}",
        outcomes.len(),
        outcomes[best_index].net_value
    );

    Ok(ScenarioResult {
        outcomes,
        deltas,
        best_index,
        best_name,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeveranceInput {
    pub annual_accrual: f64,
    pub years: u32,
    pub inflation_percent: f64,
    pub fund_return_percent: f64,
    /// Membership years already in the fund before this horizon.
    pub prior_membership_years: u32,
}

pub const SEVERANCE_IN_COMPANY: &str = "azienda";
pub const SEVERANCE_IN_FUND: &str = "fondo";

/// TFR kept by the employer vs. paid into a pension fund, as comparable scenarios.
/// Yearly withholdings are folded into the net rate; the final tax hits growth only.
pub fn severance_scenarios(
    input: &SeveranceInput,
    tfr: &TfrPolicy,
    fund: &PensionFundPolicy,
) -> CalcResult<Vec<Scenario>> {
    tfr.validate()?;
    fund.validate()?;
    if !input.inflation_percent.is_finite() || !input.fund_return_percent.is_finite() {
        return Err(CalcError::invalid("inflation and fund return must be finite"));
    }

    let in_company = GrowthParams::new(
        0.0,
        input.annual_accrual,
        tfr.net_revaluation_percent(input.inflation_percent),
        input.years,
        Compounding::Annual,
    );
    let in_fund = GrowthParams::new(
        0.0,
        input.annual_accrual,
        fund.net_return_percent(input.fund_return_percent),
        input.years,
        Compounding::Annual,
    );
    let membership = input.prior_membership_years.saturating_add(input.years);

    Ok(vec![
        Scenario {
            name: SEVERANCE_IN_COMPANY.to_string(),
            strategy: Strategy::Growth(in_company),
            tax: TaxRule::Flat {
                rate_percent: tfr.separate_taxation_percent,
            },
        },
        Scenario {
            name: SEVERANCE_IN_FUND.to_string(),
            strategy: Strategy::Growth(in_fund),
            tax: TaxRule::Flat {
                rate_percent: fund.final_tax_percent(membership),
            },
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tax::TaxTable;
    use crate::core::types::{LoanParams, TaxBracket};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn growth_scenario(name: &str, rate: f64, tax: TaxRule) -> Scenario {
        Scenario {
            name: name.to_string(),
            strategy: Strategy::Growth(GrowthParams::new(
                0.0,
                2_000.0,
                rate,
                20,
                Compounding::Annual,
            )),
            tax,
        }
    }

    #[test]
    fn percent_advantage_matches_independent_ratio() {
        let azienda = growth_scenario("azienda", 2.0, TaxRule::Flat { rate_percent: 23.0 });
        let fondo = growth_scenario("fondo", 3.0, TaxRule::Flat { rate_percent: 15.0 });
        let result = compare(&[azienda.clone(), fondo.clone()]).expect("valid scenarios");

        let net = |scenario: &Scenario, rate: f64| {
            let Strategy::Growth(params) = scenario.strategy else {
                panic!("growth scenario expected");
            };
            let points = growth::project(&params).expect("finite");
            let last = points.last().expect("points");
            last.balance - last.cumulative_growth.max(0.0) * rate / 100.0
        };
        let net_azienda = net(&azienda, 23.0);
        let net_fondo = net(&fondo, 15.0);
        let expected = (net_fondo - net_azienda) / net_azienda.abs() * 100.0;

        assert_eq!(result.best_name, "fondo");
        let delta = result.delta("fondo", "azienda").expect("pair present");
        assert_eq!(delta.delta, net_fondo - net_azienda);
        assert_eq!(delta.percent_advantage, Some(expected));
        assert_eq!(result.advantages_of_best().count(), 1);
    }

    #[test]
    fn tax_applies_to_growth_not_contributions() {
        let result = compare(&[
            growth_scenario("untaxed", 4.0, TaxRule::None),
            growth_scenario("taxed", 4.0, TaxRule::Flat { rate_percent: 26.0 }),
        ])
        .expect("valid scenarios");
        let untaxed = &result.outcomes[0];
        let taxed = &result.outcomes[1];
        assert_close(untaxed.contributed, 40_000.0, 1e-9);
        assert_close(taxed.tax, untaxed.growth * 0.26, 1e-6);
        assert_close(taxed.net_value, taxed.gross_value - taxed.tax, 1e-9);
        assert_eq!(result.best_index, 0);
    }

    #[test]
    fn progressive_rule_uses_bracket_table() {
        let table = TaxTable::new(vec![
            TaxBracket::new(0.0, Some(5_000.0), 10.0),
            TaxBracket::new(5_000.0, None, 30.0),
        ])
        .expect("valid table");
        let scenario = growth_scenario("bracketed", 5.0, TaxRule::Progressive(table.clone()));
        let result = compare(&[scenario, growth_scenario("plain", 5.0, TaxRule::None)])
            .expect("valid scenarios");
        let growth = result.outcomes[1].growth;
        let expected = table.compute(growth).expect("covered").total_tax;
        assert_close(result.outcomes[0].tax, expected, 1e-9);
    }

    #[test]
    fn losses_are_not_taxed() {
        assert_eq!(
            tax_on_growth(-500.0, &TaxRule::Flat { rate_percent: 26.0 }).expect("valid"),
            0.0
        );
    }

    #[test]
    fn cheaper_loan_wins_fixed_vs_variable() {
        let fixed = Scenario {
            name: "tasso-fisso".to_string(),
            strategy: Strategy::Loan(LoanParams {
                principal: 150_000.0,
                annual_rate_percent: 3.8,
                periods: 240,
            }),
            tax: TaxRule::None,
        };
        let variable = Scenario {
            name: "tasso-variabile".to_string(),
            strategy: Strategy::Loan(LoanParams {
                principal: 150_000.0,
                annual_rate_percent: 3.1,
                periods: 240,
            }),
            tax: TaxRule::None,
        };
        let result = compare(&[fixed, variable]).expect("valid scenarios");
        assert_eq!(result.best_name, "tasso-variabile");
        let adv = result
            .delta("tasso-variabile", "tasso-fisso")
            .expect("pair present");
        assert!(adv.delta > 0.0);
        assert!(adv.percent_advantage.expect("non-zero") > 0.0);
        assert_close(
            result.outcomes[0].net_value,
            result.outcomes[0].growth - 150_000.0,
            0.01,
        );
    }

    #[test]
    fn rejects_bad_scenario_sets() {
        let one = [growth_scenario("only", 3.0, TaxRule::None)];
        assert!(compare(&one).is_err());

        let dup = [
            growth_scenario("same", 3.0, TaxRule::None),
            growth_scenario("same", 4.0, TaxRule::None),
        ];
        assert!(compare(&dup).expect_err("duplicate").to_string().contains("duplicate"));

        let taxed_loan = Scenario {
            name: "loan".to_string(),
            strategy: Strategy::Loan(LoanParams {
                principal: 1_000.0,
                annual_rate_percent: 5.0,
                periods: 12,
            }),
            tax: TaxRule::Flat { rate_percent: 10.0 },
        };
        assert!(compare(&[taxed_loan, growth_scenario("g", 1.0, TaxRule::None)]).is_err());
    }

    #[test]
    fn zero_net_counterpart_has_no_percent() {
        let zero = Scenario {
            name: "nothing".to_string(),
            strategy: Strategy::Growth(GrowthParams::new(0.0, 0.0, 5.0, 10, Compounding::Annual)),
            tax: TaxRule::None,
        };
        let result = compare(&[growth_scenario("some", 1.0, TaxRule::None), zero])
            .expect("valid scenarios");
        assert_eq!(
            result.delta("some", "nothing").expect("pair").percent_advantage,
            None
        );
        assert!(
            result
                .delta("nothing", "some")
                .expect("pair")
                .percent_advantage
                .is_some()
        );
    }

    #[test]
    fn severance_pair_uses_policy_rates() {
        let input = SeveranceInput {
            annual_accrual: 2_500.0,
            years: 25,
            inflation_percent: 2.0,
            fund_return_percent: 4.0,
            prior_membership_years: 0,
        };
        let scenarios =
            severance_scenarios(&input, &TfrPolicy::default(), &PensionFundPolicy::default())
                .expect("valid input");
        assert_eq!(scenarios[0].name, SEVERANCE_IN_COMPANY);
        assert_eq!(scenarios[1].tax, TaxRule::Flat { rate_percent: 12.0 });
        let Strategy::Growth(fund) = scenarios[1].strategy else {
            panic!("growth scenario expected");
        };
        assert_close(fund.annual_rate_percent, 3.2, 1e-12);

        let result = compare(&scenarios).expect("valid scenarios");
        assert_eq!(result.best_name, SEVERANCE_IN_FUND);
    }
}
