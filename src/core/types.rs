use serde::{Deserialize, Serialize};

use super::tax::TaxTable;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compounding {
    #[default]
    Monthly,
    Annual,
}

impl Compounding {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Compounding::Monthly => 12,
            Compounding::Annual => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthParams {
    pub principal: f64,
    pub periodic_contribution: f64,
    /// May be negative for real (inflation-adjusted) projections.
    pub annual_rate_percent: f64,
    pub periods: u32,
    pub compounding: Compounding,
    /// Yearly step-up applied to the contribution, in percent. Zero keeps it flat.
    pub contribution_growth_percent: f64,
}

impl GrowthParams {
    pub fn new(
        principal: f64,
        periodic_contribution: f64,
        annual_rate_percent: f64,
        periods: u32,
        compounding: Compounding,
    ) -> Self {
        Self {
            principal,
            periodic_contribution,
            annual_rate_percent,
            periods,
            compounding,
            contribution_growth_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub period_index: u32,
    pub balance: f64,
    pub cumulative_contributions: f64,
    pub cumulative_growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanParams {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub periods: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationRow {
    /// 1-based installment number.
    pub period_index: u32,
    pub payment: f64,
    pub interest_portion: f64,
    pub principal_portion: f64,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
}

/// Rate applied from `from_period` (1-based) until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateReset {
    pub from_period: u32,
    pub annual_rate_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    pub lower_bound: f64,
    /// `None` means the bracket is unbounded above.
    pub upper_bound: Option<f64>,
    pub marginal_rate_percent: f64,
}

impl TaxBracket {
    pub fn new(lower_bound: f64, upper_bound: Option<f64>, marginal_rate_percent: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
            marginal_rate_percent,
        }
    }
}

/// Flat add-on charged on the taxable base (regional or municipal surcharge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surtax {
    pub name: String,
    pub rate_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketTax {
    pub bracket_index: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurtaxAmount {
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxResult {
    pub taxable_base: f64,
    pub tax_by_bracket: Vec<BracketTax>,
    pub progressive_tax: f64,
    pub surtaxes: Vec<SurtaxAmount>,
    pub total_tax: f64,
    pub effective_rate_percent: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveFor {
    Contribution,
    Principal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapQuery {
    pub target_future_value: f64,
    pub known_principal: f64,
    /// Only read when solving for the principal.
    pub known_contribution: f64,
    pub annual_rate_percent: f64,
    pub periods: u32,
    pub compounding: Compounding,
    pub solve_for: SolveFor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetHorizon {
    pub periods: f64,
    pub years: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaxRule {
    None,
    Flat { rate_percent: f64 },
    Progressive(TaxTable),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Growth(GrowthParams),
    Loan(LoanParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub strategy: Strategy,
    /// Applied once at the horizon to accumulated growth. Ignored by loans.
    pub tax: TaxRule,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Growth,
    Loan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub name: String,
    pub kind: StrategyKind,
    /// Final balance for growth paths, minus the total cost for loans.
    pub gross_value: f64,
    /// Principal plus contributions, or the borrowed amount for loans.
    pub contributed: f64,
    /// Accumulated growth, or minus the total interest for loans.
    pub growth: f64,
    pub tax: f64,
    pub net_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairwiseDelta {
    pub scenario: String,
    pub against: String,
    pub delta: f64,
    /// `delta / |net of against|` in percent; absent when that net value is zero.
    pub percent_advantage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub outcomes: Vec<ScenarioOutcome>,
    pub deltas: Vec<PairwiseDelta>,
    pub best_index: usize,
    pub best_name: String,
}

impl ScenarioResult {
    pub fn best(&self) -> &ScenarioOutcome {
        &self.outcomes[self.best_index]
    }

    /// Deltas of the best scenario against every other one.
    pub fn advantages_of_best(&self) -> impl Iterator<Item = &PairwiseDelta> {
        self.deltas
            .iter()
            .filter(move |d| d.scenario == self.best_name)
    }

    pub fn delta(&self, scenario: &str, against: &str) -> Option<&PairwiseDelta> {
        self.deltas
            .iter()
            .find(|d| d.scenario == scenario && d.against == against)
    }
}
