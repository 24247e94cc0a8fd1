use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::comparator::percent_advantage;
use crate::core::solver::{DEFAULT_SEARCH_YEARS, default_search_cap};
use crate::core::{
    AmortizationRow, CalcError, CalcResult, Compounding, GapQuery, GrowthParams, GrowthPoint,
    LoanParams, LoanSummary, PensionFundPolicy, RateReset, Scenario, ScenarioOutcome,
    ScenarioResult, SeveranceInput, SolveFor, Strategy, Surtax, TargetHorizon, TaxBracket,
    TaxResult, TaxRule, TaxTable, TfrPolicy, compare, growth, pension_gap_capital, schedule,
    schedule_with_resets, severance_scenarios, solve, years_to_target,
};

const DEFAULT_RATE_PERCENT: f64 = 5.0;
const DEFAULT_YEARS: i64 = 20;
const DEFAULT_SWR_PERCENT: f64 = 4.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliCompounding {
    Monthly,
    Annual,
}

impl From<CliCompounding> for Compounding {
    fn from(value: CliCompounding) -> Self {
        match value {
            CliCompounding::Monthly => Compounding::Monthly,
            CliCompounding::Annual => Compounding::Annual,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliSolveFor {
    Contribution,
    Principal,
}

impl From<CliSolveFor> for SolveFor {
    fn from(value: CliSolveFor) -> Self {
        match value {
            CliSolveFor::Contribution => SolveFor::Contribution,
            CliSolveFor::Principal => SolveFor::Principal,
        }
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Calc(#[from] CalcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "wealthcalc",
    about = "Growth, loan, tax and savings-goal calculators"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON calculator API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Project compound growth with periodic contributions
    Project(ProjectArgs),
    /// Amortization schedule of a fixed-rate loan
    Schedule(ScheduleArgs),
    /// Progressive income tax with optional surtaxes
    Tax(TaxArgs),
    /// Contribution or principal needed to reach a target
    Gap(GapArgs),
    /// Time needed to reach a target with a fixed contribution
    YearsToTarget(YearsArgs),
    /// Compare scenarios described in a JSON file
    Compare {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[arg(long, default_value_t = 0.0)]
    principal: f64,
    #[arg(long, default_value_t = 0.0, help = "Contribution paid at the end of every period")]
    contribution: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_RATE_PERCENT,
        allow_negative_numbers = true,
        help = "Annual rate in percent, e.g. 5"
    )]
    annual_rate: f64,
    #[arg(long, default_value_t = DEFAULT_YEARS, allow_negative_numbers = true)]
    years: i64,
    #[arg(long, allow_negative_numbers = true, help = "Number of periods; overrides --years")]
    periods: Option<i64>,
    #[arg(long, value_enum, default_value_t = CliCompounding::Monthly)]
    compounding: CliCompounding,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "Yearly contribution step-up in percent"
    )]
    contribution_growth: f64,
}

impl From<ProjectArgs> for GrowthPayload {
    fn from(args: ProjectArgs) -> Self {
        GrowthPayload {
            principal: Some(args.principal),
            contribution: Some(args.contribution),
            annual_rate: Some(args.annual_rate),
            years: Some(args.years),
            periods: args.periods,
            compounding: Some(args.compounding.into()),
            contribution_growth: Some(args.contribution_growth),
        }
    }
}

#[derive(Args, Debug)]
pub struct ScheduleArgs {
    #[arg(long)]
    principal: f64,
    #[arg(long, default_value_t = DEFAULT_RATE_PERCENT, help = "Nominal annual rate in percent")]
    annual_rate: f64,
    #[arg(long, default_value_t = DEFAULT_YEARS, allow_negative_numbers = true)]
    years: i64,
    #[arg(long, allow_negative_numbers = true, help = "Monthly installments; overrides --years")]
    periods: Option<i64>,
}

impl From<ScheduleArgs> for LoanPayload {
    fn from(args: ScheduleArgs) -> Self {
        LoanPayload {
            principal: Some(args.principal),
            annual_rate: Some(args.annual_rate),
            years: Some(args.years),
            periods: args.periods,
            resets: None,
        }
    }
}

#[derive(Args, Debug)]
pub struct TaxArgs {
    #[arg(long)]
    base: f64,
    #[arg(
        long,
        help = "Brackets as lower:upper:rate, comma separated, empty upper for unbounded; defaults to IRPEF"
    )]
    brackets: Option<String>,
    #[arg(long = "surtax", help = "Flat surtax as name:rate, repeatable")]
    surtaxes: Vec<String>,
}

impl TryFrom<TaxArgs> for TaxPayload {
    type Error = CliError;

    fn try_from(args: TaxArgs) -> Result<Self, Self::Error> {
        let brackets = args.brackets.as_deref().map(parse_brackets).transpose()?;
        let surtaxes = args
            .surtaxes
            .iter()
            .map(|s| parse_surtax(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TaxPayload {
            base: Some(args.base),
            brackets,
            surtaxes,
        })
    }
}

#[derive(Args, Debug)]
pub struct GapArgs {
    #[arg(long)]
    target: f64,
    #[arg(long, default_value_t = 0.0)]
    principal: f64,
    #[arg(long, default_value_t = 0.0, help = "Known contribution when solving for principal")]
    contribution: f64,
    #[arg(long, default_value_t = DEFAULT_RATE_PERCENT, allow_negative_numbers = true)]
    annual_rate: f64,
    #[arg(long, default_value_t = DEFAULT_YEARS, allow_negative_numbers = true)]
    years: i64,
    #[arg(long, allow_negative_numbers = true)]
    periods: Option<i64>,
    #[arg(long, value_enum, default_value_t = CliCompounding::Monthly)]
    compounding: CliCompounding,
    #[arg(long, value_enum, default_value_t = CliSolveFor::Contribution)]
    solve_for: CliSolveFor,
}

impl From<GapArgs> for GapPayload {
    fn from(args: GapArgs) -> Self {
        GapPayload {
            target: Some(args.target),
            principal: Some(args.principal),
            contribution: Some(args.contribution),
            annual_rate: Some(args.annual_rate),
            years: Some(args.years),
            periods: args.periods,
            compounding: Some(args.compounding.into()),
            solve_for: Some(args.solve_for.into()),
        }
    }
}

#[derive(Args, Debug)]
pub struct YearsArgs {
    #[arg(long)]
    target: f64,
    #[arg(long, default_value_t = 0.0)]
    principal: f64,
    #[arg(long, default_value_t = 0.0)]
    contribution: f64,
    #[arg(long, default_value_t = DEFAULT_RATE_PERCENT, allow_negative_numbers = true)]
    annual_rate: f64,
    #[arg(long, value_enum, default_value_t = CliCompounding::Monthly)]
    compounding: CliCompounding,
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    contribution_growth: f64,
    #[arg(long, default_value_t = DEFAULT_SEARCH_YEARS, help = "Give up after this many years")]
    max_years: u32,
}

impl From<YearsArgs> for HorizonPayload {
    fn from(args: YearsArgs) -> Self {
        HorizonPayload {
            target: Some(args.target),
            principal: Some(args.principal),
            contribution: Some(args.contribution),
            annual_rate: Some(args.annual_rate),
            compounding: Some(args.compounding.into()),
            contribution_growth: Some(args.contribution_growth),
            max_years: Some(args.max_years),
        }
    }
}

fn parse_number(raw: &str, what: &str) -> Result<f64, CliError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CliError::Usage(format!("invalid {what} '{raw}'")))
}

fn parse_brackets(text: &str) -> Result<Vec<TaxBracket>, CliError> {
    text.split(',')
        .map(|part| {
            let fields: Vec<&str> = part.split(':').collect();
            let [lower, upper, rate] = fields.as_slice() else {
                return Err(CliError::Usage(format!(
                    "bracket '{part}' must be lower:upper:rate"
                )));
            };
            let upper_bound = if upper.trim().is_empty() {
                None
            } else {
                Some(parse_number(upper, "bracket upper bound")?)
            };
            Ok(TaxBracket::new(
                parse_number(lower, "bracket lower bound")?,
                upper_bound,
                parse_number(rate, "bracket rate")?,
            ))
        })
        .collect()
}

fn parse_surtax(text: &str) -> Result<Surtax, CliError> {
    let Some((name, rate)) = text.split_once(':') else {
        return Err(CliError::Usage(format!("surtax '{text}' must be name:rate")));
    };
    Ok(Surtax {
        name: name.trim().to_string(),
        rate_percent: parse_number(rate, "surtax rate")?,
    })
}

fn resolve_periods(
    years: Option<i64>,
    periods: Option<i64>,
    compounding: Compounding,
) -> CalcResult<u32> {
    let total = match periods {
        Some(p) => p,
        None => years
            .unwrap_or(DEFAULT_YEARS)
            .checked_mul(compounding.periods_per_year() as i64)
            .ok_or_else(|| CalcError::invalid("horizon is too long"))?,
    };
    if total < 0 {
        return Err(CalcError::invalid("horizon must be >= 0"));
    }
    u32::try_from(total).map_err(|_| CalcError::invalid("horizon is too long"))
}

fn required(value: Option<f64>, name: &str) -> CalcResult<f64> {
    value.ok_or_else(|| CalcError::invalid(format!("{name} is required")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrowthPayload {
    principal: Option<f64>,
    contribution: Option<f64>,
    annual_rate: Option<f64>,
    years: Option<i64>,
    periods: Option<i64>,
    compounding: Option<Compounding>,
    contribution_growth: Option<f64>,
}

impl GrowthPayload {
    fn into_params(self) -> CalcResult<GrowthParams> {
        let compounding = self.compounding.unwrap_or_default();
        Ok(GrowthParams {
            principal: self.principal.unwrap_or(0.0),
            periodic_contribution: self.contribution.unwrap_or(0.0),
            annual_rate_percent: self.annual_rate.unwrap_or(DEFAULT_RATE_PERCENT),
            periods: resolve_periods(self.years, self.periods, compounding)?,
            compounding,
            contribution_growth_percent: self.contribution_growth.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoanPayload {
    principal: Option<f64>,
    annual_rate: Option<f64>,
    years: Option<i64>,
    periods: Option<i64>,
    resets: Option<Vec<RateReset>>,
}

impl LoanPayload {
    fn params(&self) -> CalcResult<LoanParams> {
        Ok(LoanParams {
            principal: required(self.principal, "principal")?,
            annual_rate_percent: self.annual_rate.unwrap_or(DEFAULT_RATE_PERCENT),
            periods: resolve_periods(self.years, self.periods, Compounding::Monthly)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxPayload {
    base: Option<f64>,
    brackets: Option<Vec<TaxBracket>>,
    surtaxes: Vec<Surtax>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GapPayload {
    target: Option<f64>,
    principal: Option<f64>,
    contribution: Option<f64>,
    annual_rate: Option<f64>,
    years: Option<i64>,
    periods: Option<i64>,
    compounding: Option<Compounding>,
    solve_for: Option<SolveFor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HorizonPayload {
    target: Option<f64>,
    principal: Option<f64>,
    contribution: Option<f64>,
    annual_rate: Option<f64>,
    compounding: Option<Compounding>,
    contribution_growth: Option<f64>,
    max_years: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirePayload {
    annual_spending: Option<f64>,
    withdrawal_rate: Option<f64>,
    expected_pension: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum TaxRulePayload {
    #[default]
    None,
    #[serde(rename_all = "camelCase")]
    Flat { rate_percent: f64 },
    #[serde(rename_all = "camelCase")]
    Progressive {
        brackets: Vec<TaxBracket>,
        #[serde(default)]
        surtaxes: Vec<Surtax>,
    },
}

impl TaxRulePayload {
    fn into_rule(self) -> CalcResult<TaxRule> {
        Ok(match self {
            TaxRulePayload::None => TaxRule::None,
            TaxRulePayload::Flat { rate_percent } => TaxRule::Flat { rate_percent },
            TaxRulePayload::Progressive { brackets, surtaxes } => {
                TaxRule::Progressive(TaxTable::new(brackets)?.with_surtaxes(surtaxes)?)
            }
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioPayload {
    name: String,
    #[serde(default)]
    growth: Option<GrowthPayload>,
    #[serde(default)]
    loan: Option<LoanPayload>,
    #[serde(default)]
    tax: TaxRulePayload,
}

impl ScenarioPayload {
    fn into_scenario(self) -> CalcResult<Scenario> {
        let strategy = match (self.growth, self.loan) {
            (Some(growth), None) => Strategy::Growth(growth.into_params()?),
            (None, Some(loan)) => {
                if loan.resets.is_some() {
                    return Err(CalcError::invalid(format!(
                        "scenario '{}': rate resets are not supported in comparisons",
                        self.name
                    )));
                }
                Strategy::Loan(loan.params()?)
            }
            _ => {
                return Err(CalcError::invalid(format!(
                    "scenario '{}' needs exactly one of growth or loan",
                    self.name
                )));
            }
        };
        Ok(Scenario {
            name: self.name,
            strategy,
            tax: self.tax.into_rule()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComparePayload {
    scenarios: Vec<ScenarioPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeverancePayload {
    annual_accrual: Option<f64>,
    years: Option<u32>,
    inflation: Option<f64>,
    fund_return: Option<f64>,
    prior_membership_years: Option<u32>,
    tfr_policy: Option<TfrPolicy>,
    fund_policy: Option<PensionFundPolicy>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    final_balance: f64,
    total_contributions: f64,
    total_growth: f64,
    points: Vec<GrowthPoint>,
    yearly: Vec<GrowthPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    summary: LoanSummary,
    rows: Vec<AmortizationRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GapResponse {
    solve_for: SolveFor,
    amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireResponse {
    target_capital: f64,
    uncovered_income: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rounded_point(p: &GrowthPoint) -> GrowthPoint {
    GrowthPoint {
        period_index: p.period_index,
        balance: round_cents(p.balance),
        cumulative_contributions: round_cents(p.cumulative_contributions),
        cumulative_growth: round_cents(p.cumulative_growth),
    }
}

/// Rounds a schedule to cents on the remaining balance and derives the portions from it,
/// so the rounded principal portions still add up to the principal.
fn rounded_rows(principal: f64, rows: &[AmortizationRow]) -> Vec<AmortizationRow> {
    let mut previous = round_cents(principal);
    rows.iter()
        .map(|r| {
            let remaining_balance = round_cents(r.remaining_balance);
            let principal_portion = round_cents(previous - remaining_balance);
            let payment = round_cents(r.payment);
            previous = remaining_balance;
            AmortizationRow {
                period_index: r.period_index,
                payment,
                interest_portion: round_cents(payment - principal_portion),
                principal_portion,
                remaining_balance,
            }
        })
        .collect()
}

fn rounded_tax(mut result: TaxResult) -> TaxResult {
    result.taxable_base = round_cents(result.taxable_base);
    for bracket in &mut result.tax_by_bracket {
        bracket.amount = round_cents(bracket.amount);
    }
    result.progressive_tax = round_cents(result.progressive_tax);
    for surtax in &mut result.surtaxes {
        surtax.amount = round_cents(surtax.amount);
    }
    result.total_tax = round_cents(result.total_tax);
    result
}

fn rounded_comparison(mut result: ScenarioResult) -> ScenarioResult {
    let round_outcome = |o: &mut ScenarioOutcome| {
        o.gross_value = round_cents(o.gross_value);
        o.contributed = round_cents(o.contributed);
        o.growth = round_cents(o.growth);
        o.tax = round_cents(o.tax);
        o.net_value = round_cents(o.net_value);
    };
    result.outcomes.iter_mut().for_each(round_outcome);
    let nets: HashMap<&str, f64> = result
        .outcomes
        .iter()
        .map(|o| (o.name.as_str(), o.net_value))
        .collect();
    // deltas and ratios follow the reported nets
    for delta in &mut result.deltas {
        let (Some(&net), Some(&against)) = (
            nets.get(delta.scenario.as_str()),
            nets.get(delta.against.as_str()),
        ) else {
            continue;
        };
        delta.delta = round_cents(net - against);
        delta.percent_advantage = percent_advantage(delta.delta, against);
    }
    result
}

fn project_response(payload: GrowthPayload) -> CalcResult<ProjectResponse> {
    let params = payload.into_params()?;
    let points = growth::project(&params)?;
    let last = points
        .last()
        .copied()
        .ok_or_else(|| CalcError::range("projection produced no points"))?;
    let yearly = growth::yearly_points(&points, params.compounding);
    Ok(ProjectResponse {
        final_balance: round_cents(last.balance),
        total_contributions: round_cents(last.cumulative_contributions),
        total_growth: round_cents(last.cumulative_growth),
        points: points.iter().map(rounded_point).collect(),
        yearly: yearly.iter().map(rounded_point).collect(),
    })
}

fn schedule_response(payload: LoanPayload) -> CalcResult<ScheduleResponse> {
    let params = payload.params()?;
    let rows = match payload.resets.as_deref() {
        Some(resets) if !resets.is_empty() => {
            schedule_with_resets(params.principal, params.periods, resets)?
        }
        _ => schedule(&params)?,
    };
    let rows = rounded_rows(params.principal, &rows);
    let summary = LoanSummary::from_rows(&rows);
    Ok(ScheduleResponse {
        summary: LoanSummary {
            payment: summary.payment,
            total_paid: round_cents(summary.total_paid),
            total_interest: round_cents(summary.total_interest),
        },
        rows,
    })
}

fn tax_response(payload: TaxPayload) -> CalcResult<TaxResult> {
    let base = required(payload.base, "base")?;
    let table = match payload.brackets {
        Some(brackets) => TaxTable::new(brackets)?,
        None => TaxTable::irpef_2024(),
    }
    .with_surtaxes(payload.surtaxes)?;
    table.compute(base).map(rounded_tax)
}

fn gap_response(payload: GapPayload) -> CalcResult<GapResponse> {
    let compounding = payload.compounding.unwrap_or_default();
    let solve_for = payload.solve_for.unwrap_or(SolveFor::Contribution);
    let query = GapQuery {
        target_future_value: required(payload.target, "target")?,
        known_principal: payload.principal.unwrap_or(0.0),
        known_contribution: payload.contribution.unwrap_or(0.0),
        annual_rate_percent: payload.annual_rate.unwrap_or(DEFAULT_RATE_PERCENT),
        periods: resolve_periods(payload.years, payload.periods, compounding)?,
        compounding,
        solve_for,
    };
    Ok(GapResponse {
        solve_for,
        amount: round_cents(solve(&query)?),
    })
}

fn horizon_response(payload: HorizonPayload) -> CalcResult<TargetHorizon> {
    let target = required(payload.target, "target")?;
    let params = GrowthParams {
        principal: payload.principal.unwrap_or(0.0),
        periodic_contribution: payload.contribution.unwrap_or(0.0),
        annual_rate_percent: payload.annual_rate.unwrap_or(DEFAULT_RATE_PERCENT),
        periods: 0,
        compounding: payload.compounding.unwrap_or_default(),
        contribution_growth_percent: payload.contribution_growth.unwrap_or(0.0),
    };
    let cap = match payload.max_years {
        Some(years) => years
            .checked_mul(params.compounding.periods_per_year())
            .ok_or_else(|| CalcError::invalid("search horizon is too long"))?,
        None => default_search_cap(&params),
    };
    years_to_target(&params, target, cap)
}

fn fire_response(payload: FirePayload) -> CalcResult<FireResponse> {
    let spending = required(payload.annual_spending, "annualSpending")?;
    let swr = payload.withdrawal_rate.unwrap_or(DEFAULT_SWR_PERCENT);
    let pension = payload.expected_pension.unwrap_or(0.0);
    Ok(FireResponse {
        target_capital: round_cents(pension_gap_capital(spending, pension, swr)?),
        uncovered_income: round_cents((spending - pension).max(0.0)),
    })
}

fn compare_response(payload: ComparePayload) -> CalcResult<ScenarioResult> {
    let scenarios = payload
        .scenarios
        .into_iter()
        .map(ScenarioPayload::into_scenario)
        .collect::<CalcResult<Vec<_>>>()?;
    compare(&scenarios).map(rounded_comparison)
}

fn severance_response(payload: SeverancePayload) -> CalcResult<ScenarioResult> {
    let input = SeveranceInput {
        annual_accrual: required(payload.annual_accrual, "annualAccrual")?,
        years: payload.years.unwrap_or(DEFAULT_YEARS as u32),
        inflation_percent: payload.inflation.unwrap_or(2.0),
        fund_return_percent: payload.fund_return.unwrap_or(DEFAULT_RATE_PERCENT),
        prior_membership_years: payload.prior_membership_years.unwrap_or(0),
    };
    let tfr = payload.tfr_policy.unwrap_or_default();
    let fund = payload.fund_policy.unwrap_or_default();
    let scenarios = severance_scenarios(&input, &tfr, &fund)?;
    compare(&scenarios).map(rounded_comparison)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    log::info!("calculator API bound to {addr}");
    println!("Calculator API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/project");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/api/project", get(project_get_handler).post(project_post_handler))
        .route(
            "/api/schedule",
            get(schedule_get_handler).post(schedule_post_handler),
        )
        .route("/api/tax", post(tax_handler))
        .route("/api/gap", get(gap_get_handler).post(gap_post_handler))
        .route(
            "/api/years-to-target",
            get(horizon_get_handler).post(horizon_post_handler),
        )
        .route("/api/fire", get(fire_get_handler).post(fire_post_handler))
        .route("/api/compare", post(compare_handler))
        .route("/api/severance", post(severance_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", "not-found")
}

async fn project_get_handler(Query(payload): Query<GrowthPayload>) -> Response {
    respond(project_response(payload))
}

async fn project_post_handler(Json(payload): Json<GrowthPayload>) -> Response {
    respond(project_response(payload))
}

async fn schedule_get_handler(Query(payload): Query<LoanPayload>) -> Response {
    respond(schedule_response(payload))
}

async fn schedule_post_handler(Json(payload): Json<LoanPayload>) -> Response {
    respond(schedule_response(payload))
}

async fn tax_handler(Json(payload): Json<TaxPayload>) -> Response {
    respond(tax_response(payload))
}

async fn gap_get_handler(Query(payload): Query<GapPayload>) -> Response {
    respond(gap_response(payload))
}

async fn gap_post_handler(Json(payload): Json<GapPayload>) -> Response {
    respond(gap_response(payload))
}

async fn horizon_get_handler(Query(payload): Query<HorizonPayload>) -> Response {
    respond(horizon_response(payload))
}

async fn horizon_post_handler(Json(payload): Json<HorizonPayload>) -> Response {
    respond(horizon_response(payload))
}

async fn fire_get_handler(Query(payload): Query<FirePayload>) -> Response {
    respond(fire_response(payload))
}

async fn fire_post_handler(Json(payload): Json<FirePayload>) -> Response {
    respond(fire_response(payload))
}

async fn compare_handler(Json(payload): Json<ComparePayload>) -> Response {
    respond(compare_response(payload))
}

async fn severance_handler(Json(payload): Json<SeverancePayload>) -> Response {
    respond(severance_response(payload))
}

fn status_for(err: &CalcError) -> StatusCode {
    match err {
        CalcError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        CalcError::NumericRange(_) | CalcError::Unreachable { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn respond<T: Serialize>(result: CalcResult<T>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            log::debug!("request rejected: {err}");
            error_response(status_for(&err), &err.to_string(), err.kind())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str, kind: &'static str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            kind,
        },
    )
}

fn to_json<T: Serialize>(body: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(body)?)
}

/// Runs a one-shot calculator subcommand and returns its JSON output.
pub fn run_command(command: Command) -> Result<String, CliError> {
    match command {
        Command::Serve { .. } => Err(CliError::Usage(
            "serve starts the HTTP server and has no one-shot output".to_string(),
        )),
        Command::Project(args) => to_json(&project_response(args.into())?),
        Command::Schedule(args) => to_json(&schedule_response(args.into())?),
        Command::Tax(args) => to_json(&tax_response(args.try_into()?)?),
        Command::Gap(args) => to_json(&gap_response(args.into())?),
        Command::YearsToTarget(args) => to_json(&horizon_response(args.into())?),
        Command::Compare { file } => {
            let raw = fs::read_to_string(&file)?;
            let payload = serde_json::from_str::<ComparePayload>(&raw)?;
            to_json(&compare_response(payload)?)
        }
    }
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Serve { port } => run_http_server(port).await?,
        command => println!("{}", run_command(command)?),
    }
    Ok(())
}
