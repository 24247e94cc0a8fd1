pub mod amortization;
pub mod comparator;
mod error;
pub mod growth;
pub mod policy;
pub mod solver;
pub mod tax;
mod types;

pub use amortization::{schedule, schedule_with_resets};
pub use comparator::{SeveranceInput, compare, severance_scenarios};
pub use error::{CalcError, CalcResult};
pub use growth::{final_balance, project};
pub use policy::{PensionFundPolicy, TfrPolicy};
pub use solver::{fire_number, pension_gap_capital, solve, years_to_target};
pub use tax::TaxTable;
pub use types::{
    AmortizationRow, BracketTax, Compounding, GapQuery, GrowthParams, GrowthPoint, LoanParams,
    LoanSummary, PairwiseDelta, RateReset, Scenario, ScenarioOutcome, ScenarioResult, SolveFor,
    Strategy, StrategyKind, Surtax, SurtaxAmount, TargetHorizon, TaxBracket, TaxResult, TaxRule,
};
