use serde::Serialize;

use super::error::{CalcError, CalcResult, require_non_negative};
use super::types::{BracketTax, Surtax, SurtaxAmount, TaxBracket, TaxResult};

/// Ordered, gap-free marginal brackets starting at zero, plus flat surtaxes on the base.
/// Only constructible through validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxTable {
    brackets: Vec<TaxBracket>,
    surtaxes: Vec<Surtax>,
}

fn validate_rate(rate_percent: f64, what: &str) -> CalcResult<()> {
    if !rate_percent.is_finite() || !(0.0..=100.0).contains(&rate_percent) {
        return Err(CalcError::invalid(format!(
            "{what} rate must be between 0 and 100 percent"
        )));
    }
    Ok(())
}

impl TaxTable {
    pub fn new(brackets: Vec<TaxBracket>) -> CalcResult<Self> {
        let Some(first) = brackets.first() else {
            return Err(CalcError::invalid("bracket table is empty"));
        };
        if first.lower_bound != 0.0 {
            return Err(CalcError::invalid("first bracket must start at 0"));
        }

        for (idx, bracket) in brackets.iter().enumerate() {
            validate_rate(bracket.marginal_rate_percent, "bracket")?;
            if !bracket.lower_bound.is_finite() {
                return Err(CalcError::invalid(format!(
                    "bracket {idx} lower bound must be finite"
                )));
            }
            if let Some(upper) = bracket.upper_bound {
                if !upper.is_finite() || upper <= bracket.lower_bound {
                    return Err(CalcError::invalid(format!(
                        "bracket {idx} upper bound must be above its lower bound"
                    )));
                }
            }
            if idx == 0 {
                continue;
            }
            let Some(prev_upper) = brackets[idx - 1].upper_bound else {
                return Err(CalcError::invalid(format!(
                    "bracket {idx} overlaps the unbounded bracket before it"
                )));
            };
            if bracket.lower_bound < prev_upper {
                return Err(CalcError::invalid(format!(
                    "bracket {idx} overlaps bracket {}",
                    idx - 1
                )));
            }
            if bracket.lower_bound > prev_upper {
                return Err(CalcError::invalid(format!(
                    "gap between bracket {} and bracket {idx}",
                    idx - 1
                )));
            }
        }

        Ok(Self {
            brackets,
            surtaxes: Vec::new(),
        })
    }

    pub fn with_surtaxes(mut self, surtaxes: Vec<Surtax>) -> CalcResult<Self> {
        for surtax in &surtaxes {
            validate_rate(surtax.rate_percent, &format!("surtax '{}'", surtax.name))?;
        }
        self.surtaxes = surtaxes;
        Ok(self)
    }

    /// Italian IRPEF national brackets in force from 2024.
    pub fn irpef_2024() -> Self {
        Self {
            brackets: vec![
                TaxBracket::new(0.0, Some(28_000.0), 23.0),
                TaxBracket::new(28_000.0, Some(50_000.0), 35.0),
                TaxBracket::new(50_000.0, None, 43.0),
            ],
            surtaxes: Vec::new(),
        }
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    pub fn surtaxes(&self) -> &[Surtax] {
        &self.surtaxes
    }

    /// Highest base the table covers, `None` when the top bracket is unbounded.
    pub fn coverage_limit(&self) -> Option<f64> {
        self.brackets.last().and_then(|b| b.upper_bound)
    }

    fn check_base(&self, base: f64) -> CalcResult<()> {
        require_non_negative(base, "taxable base")?;
        if let Some(limit) = self.coverage_limit() {
            if base > limit {
                return Err(CalcError::invalid(format!(
                    "taxable base {base} exceeds the bracket table limit {limit}"
                )));
            }
        }
        Ok(())
    }

    pub fn compute(&self, base: f64) -> CalcResult<TaxResult> {
        self.check_base(base)?;

        let mut tax_by_bracket = Vec::with_capacity(self.brackets.len());
        for (bracket_index, bracket) in self.brackets.iter().enumerate() {
            if base <= bracket.lower_bound {
                break;
            }
            let top = bracket.upper_bound.map_or(base, |upper| base.min(upper));
            let slice = (top - bracket.lower_bound).max(0.0);
            tax_by_bracket.push(BracketTax {
                bracket_index,
                amount: slice * bracket.marginal_rate_percent / 100.0,
            });
        }
        let progressive_tax: f64 = tax_by_bracket.iter().map(|b| b.amount).sum();

        let surtaxes: Vec<SurtaxAmount> = self
            .surtaxes
            .iter()
            .map(|s| SurtaxAmount {
                name: s.name.clone(),
                amount: base * s.rate_percent / 100.0,
            })
            .collect();
        let total_tax = progressive_tax + surtaxes.iter().map(|s| s.amount).sum::<f64>();

        let effective_rate_percent = if base == 0.0 {
            0.0
        } else {
            total_tax / base * 100.0
        };

        Ok(TaxResult {
            taxable_base: base,
            tax_by_bracket,
            progressive_tax,
            surtaxes,
            total_tax,
            effective_rate_percent,
        })
    }

    /// Rate charged on the next unit of base, surtaxes included.
    pub fn marginal_rate_percent(&self, base: f64) -> CalcResult<f64> {
        self.check_base(base)?;
        let bracket_rate = self
            .brackets
            .iter()
            .rev()
            .find(|b| base >= b.lower_bound)
            .map_or(0.0, |b| b.marginal_rate_percent);
        Ok(bracket_rate + self.surtaxes.iter().map(|s| s.rate_percent).sum::<f64>())
    }
}

pub fn compute(base: f64, table: &TaxTable) -> CalcResult<TaxResult> {
    table.compute(base)
}
