use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("value out of representable range: {0}")]
    NumericRange(String),

    #[error("target {target:.2} is not reachable within {horizon_periods} periods")]
    Unreachable { target: f64, horizon_periods: u32 },
}

impl CalcError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CalcError::InvalidParameter(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        CalcError::NumericRange(msg.into())
    }

    /// Stable identifier for API consumers.
    pub fn kind(&self) -> &'static str {
        match self {
            CalcError::InvalidParameter(_) => "invalid-parameter",
            CalcError::NumericRange(_) => "numeric-range",
            CalcError::Unreachable { .. } => "unreachable",
        }
    }
}

pub type CalcResult<T> = Result<T, CalcError>;

pub(crate) fn ensure_finite(value: f64, what: &str) -> CalcResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::range(format!("{what} is not finite")))
    }
}

pub(crate) fn require_non_negative(value: f64, name: &str) -> CalcResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CalcError::invalid(format!("{name} must be a finite value >= 0")));
    }
    Ok(())
}
