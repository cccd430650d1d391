use std::fmt::{self, Display};

/// Errors produced by model parsers and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    UnknownPlan(String),
    UnknownResolution(String),
    UnknownInviteStatus(String),
    InvalidAllowance(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownPlan(raw) => write!(f, "unknown plan: {raw}"),
            ModelError::UnknownResolution(raw) => {
                write!(f, "unknown resolution tier: {raw}")
            }
            ModelError::UnknownInviteStatus(raw) => {
                write!(f, "unknown invite status: {raw}")
            }
            ModelError::InvalidAllowance(raw) => write!(
                f,
                "invalid daily allowance '{raw}': expected a count or \
                 \"unbounded\""
            ),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
