//! Error types for the agent crate.

use std::fmt;
use std::time::Duration;

/// Errors from an agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The attempt's cancellation token was raised; not a failure.
    Aborted,
    /// The agent reported a failure.
    Failed { message: String },
    /// The call outlived its phase timeout budget.
    TimedOut { after: Duration },
}

impl AgentError {
    /// Returns true when the error is the cancellation signal rather than
    /// a real failure.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted => write!(f, "agent run aborted"),
            Self::Failed { message } => write!(f, "agent run failed: {message}"),
            Self::TimedOut { after } => {
                write!(f, "agent run timed out after {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for AgentError {}

/// Errors from model resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// No model is configured anywhere (request, environment, defaults).
    NoModelConfigured,
    /// A model was found but no provider to serve it.
    NoProviderConfigured { model: String },
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoModelConfigured => write!(f, "no model configured"),
            Self::NoProviderConfigured { model } => {
                write!(f, "no provider configured for model '{model}'")
            }
        }
    }
}

impl std::error::Error for SelectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_is_not_a_failure() {
        assert!(AgentError::Aborted.is_aborted());
        assert!(
            !AgentError::Failed {
                message: "boom".to_string()
            }
            .is_aborted()
        );
    }
}
