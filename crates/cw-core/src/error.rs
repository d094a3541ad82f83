use thiserror::Error;

use crate::chain::Protocol;

/// Errors surfaced while resolving or reconciling a chain resource.
///
/// None of these are retried by the core; a retry policy, if any, belongs to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The table is not part of the backend's valid table set
    #[error("table '{table}' is not valid for protocol {protocol}")]
    InvalidTable { table: String, protocol: Protocol },

    /// The resource name cannot be resolved to a chain identity
    #[error("invalid chain resource '{name}': {reason}")]
    InvalidResource { name: String, reason: String },

    /// The requested policy cannot be applied to this chain
    #[error("invalid policy for chain {chain}: {reason}")]
    InvalidPolicy { chain: String, reason: String },

    /// Built-in chains are owned by the kernel and are never removed
    #[error("cannot remove built-in chain {chain}")]
    CannotRemoveBuiltin { chain: String },

    /// The backend tool failed or could not be executed
    #[error("backend command `{command}` failed: {output}")]
    BackendCommandFailed { command: String, output: String },
}

impl ChainError {
    pub fn invalid_resource(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResource {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_policy(chain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            chain: chain.into(),
            reason: reason.into(),
        }
    }

    /// Policy violations are permanent; only backend failures may succeed on a later pass.
    pub fn is_policy_violation(&self) -> bool {
        !matches!(self, Self::BackendCommandFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
