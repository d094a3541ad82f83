use crate::backend::BackendAdapter;
use crate::chain::{ChainId, Policy};
use serde::Serialize;
use std::fmt;

/// A single backend mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
    CreateChain {
        chain: ChainId,
    },
    DestroyChain {
        chain: ChainId,
    },
    SetPolicy {
        chain: ChainId,
        from: Option<Policy>,
        to: Policy,
    },
}

impl Action {
    pub fn chain(&self) -> &ChainId {
        match self {
            Action::CreateChain { chain }
            | Action::DestroyChain { chain }
            | Action::SetPolicy { chain, .. } => chain,
        }
    }

    /// Command line for this action on the owning backend
    pub fn argv(&self, adapter: &BackendAdapter) -> Vec<String> {
        match self {
            Action::CreateChain { chain } => adapter.create_argv(chain),
            Action::DestroyChain { chain } => adapter.destroy_argv(chain),
            Action::SetPolicy { chain, to, .. } => adapter.policy_argv(chain, *to),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateChain { chain } => write!(f, "Create chain {}", chain),
            Action::DestroyChain { chain } => write!(f, "Delete chain {}", chain),
            Action::SetPolicy { chain, from, to } => {
                write!(f, "Set policy of {} to {}", chain, to)?;
                if let Some(from) = from {
                    write!(f, " (was {})", from)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn extend(&mut self, other: Plan) {
        self.actions.extend(other.actions);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Protocol;
    use crate::resolver::ChainResolver;

    #[test]
    fn actions_render_for_humans_and_backends() {
        let resolver = ChainResolver::new();
        let input = resolver.resolve(":INPUT:").unwrap();
        let custom = resolver.resolve("broute:custom:ethernet").unwrap();
        let ebtables = BackendAdapter::standard(Protocol::Ethernet);

        let set_policy = Action::SetPolicy {
            chain: input,
            from: Some(Policy::Accept),
            to: Policy::Drop,
        };
        assert_eq!(
            set_policy.to_string(),
            "Set policy of filter:INPUT:IPv4 to DROP (was ACCEPT)"
        );

        let create = Action::CreateChain { chain: custom };
        assert_eq!(create.to_string(), "Create chain broute:custom:ethernet");
        assert_eq!(
            create.argv(&ebtables),
            vec!["ebtables", "-t", "broute", "-N", "custom"]
        );
    }
}
