use cw_core::executor::render_command;
use cw_core::{
    Action, BackendAdapter, BackendSet, ChainError, ChainId, ChainRecord, ChainResolver,
    DesiredChain, Ensure, Executor, Plan, Policy, Protocol, Result,
};

use crate::enumerator::Inventory;

/// Brings single chains to their desired state through the owning backend
pub struct Reconciler<'a, E: Executor> {
    executor: &'a E,
    backends: &'a BackendSet,
    resolver: ChainResolver,
    dry_run: bool,
}

impl<'a, E: Executor> Reconciler<'a, E> {
    pub fn new(executor: &'a E, backends: &'a BackendSet) -> Self {
        Self {
            executor,
            backends,
            resolver: ChainResolver::new(),
            dry_run: false,
        }
    }

    /// In dry-run mode actions are logged, not executed, and the inventory is left alone
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Computes the actions needed for `desired` without running anything
    pub fn plan(&self, desired: &DesiredChain, inventory: &Inventory) -> Result<Plan> {
        let id = self.resolver.resolve(&desired.name)?;
        if desired.ensure == Ensure::Absent && id.is_builtin() {
            return Err(ChainError::CannotRemoveBuiltin {
                chain: id.to_string(),
            });
        }
        self.adapter_for(&id)?;

        if let Some(policy) = desired.policy {
            validate_policy(&id, policy)?;
        }

        let mut plan = Plan::new();
        match desired.ensure {
            Ensure::Absent => {
                if inventory.contains(&id) {
                    plan.push(Action::DestroyChain { chain: id });
                }
            }
            Ensure::Present => match inventory.get(&id) {
                Some(current) => {
                    if let Some(policy) = desired.policy.filter(|p| *p != current.policy) {
                        plan.push(Action::SetPolicy {
                            chain: id,
                            from: Some(current.policy),
                            to: policy,
                        });
                    }
                }
                None => {
                    if id.is_builtin() {
                        tracing::warn!("Built-in chain {} not listed by its backend, not creating it", id);
                    } else {
                        plan.push(Action::CreateChain { chain: id.clone() });
                    }
                    if let Some(policy) = desired.policy.filter(Policy::is_set) {
                        plan.push(Action::SetPolicy {
                            chain: id,
                            from: None,
                            to: policy,
                        });
                    }
                }
            },
        }

        Ok(plan)
    }

    /// Reconciles one chain and returns the actions taken. An empty plan means
    /// the chain already matched.
    pub async fn ensure(&self, desired: &DesiredChain, inventory: &mut Inventory) -> Result<Plan> {
        let plan = self.plan(desired, inventory)?;
        if plan.is_empty() {
            tracing::debug!("{} already {}", desired.name, desired.ensure);
        }
        self.apply(&plan, inventory).await?;
        Ok(plan)
    }

    /// Reconciles chains in order, stopping at the first failure
    pub async fn ensure_all(&self, desired: &[DesiredChain], inventory: &mut Inventory) -> Result<Plan> {
        let mut applied = Plan::new();
        for chain in desired {
            applied.extend(self.ensure(chain, inventory).await?);
        }
        Ok(applied)
    }

    /// Runs each action through the owning backend's tool
    pub async fn apply(&self, plan: &Plan, inventory: &mut Inventory) -> Result<()> {
        for action in &plan.actions {
            let adapter = self.adapter_for(action.chain())?;
            let argv = action.argv(adapter);
            let command = render_command(&argv);

            if self.dry_run {
                tracing::info!("[DRY RUN] Would execute: {}", command);
                continue;
            }

            tracing::info!("{}", action);
            let output = self.executor.execute(&argv).await.map_err(|e| {
                ChainError::BackendCommandFailed {
                    command: command.clone(),
                    output: e.to_string(),
                }
            })?;

            if !output.is_success() {
                return Err(ChainError::BackendCommandFailed {
                    command,
                    output: output.diagnostic(),
                });
            }

            record(action, inventory);
        }

        Ok(())
    }

    fn adapter_for(&self, id: &ChainId) -> Result<&'a BackendAdapter> {
        self.backends.get(id.protocol()).ok_or_else(|| {
            ChainError::invalid_resource(
                id.to_string(),
                format!("no {} backend is available", id.protocol()),
            )
        })
    }
}

fn validate_policy(id: &ChainId, policy: Policy) -> Result<()> {
    let ethernet = id.protocol() == Protocol::Ethernet;

    if policy == Policy::Return && !ethernet {
        return Err(ChainError::invalid_policy(
            id.to_string(),
            "RETURN is only valid for ethernet chains",
        ));
    }
    if id.is_builtin() && !policy.is_set() {
        return Err(ChainError::invalid_policy(
            id.to_string(),
            "built-in chains always carry a policy",
        ));
    }
    if !id.is_builtin() && !ethernet && policy.is_set() {
        return Err(ChainError::invalid_policy(
            id.to_string(),
            "policies can only be set on built-in chains",
        ));
    }
    if ethernet && !policy.is_set() {
        return Err(ChainError::invalid_policy(
            id.to_string(),
            "ebtables chains always carry a policy",
        ));
    }

    Ok(())
}

// ebtables gives new chains an ACCEPT policy; xtables user chains have none.
fn new_chain_policy(protocol: Protocol) -> Policy {
    match protocol {
        Protocol::Ethernet => Policy::Accept,
        Protocol::IPv4 | Protocol::IPv6 => Policy::Unset,
    }
}

fn record(action: &Action, inventory: &mut Inventory) {
    match action {
        Action::CreateChain { chain } => {
            inventory.insert(ChainRecord::new(chain.clone(), new_chain_policy(chain.protocol())));
        }
        Action::DestroyChain { chain } => {
            inventory.remove(chain);
        }
        Action::SetPolicy { chain, to, .. } => {
            if !inventory.set_policy(chain, *to) {
                inventory.insert(ChainRecord::new(chain.clone(), *to));
            }
        }
    }
}
