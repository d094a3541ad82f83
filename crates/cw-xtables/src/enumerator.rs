use cw_core::executor::render_command;
use cw_core::{BackendAdapter, BackendSet, ChainId, ChainRecord, ChainResolver, Executor, Policy, Protocol};
use std::collections::HashMap;

use crate::save;

/// Current chain state across backends, one record per identity.
///
/// Rebuilt on every enumeration. The caller keeps it for the length of one
/// reconciliation batch and the reconciler updates it after each change.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    records: Vec<ChainRecord>,
    index: HashMap<ChainId, usize>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record unless its identity is already known. Returns whether it was added.
    pub fn insert(&mut self, record: ChainRecord) -> bool {
        if self.index.contains_key(&record.id) {
            return false;
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn remove(&mut self, id: &ChainId) -> Option<ChainRecord> {
        let position = self.index.remove(id)?;
        let record = self.records.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(record)
    }

    pub fn get(&self, id: &ChainId) -> Option<&ChainRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &ChainId) -> bool {
        self.index.contains_key(id)
    }

    pub fn set_policy(&mut self, id: &ChainId, policy: Policy) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.records[i].policy = policy;
                true
            }
            None => false,
        }
    }

    pub fn records(&self) -> &[ChainRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainRecord> {
        self.records.iter()
    }

    pub fn for_protocol(&self, protocol: Protocol) -> impl Iterator<Item = &ChainRecord> {
        self.records.iter().filter(move |r| r.id.protocol() == protocol)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Extend<ChainRecord> for Inventory {
    fn extend<T: IntoIterator<Item = ChainRecord>>(&mut self, iter: T) {
        for record in iter {
            self.insert(record);
        }
    }
}

/// Builds the inventory from each backend's save output
pub struct ChainEnumerator<'a, E: Executor> {
    executor: &'a E,
    backends: &'a BackendSet,
    resolver: ChainResolver,
}

impl<'a, E: Executor> ChainEnumerator<'a, E> {
    pub fn new(executor: &'a E, backends: &'a BackendSet) -> Self {
        Self {
            executor,
            backends,
            resolver: ChainResolver::new(),
        }
    }

    /// Lists chains of every backend in the set. A backend whose save
    /// command fails or prints nothing contributes no records.
    pub async fn enumerate(&self) -> Inventory {
        let mut inventory = Inventory::new();

        for adapter in self.backends.iter() {
            let records = self.enumerate_backend(adapter).await;
            tracing::debug!("{} backend: {} chains", adapter.protocol(), records.len());
            inventory.extend(records);
        }

        inventory
    }

    /// Records for one backend; empty when the backend is absent or failing
    pub async fn enumerate_backend(&self, adapter: &BackendAdapter) -> Vec<ChainRecord> {
        let argv = adapter.list_argv();

        let output = match self.executor.execute(&argv).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Skipping {} chains: {}", adapter.protocol(), e);
                return Vec::new();
            }
        };

        if !output.is_success() {
            tracing::warn!(
                "Skipping {} chains: `{}` failed with {}",
                adapter.protocol(),
                render_command(&argv),
                output.diagnostic()
            );
            return Vec::new();
        }

        if output.stdout.trim().is_empty() {
            return Vec::new();
        }

        save::parse(&output.stdout)
            .chains
            .into_iter()
            .filter_map(|saved| {
                match self
                    .resolver
                    .resolve_parts(&saved.table, &saved.name, Some(adapter.protocol()))
                {
                    Ok(id) => Some(ChainRecord::new(id, saved.policy)),
                    Err(e) => {
                        tracing::warn!("Ignoring discovered chain: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}
