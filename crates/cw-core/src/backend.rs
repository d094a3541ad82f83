use crate::chain::{ChainId, Policy, Protocol};
use crate::config::{BackendOverride, Config};
use crate::detector::Locator;

/// A table and the chains the kernel provides in it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub builtins: &'static [&'static str],
}

const IP_FILTER: TableSpec = TableSpec {
    name: "filter",
    builtins: &["INPUT", "FORWARD", "OUTPUT"],
};

const IP_MANGLE: TableSpec = TableSpec {
    name: "mangle",
    builtins: &["PREROUTING", "INPUT", "FORWARD", "OUTPUT", "POSTROUTING"],
};

const IP_RAW: TableSpec = TableSpec {
    name: "raw",
    builtins: &["PREROUTING", "OUTPUT"],
};

// First entry of each list is the protocol's default table.
const IPV4_TABLES: &[TableSpec] = &[
    IP_FILTER,
    TableSpec {
        name: "nat",
        builtins: &["PREROUTING", "INPUT", "OUTPUT", "POSTROUTING"],
    },
    IP_MANGLE,
    IP_RAW,
];

const IPV6_TABLES: &[TableSpec] = &[IP_FILTER, IP_MANGLE, IP_RAW];

const ETHERNET_TABLES: &[TableSpec] = &[
    TableSpec {
        name: "filter",
        builtins: &["INPUT", "FORWARD", "OUTPUT"],
    },
    TableSpec {
        name: "nat",
        builtins: &["PREROUTING", "OUTPUT", "POSTROUTING"],
    },
    TableSpec {
        name: "broute",
        builtins: &["BROUTING"],
    },
];

/// Table vocabulary of a protocol family
pub fn tables_for(protocol: Protocol) -> &'static [TableSpec] {
    match protocol {
        Protocol::IPv4 => IPV4_TABLES,
        Protocol::IPv6 => IPV6_TABLES,
        Protocol::Ethernet => ETHERNET_TABLES,
    }
}

pub fn default_table(protocol: Protocol) -> &'static str {
    tables_for(protocol)[0].name
}

pub fn table_spec(protocol: Protocol, table: &str) -> Option<&'static TableSpec> {
    tables_for(protocol).iter().find(|spec| spec.name == table)
}

/// Describes how to talk to one backend tool. Holds no state and runs nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAdapter {
    protocol: Protocol,
    command: String,
    save_command: String,
}

impl BackendAdapter {
    /// Adapter using the bare tool names, resolved through `$PATH` by the executor
    pub fn standard(protocol: Protocol) -> Self {
        let (command, save_command) = match protocol {
            Protocol::IPv4 => ("iptables", "iptables-save"),
            Protocol::IPv6 => ("ip6tables", "ip6tables-save"),
            Protocol::Ethernet => ("ebtables", "ebtables-save"),
        };
        Self {
            protocol,
            command: command.to_string(),
            save_command: save_command.to_string(),
        }
    }

    pub fn with_commands(mut self, command: impl Into<String>, save_command: impl Into<String>) -> Self {
        self.command = command.into();
        self.save_command = save_command.into();
        self
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn save_command(&self) -> &str {
        &self.save_command
    }

    pub fn tables(&self) -> &'static [TableSpec] {
        tables_for(self.protocol)
    }

    pub fn default_table(&self) -> &'static str {
        default_table(self.protocol)
    }

    pub fn is_builtin(&self, table: &str, chain: &str) -> bool {
        table_spec(self.protocol, table)
            .map(|spec| spec.builtins.contains(&chain))
            .unwrap_or(false)
    }

    pub fn list_argv(&self) -> Vec<String> {
        vec![self.save_command.clone()]
    }

    pub fn create_argv(&self, chain: &ChainId) -> Vec<String> {
        self.chain_argv(chain, "-N")
    }

    pub fn destroy_argv(&self, chain: &ChainId) -> Vec<String> {
        self.chain_argv(chain, "-X")
    }

    pub fn policy_argv(&self, chain: &ChainId, policy: Policy) -> Vec<String> {
        let mut argv = self.chain_argv(chain, "-P");
        argv.push(policy.as_str().to_string());
        argv
    }

    fn chain_argv(&self, chain: &ChainId, flag: &str) -> Vec<String> {
        vec![
            self.command.clone(),
            "-t".to_string(),
            chain.table().to_string(),
            flag.to_string(),
            chain.name().to_string(),
        ]
    }
}

/// The backends a reconciliation pass works against, in enumeration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSet {
    adapters: Vec<BackendAdapter>,
}

impl BackendSet {
    pub fn new(adapters: Vec<BackendAdapter>) -> Self {
        Self { adapters }
    }

    /// IPv4, IPv6 and ethernet with default tool names
    pub fn standard() -> Self {
        Self::only(&Protocol::ALL)
    }

    pub fn only(protocols: &[Protocol]) -> Self {
        Self::new(protocols.iter().map(|p| BackendAdapter::standard(*p)).collect())
    }

    /// Applies command overrides and disabled backends from the config file
    pub fn from_config(config: &Config) -> Self {
        let adapters = Protocol::ALL
            .iter()
            .filter_map(|protocol| {
                let adapter = BackendAdapter::standard(*protocol);
                match config.backends.get(*protocol) {
                    Some(BackendOverride { enabled: false, .. }) => None,
                    Some(over) => {
                        let command = over.command.clone().unwrap_or_else(|| adapter.command.clone());
                        let save = over
                            .save_command
                            .clone()
                            .unwrap_or_else(|| adapter.save_command.clone());
                        Some(adapter.with_commands(command, save))
                    }
                    None => Some(adapter),
                }
            })
            .collect();

        Self::new(adapters)
    }

    /// Keeps only the adapters whose control and save tools can be located
    pub fn discover<L: Locator>(self, locator: &L) -> Self {
        let adapters = self
            .adapters
            .into_iter()
            .filter(|adapter| {
                let found = locator.locate(&adapter.command).is_some()
                    && locator.locate(&adapter.save_command).is_some();
                if !found {
                    tracing::debug!(
                        "{} tools not found, skipping {} backend",
                        adapter.command,
                        adapter.protocol
                    );
                }
                found
            })
            .collect();

        Self::new(adapters)
    }

    pub fn get(&self, protocol: Protocol) -> Option<&BackendAdapter> {
        self.adapters.iter().find(|a| a.protocol == protocol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendAdapter> {
        self.adapters.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }
}

impl Default for BackendSet {
    fn default() -> Self {
        Self::standard()
    }
}
