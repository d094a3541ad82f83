use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chain names owned by the kernel. Which of them exist depends on the table.
pub const RESERVED_CHAINS: [&str; 6] = [
    "INPUT",
    "OUTPUT",
    "FORWARD",
    "PREROUTING",
    "POSTROUTING",
    "BROUTING",
];

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_CHAINS.contains(&name)
}

/// Packet-filter subsystem a chain belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    IPv4,
    IPv6,
    Ethernet,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::IPv4, Protocol::IPv6, Protocol::Ethernet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::IPv4 => "IPv4",
            Protocol::IPv6 => "IPv6",
            Protocol::Ethernet => "ethernet",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ipv4" => Ok(Protocol::IPv4),
            "ipv6" => Ok(Protocol::IPv6),
            "ethernet" => Ok(Protocol::Ethernet),
            _ => Err(format!("unknown protocol '{}'", s)),
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.as_str().to_string()
    }
}

/// Default target of a chain. `Unset` is the `-` placeholder user chains carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Policy {
    Accept,
    Drop,
    Return,
    Unset,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Accept => "ACCEPT",
            Policy::Drop => "DROP",
            Policy::Return => "RETURN",
            Policy::Unset => "-",
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Policy::Unset)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACCEPT" => Ok(Policy::Accept),
            "DROP" => Ok(Policy::Drop),
            "RETURN" => Ok(Policy::Return),
            "-" => Ok(Policy::Unset),
            _ => Err(format!("unknown policy '{}'", s)),
        }
    }
}

impl TryFrom<String> for Policy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Policy> for String {
    fn from(policy: Policy) -> Self {
        policy.as_str().to_string()
    }
}

/// Resolved identity of a chain.
///
/// Only the resolver builds these, so the table is always concrete and the
/// `builtin` flag is computed once from the owning backend's tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChainId {
    table: String,
    name: String,
    protocol: Protocol,
    builtin: bool,
}

impl ChainId {
    pub(crate) fn new(table: String, name: String, protocol: Protocol, builtin: bool) -> Self {
        Self {
            table,
            name,
            protocol,
            builtin,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Built-in chains are protected from deletion
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.table, self.name, self.protocol)
    }
}

/// A chain as it exists in the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainRecord {
    #[serde(flatten)]
    pub id: ChainId,
    pub policy: Policy,
}

impl ChainRecord {
    pub fn new(id: ChainId, policy: Policy) -> Self {
        Self { id, policy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ensure::Present => f.write_str("present"),
            Ensure::Absent => f.write_str("absent"),
        }
    }
}

/// A chain resource declared by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredChain {
    /// Logical name, `table:name:protocol`
    pub name: String,
    #[serde(default)]
    pub ensure: Ensure,
    #[serde(default)]
    pub policy: Option<Policy>,
}

impl DesiredChain {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Present,
            policy: None,
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Absent,
            policy: None,
        }
    }

    /// Builds the logical name from separate segments. An empty table or a
    /// missing protocol falls back to the usual defaults at resolve time.
    pub fn from_parts(table: &str, name: &str, protocol: Option<Protocol>, ensure: Ensure) -> Self {
        let protocol = protocol.map(|p| p.as_str()).unwrap_or("");
        Self {
            name: format!("{}:{}:{}", table, name, protocol),
            ensure,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }
}
