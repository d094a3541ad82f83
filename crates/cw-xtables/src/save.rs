//! Chain extraction from `iptables-save`, `ip6tables-save` and `ebtables-save`
//! output.
//!
//! The three tools share one shape: a table block opens with `*<table>`,
//! chains are declared with `:<name> <policy> [<packets>:<bytes>]`, and the
//! block ends with `COMMIT`. `ebtables-save` never writes `COMMIT`, so a new
//! `*<table>` line or the end of input also closes a block. Rules, comments
//! and blank lines are skipped; only chain declarations are extracted.

use cw_core::Policy;
use std::collections::HashSet;
use thiserror::Error;

/// One chain declaration, in the order it appeared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedChain {
    pub table: String,
    pub name: String,
    pub policy: Policy,
}

impl SavedChain {
    pub fn new(table: impl Into<String>, name: impl Into<String>, policy: Policy) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            policy,
        }
    }
}

/// Something odd in the save text that was recovered from locally
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseAnomaly {
    pub line: usize,
    pub kind: AnomalyKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnomalyKind {
    #[error("chain declaration without a name")]
    EmptyChainName,

    #[error("chain {chain} has no policy, assuming '-'")]
    MissingPolicy { chain: String },

    #[error("chain {chain} has unknown policy '{policy}', assuming '-'")]
    UnknownPolicy { chain: String, policy: String },

    #[error("chain {chain} declared twice in table {table}")]
    DuplicateChain { table: String, chain: String },

    #[error("table block without a name")]
    EmptyTableName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSave {
    pub chains: Vec<SavedChain>,
    pub anomalies: Vec<ParseAnomaly>,
}

/// Parses save text into chain declarations. Never fails: odd lines become
/// anomalies and parsing carries on.
pub fn parse(text: &str) -> ParsedSave {
    let mut parsed = ParsedSave::default();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut table: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();

        if let Some(name) = line.strip_prefix('*') {
            let name = name.trim();
            if name.is_empty() {
                parsed.anomalies.push(ParseAnomaly {
                    line: line_no,
                    kind: AnomalyKind::EmptyTableName,
                });
                table = None;
            } else {
                table = Some(name.to_string());
            }
            continue;
        }

        if line == "COMMIT" {
            table = None;
            continue;
        }

        let (Some(current), Some(decl)) = (table.as_deref(), line.strip_prefix(':')) else {
            continue;
        };

        let mut tokens = decl.split_whitespace();
        let Some(name) = tokens.next().filter(|_| !decl.starts_with(char::is_whitespace)) else {
            parsed.anomalies.push(ParseAnomaly {
                line: line_no,
                kind: AnomalyKind::EmptyChainName,
            });
            continue;
        };

        let policy = match tokens.next() {
            Some(token) => token.parse::<Policy>().unwrap_or_else(|_| {
                parsed.anomalies.push(ParseAnomaly {
                    line: line_no,
                    kind: AnomalyKind::UnknownPolicy {
                        chain: name.to_string(),
                        policy: token.to_string(),
                    },
                });
                Policy::Unset
            }),
            None => {
                parsed.anomalies.push(ParseAnomaly {
                    line: line_no,
                    kind: AnomalyKind::MissingPolicy {
                        chain: name.to_string(),
                    },
                });
                Policy::Unset
            }
        };

        if !seen.insert((current.to_string(), name.to_string())) {
            parsed.anomalies.push(ParseAnomaly {
                line: line_no,
                kind: AnomalyKind::DuplicateChain {
                    table: current.to_string(),
                    chain: name.to_string(),
                },
            });
            continue;
        }

        parsed.chains.push(SavedChain::new(current, name, policy));
    }

    for anomaly in &parsed.anomalies {
        tracing::warn!("save output: {}", anomaly);
    }

    parsed
}

/// Renders chain declarations back into save text, one block per table in
/// first-seen order. Counters are written as zero.
pub fn render(chains: &[SavedChain]) -> String {
    let mut tables: Vec<&str> = Vec::new();
    for chain in chains {
        if !tables.contains(&chain.table.as_str()) {
            tables.push(&chain.table);
        }
    }

    let mut out = String::new();
    for table in tables {
        out.push('*');
        out.push_str(table);
        out.push('\n');
        for chain in chains.iter().filter(|c| c.table == table) {
            out.push_str(&format!(":{} {} [0:0]\n", chain.name, chain.policy));
        }
        out.push_str("COMMIT\n");
    }
    out
}
