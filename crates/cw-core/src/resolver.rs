use crate::backend::{default_table, table_spec};
use crate::chain::{ChainId, Protocol, is_reserved_name};
use crate::error::{ChainError, Result};

/// Segments of a logical resource name before defaulting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceName<'a> {
    pub table: &'a str,
    pub name: &'a str,
    pub protocol: &'a str,
}

impl<'a> ResourceName<'a> {
    /// Splits `table:name:protocol`. The table ends at the first `:` and the
    /// protocol starts after the last one, so chain names may contain `:`.
    /// `table:name` is accepted as shorthand for `table:name:`.
    pub fn split(logical: &'a str) -> Result<Self> {
        let (table, rest) = logical.split_once(':').ok_or_else(|| {
            ChainError::invalid_resource(logical, "expected the form table:name:protocol")
        })?;
        let (name, protocol) = rest.rsplit_once(':').unwrap_or((rest, ""));

        Ok(Self {
            table,
            name,
            protocol,
        })
    }
}

/// Maps logical chain names onto exactly one backend identity.
///
/// Pure and deterministic: the enumerator tags discovered chains through the
/// same derivation so that desired and discovered identities compare equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainResolver;

impl ChainResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, logical: &str) -> Result<ChainId> {
        let parts = ResourceName::split(logical)?;

        let protocol = if parts.protocol.is_empty() {
            None
        } else {
            Some(
                parts
                    .protocol
                    .parse::<Protocol>()
                    .map_err(|e| ChainError::invalid_resource(logical, e))?,
            )
        };

        self.resolve_parts(parts.table, parts.name, protocol)
    }

    pub fn resolve_parts(&self, table: &str, name: &str, protocol: Option<Protocol>) -> Result<ChainId> {
        let protocol = protocol.unwrap_or(Protocol::IPv4);
        let display = format!("{}:{}:{}", table, name, protocol);

        if name.is_empty() {
            return Err(ChainError::invalid_resource(display, "chain name is empty"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ChainError::invalid_resource(
                display,
                "chain name contains whitespace",
            ));
        }

        let table = if table.is_empty() {
            default_table(protocol).to_string()
        } else {
            table.to_ascii_lowercase()
        };

        let spec = table_spec(protocol, &table).ok_or_else(|| ChainError::InvalidTable {
            table: table.clone(),
            protocol,
        })?;

        let builtin = spec.builtins.contains(&name);
        if !builtin && is_reserved_name(name) {
            return Err(ChainError::invalid_resource(
                display,
                format!("{} is not a built-in chain of table '{}'", name, table),
            ));
        }

        Ok(ChainId::new(table, name.to_string(), protocol, builtin))
    }

    /// Every spelling that resolves to `id`, canonical form first
    pub fn aliases(&self, id: &ChainId) -> Vec<String> {
        let (table, name, protocol) = (id.table(), id.name(), id.protocol());
        let mut aliases = vec![id.to_string()];

        if protocol == Protocol::IPv4 {
            aliases.push(format!("{}:{}:", table, name));
            // A colon in the name would be read as the protocol separator
            if !name.contains(':') {
                aliases.push(format!("{}:{}", table, name));
            }
        }

        if table == default_table(protocol) {
            aliases.push(format!(":{}:{}", name, protocol));
            if protocol == Protocol::IPv4 {
                aliases.push(format!(":{}:", name));
            }
        }

        aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> Result<ChainId> {
        ChainResolver::new().resolve(name)
    }

    #[test]
    fn empty_segments_pick_defaults() {
        let id = resolve(":test:").unwrap();
        assert_eq!((id.table(), id.name(), id.protocol()), ("filter", "test", Protocol::IPv4));

        let id = resolve(":test:IPv6").unwrap();
        assert_eq!((id.table(), id.name(), id.protocol()), ("filter", "test", Protocol::IPv6));

        let id = resolve("nat:test").unwrap();
        assert_eq!((id.table(), id.name(), id.protocol()), ("nat", "test", Protocol::IPv4));
    }

    #[test]
    fn alias_forms_normalize_to_one_identity() {
        let canonical = resolve("filter:test:IPv4").unwrap();
        for alias in ["filter:test:", "filter:test", ":test:IPv4", ":test:", "FILTER:test:ipv4"] {
            assert_eq!(resolve(alias).unwrap(), canonical, "alias {}", alias);
        }
    }

    #[test]
    fn listed_aliases_resolve_back() {
        let resolver = ChainResolver::new();
        for name in ["filter:test:IPv4", "mangle:ff:IPv6", "broute:broute:ethernet", "nat:a:b:IPv4"] {
            let id = resolver.resolve(name).unwrap();
            for alias in resolver.aliases(&id) {
                assert_eq!(resolver.resolve(&alias).unwrap(), id, "alias {}", alias);
            }
        }

        let id = resolver.resolve(":test:").unwrap();
        assert_eq!(
            resolver.aliases(&id),
            vec!["filter:test:IPv4", "filter:test:", "filter:test", ":test:IPv4", ":test:"]
        );
    }

    #[test]
    fn names_with_colons_and_punctuation_stay_verbatim() {
        let id = resolve(":$5()*&%'\"^$)::IPv4").unwrap();
        assert_eq!(id.name(), "$5()*&%'\"^$):");
        assert_eq!(id.table(), "filter");
        assert!(!id.is_builtin());
    }

    #[test]
    fn unknown_tables_are_rejected() {
        assert_eq!(
            resolve("nat:test:IPv6").unwrap_err(),
            ChainError::InvalidTable {
                table: "nat".into(),
                protocol: Protocol::IPv6
            }
        );
        assert!(matches!(
            resolve("broute:test:IPv4"),
            Err(ChainError::InvalidTable { .. })
        ));
        assert!(matches!(
            resolve("security:test:IPv4"),
            Err(ChainError::InvalidTable { .. })
        ));
    }

    #[test]
    fn builtin_flag_depends_on_table() {
        assert!(resolve(":INPUT:").unwrap().is_builtin());
        assert!(resolve("broute:BROUTING:ethernet").unwrap().is_builtin());
        assert!(resolve("nat:OUTPUT:ethernet").unwrap().is_builtin());
        assert!(!resolve("filter:input:IPv4").unwrap().is_builtin());
    }

    #[test]
    fn reserved_names_outside_their_table_are_invalid() {
        for name in ["raw:INPUT:IPv4", "filter:BROUTING:ethernet", "filter:PREROUTING:IPv6"] {
            assert!(
                matches!(resolve(name), Err(ChainError::InvalidResource { .. })),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn malformed_names_are_invalid_resources() {
        for name in ["test", "filter::IPv4", "::", "filter:test:IPX", ":two words:"] {
            assert!(
                matches!(resolve(name), Err(ChainError::InvalidResource { .. })),
                "{} should be rejected",
                name
            );
        }
    }
}
