use serde::Serialize;
use std::path::{Path, PathBuf};

/// Finds executables on the host
pub trait Locator {
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Looks names up in `$PATH`; names containing a `/` are checked as given
#[derive(Debug, Clone, Default)]
pub struct PathLocator {
    search_path: Option<std::ffi::OsString>,
}

impl PathLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches the given `PATH`-style list instead of the environment
    pub fn with_search_path(search_path: impl Into<std::ffi::OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    fn is_executable(path: &Path) -> bool {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            path.metadata()
                .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        }
        #[cfg(not(unix))]
        {
            path.is_file()
        }
    }
}

impl Locator for PathLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        if name.contains('/') {
            let path = PathBuf::from(name);
            return Self::is_executable(&path).then_some(path);
        }

        let search_path = match &self.search_path {
            Some(path) => path.clone(),
            None => std::env::var_os("PATH")?,
        };

        std::env::split_paths(&search_path)
            .map(|dir| dir.join(name))
            .find(|candidate| Self::is_executable(candidate))
    }
}

/// A way of managing chains, usable when all of its tools are installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub required_commands: &'static [&'static str],
}

/// Ranked provider list, most capable first
pub const DEFAULT_PROVIDERS: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        name: "xtables",
        description: "iptables, ip6tables and ebtables",
        required_commands: &[
            "iptables",
            "iptables-save",
            "ip6tables",
            "ip6tables-save",
            "ebtables",
            "ebtables-save",
        ],
    },
    ProviderDescriptor {
        name: "xtables-ip",
        description: "iptables and ip6tables without bridge filtering",
        required_commands: &["iptables", "iptables-save", "ip6tables", "ip6tables-save"],
    },
];

/// Availability of one provider's tools
#[derive(Debug, Clone, Serialize)]
pub struct ProviderProbe {
    pub provider: &'static str,
    pub found: Vec<(String, PathBuf)>,
    pub missing: Vec<String>,
}

impl ProviderProbe {
    pub fn is_usable(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn probe_provider<L: Locator>(provider: &ProviderDescriptor, locator: &L) -> ProviderProbe {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for command in provider.required_commands {
        match locator.locate(command) {
            Some(path) => found.push((command.to_string(), path)),
            None => missing.push(command.to_string()),
        }
    }

    ProviderProbe {
        provider: provider.name,
        found,
        missing,
    }
}

/// Picks the first provider whose tools are all present
pub fn select_provider<'a, L: Locator>(
    providers: &'a [ProviderDescriptor],
    locator: &L,
) -> Option<&'a ProviderDescriptor> {
    providers
        .iter()
        .find(|provider| probe_provider(provider, locator).is_usable())
}
