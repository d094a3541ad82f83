pub mod backend;
pub mod chain;
pub mod config;
pub mod detector;
pub mod error;
pub mod executor;
pub mod planner;
pub mod resolver;

pub use backend::{BackendAdapter, BackendSet, TableSpec};
pub use chain::{ChainId, ChainRecord, DesiredChain, Ensure, Policy, Protocol};
pub use config::{ChainManifest, Config};
pub use detector::{Locator, PathLocator, ProviderDescriptor};
pub use error::{ChainError, Result};
pub use executor::{CommandOutput, ExecError, Executor, SystemExecutor};
pub use planner::{Action, Plan};
pub use resolver::ChainResolver;
