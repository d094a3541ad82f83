pub mod enumerator;
pub mod reconciler;
pub mod save;

#[cfg(test)]
mod testing;

pub use enumerator::{ChainEnumerator, Inventory};
pub use reconciler::Reconciler;
pub use save::{ParseAnomaly, ParsedSave, SavedChain};
