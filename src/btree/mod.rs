pub(crate) mod ledger;
pub mod merge;
pub mod mutate;
pub mod node;
pub mod ops;
pub mod options;
pub mod split;
pub mod verify;

pub use ops::BTree;
pub use options::TreeOptions;
pub use verify::TreeStats;
