// ── Session entity storage ──

mod table;

pub(crate) use table::EntityTable;

/// Shared snapshot type handed to readers.
pub type EntitySnapshot = std::sync::Arc<Vec<std::sync::Arc<crate::model::NetworkEntity>>>;
