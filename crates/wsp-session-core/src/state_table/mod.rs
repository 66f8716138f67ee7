pub mod builder;
pub mod tables;
pub mod types;

pub use builder::StateTableBuilder;
pub use types::*;

use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    /// The master state table - single source of truth for all transitions
    pub static ref MASTER_TABLE: Arc<MasterStateTable> = Arc::new(build_master_table());
}

/// Build the complete master state table
fn build_master_table() -> MasterStateTable {
    let table = tables::build_default_table();

    if let Err(errors) = table.validate() {
        tracing::error!("Default state table failed validation: {:?}", errors);
    }

    tracing::debug!("Built state table with {} transitions", table.transition_count());
    table
}
