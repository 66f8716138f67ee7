pub mod callee;
pub mod caller;
pub mod common;

use super::{MasterStateTable, StateTableBuilder};

/// Build the default WSP table: role-specific negotiation plus the shared
/// candidate, handover and termination transitions
pub fn build_default_table() -> MasterStateTable {
    let mut builder = StateTableBuilder::new();
    caller::add_caller_transitions(&mut builder);
    callee::add_callee_transitions(&mut builder);
    common::add_common_transitions(&mut builder);
    builder.build()
}
