use super::actions::ActionContext;
use crate::session::Session;
use crate::state_table::Guard;

/// Check if a guard condition is satisfied
pub fn check_guard(guard: Guard, session: &Session, ctx: &ActionContext) -> bool {
    match guard {
        Guard::HasRemoteStream => session.remote_stream.is_some(),
        Guard::SelfHandoverDone => ctx.handover.is_self_transferred(),
        Guard::RemoteHandoverObserved => ctx.handover.remote_notice_seen(),
    }
}
