//! Event dispatcher: routes each decoded inbound event to its reconciler
//! handler.
//!
//! Unknown kinds never reach this point; the codec drops them.

use parley_chat_types::InboundEvent;

use crate::store::{ChatState, Effect};

/// Apply one inbound event to the store and return the resulting effects.
///
/// Runs to completion; callers must not interleave two dispatches on the
/// same state.
pub fn dispatch(state: &mut ChatState, event: InboundEvent) -> Vec<Effect> {
    tracing::trace!("Dispatching {}", event.kind());

    match event {
        InboundEvent::ReceiveMessage(p) => state.receive_message(p.message, p.dialog),
        InboundEvent::ReadMessage(p) => state.read_message(&p.dialog_id, &p.message_id),
        InboundEvent::ToggleOnlineStatus(p) => {
            state.presence(&p.user_id, p.is_online, p.last_activity)
        }
        InboundEvent::Typing(p) => state.typing(&p.dialog_id, true),
        InboundEvent::Untyping(p) => state.typing(&p.dialog_id, false),
        InboundEvent::UserBlocked(p) => state.user_blocked(&p.user_id, p.is_blocked),
        InboundEvent::UserLogout(p) => {
            state.user_logout(&p.session_id, p.success, p.current_session_id.as_ref())
        }
        InboundEvent::DeleteDialog(p) => state.delete_dialog(&p.dialog_id),
        InboundEvent::DeleteUser(_) => state.delete_user(),
    }
}
