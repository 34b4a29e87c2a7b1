//! Dialog state reconciler.
//!
//! [`ChatState`] is the canonical in-memory store of dialogs. Every inbound
//! event is applied as a state transition through one of the handler methods,
//! which return the [`Effect`]s the caller must carry out (notifications,
//! forced logout, UI refresh). Nothing in here performs I/O.

use std::cmp::Reverse;

use parley_chat_types::{Dialog, DialogId, Message, MessageId, Session, SessionId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Global (per-user) notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Show system notifications for chat messages.
    #[serde(default = "default_true")]
    pub chat_notifications: bool,
    /// Play a sound with chat notifications.
    #[serde(default = "default_true")]
    pub chat_sound: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            chat_notifications: true,
            chat_sound: true,
        }
    }
}

/// Side effects requested by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show a system notification for a new message.
    Notify {
        /// Dialog the message arrived in.
        dialog_id: DialogId,
        /// The new message.
        message_id: MessageId,
        /// Whether to play a sound with it.
        sound: bool,
    },
    /// A dialog was created or mutated.
    DialogChanged(DialogId),
    /// A dialog was removed.
    DialogRemoved(DialogId),
    /// A session was removed from the session list.
    SessionRemoved(SessionId),
    /// All state was cleared; the client must restart from scratch.
    ForceLogout {
        /// Why the session ended.
        reason: String,
    },
}

/// In-memory dialog collection plus the bits of session state the
/// reconciler needs.
#[derive(Debug, Clone)]
pub struct ChatState {
    user_id: UserId,
    session_id: Option<SessionId>,
    dialogs: Vec<Dialog>,
    active: Option<DialogId>,
    typing_in: Option<DialogId>,
    sessions: Vec<Session>,
    notifications: NotificationSettings,
}

impl ChatState {
    /// Create an empty store for the given local user.
    pub fn new(user_id: UserId, session_id: Option<SessionId>) -> Self {
        Self {
            user_id,
            session_id,
            dialogs: Vec::new(),
            active: None,
            typing_in: None,
            sessions: Vec::new(),
            notifications: NotificationSettings::default(),
        }
    }

    /// Builder: set the notification preferences.
    pub fn with_notifications(mut self, notifications: NotificationSettings) -> Self {
        self.notifications = notifications;
        self
    }

    // ===========================================
    // Inbound event handlers
    // ===========================================

    /// `RECEIVE_MESSAGE`: upsert the dialog, then append the message.
    pub fn receive_message(&mut self, message: Message, snapshot: Dialog) -> Vec<Effect> {
        let mut effects = Vec::new();
        let index = self.upsert_snapshot(snapshot, &message.id);
        let dialog = &mut self.dialogs[index];

        if dialog.message(&message.id).is_some() {
            tracing::debug!("Ignoring duplicate message {} in {}", message.id, dialog.id);
            return effects;
        }

        if let Some(file) = &message.file {
            dialog.images.push(file.clone());
        }
        let from_counterpart = dialog.is_from_counterpart(&message);
        if from_counterpart {
            dialog.unread_count = dialog.unread_count.saturating_add(1);
        }
        dialog.last_message = Some(message.clone());
        dialog.messages.push(message.clone());

        effects.push(Effect::DialogChanged(dialog.id.clone()));

        if dialog.is_notifications_enabled
            && self.notifications.chat_notifications
            && message.sender.id != self.user_id
        {
            effects.push(Effect::Notify {
                dialog_id: dialog.id.clone(),
                message_id: message.id,
                sound: dialog.is_sound_enabled && self.notifications.chat_sound,
            });
        }

        effects
    }

    /// `READ_MESSAGE`: mark one message read. Repeats are no-ops.
    pub fn read_message(&mut self, dialog_id: &DialogId, message_id: &MessageId) -> Vec<Effect> {
        let Some(dialog) = self.dialogs.iter_mut().find(|d| &d.id == dialog_id) else {
            return vec![];
        };
        let counterpart = dialog.counterpart.id.clone();
        let Some(message) = dialog.messages.iter_mut().find(|m| &m.id == message_id) else {
            return vec![];
        };
        if message.is_read {
            tracing::debug!("Message {} already read", message_id);
            return vec![];
        }

        message.is_read = true;
        let from_counterpart = message.sender.id == counterpart;
        if let Some(last) = dialog.last_message.as_mut().filter(|m| &m.id == message_id) {
            last.is_read = true;
        }
        if from_counterpart {
            dialog.unread_count = dialog.unread_count.saturating_sub(1);
        }

        vec![Effect::DialogChanged(dialog.id.clone())]
    }

    /// `TOGGLE_ONLINE_STATUS`: update the counterpart's presence.
    pub fn presence(
        &mut self,
        user_id: &UserId,
        is_online: bool,
        last_activity: Option<Timestamp>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        for dialog in self.dialogs.iter_mut().filter(|d| &d.counterpart.id == user_id) {
            let counterpart = &mut dialog.counterpart;
            counterpart.is_online = Some(is_online);
            if last_activity.is_some() {
                counterpart.last_activity = last_activity;
            }
            if !is_online {
                counterpart.is_typing = false;
            }
            effects.push(Effect::DialogChanged(dialog.id.clone()));
        }
        effects
    }

    /// `TYPING` / `UNTYPING`: set the counterpart's typing flag.
    pub fn typing(&mut self, dialog_id: &DialogId, is_typing: bool) -> Vec<Effect> {
        match self.dialog_mut(dialog_id) {
            Some(dialog) if dialog.counterpart.is_typing != is_typing => {
                dialog.counterpart.is_typing = is_typing;
                vec![Effect::DialogChanged(dialog_id.clone())]
            }
            _ => vec![],
        }
    }

    /// `USER_BLOCKED`: update the counterpart's block flag.
    pub fn user_blocked(&mut self, user_id: &UserId, is_blocked: bool) -> Vec<Effect> {
        self.dialogs
            .iter_mut()
            .filter(|d| &d.counterpart.id == user_id)
            .map(|dialog| {
                dialog.counterpart.is_blocked = is_blocked;
                Effect::DialogChanged(dialog.id.clone())
            })
            .collect()
    }

    /// `DELETE_DIALOG`: remove the dialog.
    pub fn delete_dialog(&mut self, dialog_id: &DialogId) -> Vec<Effect> {
        match self.remove_dialog(dialog_id) {
            Some(_) => vec![Effect::DialogRemoved(dialog_id.clone())],
            None => vec![],
        }
    }

    /// `USER_LOGOUT`: a failed logout of the local session ends this
    /// client; anything else just drops the session from the list.
    pub fn user_logout(
        &mut self,
        session_id: &SessionId,
        success: bool,
        current_session_id: Option<&SessionId>,
    ) -> Vec<Effect> {
        if !success && self.session_id.as_ref() == Some(session_id) {
            let reason = match current_session_id {
                Some(by) => format!("session {} terminated by {}", session_id, by),
                None => format!("session {} terminated", session_id),
            };
            return self.force_logout(reason);
        }

        let before = self.sessions.len();
        self.sessions.retain(|s| &s.id != session_id);
        if self.sessions.len() < before {
            vec![Effect::SessionRemoved(session_id.clone())]
        } else {
            vec![]
        }
    }

    /// `DELETE_USER`: the local account is gone.
    pub fn delete_user(&mut self) -> Vec<Effect> {
        self.force_logout("account deleted".to_string())
    }

    fn force_logout(&mut self, reason: String) -> Vec<Effect> {
        tracing::warn!("Forced logout: {}", reason);
        self.clear();
        vec![Effect::ForceLogout { reason }]
    }

    // ===========================================
    // Collection operations (REST boundary)
    // ===========================================

    /// Replace the collection with a bulk fetch result.
    pub fn load_dialogs(&mut self, dialogs: Vec<Dialog>) {
        self.dialogs = dialogs;
        for dialog in &mut self.dialogs {
            dialog.normalize();
        }
        if let Some(active) = self.active.clone() {
            if self.dialog(&active).is_none() {
                self.active = None;
            }
        }
        if let Some(typing) = self.typing_in.clone() {
            if self.dialog(&typing).is_none() {
                self.typing_in = None;
            }
        }
    }

    /// Insert a dialog, or replace the existing one with the same id in
    /// place. Returns `true` if the dialog was new.
    pub fn upsert_dialog(&mut self, mut dialog: Dialog) -> bool {
        dialog.normalize();
        match self.position(&dialog.id) {
            Some(index) => {
                self.dialogs[index] = dialog;
                false
            }
            None => {
                self.dialogs.push(dialog);
                true
            }
        }
    }

    /// Prepend an older page of history (oldest first). Messages already
    /// present are skipped. Returns how many were added.
    pub fn prepend_history(&mut self, dialog_id: &DialogId, page: Vec<Message>) -> usize {
        let Some(dialog) = self.dialog_mut(dialog_id) else {
            return 0;
        };

        let older: Vec<Message> = page
            .into_iter()
            .filter(|m| dialog.message(&m.id).is_none())
            .collect();
        let added = older.len();
        if added == 0 {
            return 0;
        }

        let mut images: Vec<_> = older.iter().filter_map(|m| m.file.clone()).collect();
        images.append(&mut dialog.images);
        dialog.images = images;

        let mut messages = older;
        messages.append(&mut dialog.messages);
        dialog.messages = messages;
        dialog.normalize();
        added
    }

    /// Remove a dialog, clearing the active and typing references to it.
    pub fn remove_dialog(&mut self, dialog_id: &DialogId) -> Option<Dialog> {
        let index = self.position(dialog_id)?;
        if self.active.as_ref() == Some(dialog_id) {
            self.active = None;
        }
        if self.typing_in.as_ref() == Some(dialog_id) {
            self.typing_in = None;
        }
        Some(self.dialogs.remove(index))
    }

    /// Replace the session list.
    pub fn set_sessions(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
    }

    /// Replace the notification preferences.
    pub fn set_notifications(&mut self, notifications: NotificationSettings) {
        self.notifications = notifications;
    }

    /// Drop every dialog, session and reference.
    pub fn clear(&mut self) {
        self.dialogs.clear();
        self.sessions.clear();
        self.active = None;
        self.typing_in = None;
    }

    // ===========================================
    // Active dialog and local typing
    // ===========================================

    /// Make a known dialog the active one. Returns `false` for unknown ids.
    pub fn set_active_dialog(&mut self, dialog_id: &DialogId) -> bool {
        if self.position(dialog_id).is_none() {
            return false;
        }
        self.active = Some(dialog_id.clone());
        true
    }

    /// Clear the active dialog reference.
    pub fn clear_active_dialog(&mut self) {
        self.active = None;
    }

    /// Record whether the local user is typing in a dialog.
    pub fn set_local_typing(&mut self, dialog_id: &DialogId, is_typing: bool) {
        if is_typing {
            self.typing_in = Some(dialog_id.clone());
        } else if self.typing_in.as_ref() == Some(dialog_id) {
            self.typing_in = None;
        }
    }

    /// Dialog the local user is typing in, if any.
    pub fn local_typing(&self) -> Option<&DialogId> {
        self.typing_in.as_ref()
    }

    /// The dialog that needs an `UNTYPING` before `next` becomes active.
    pub fn stale_typing(&self, next: Option<&DialogId>) -> Option<DialogId> {
        self.typing_in
            .as_ref()
            .filter(|typing| Some(*typing) != next)
            .cloned()
    }

    // ===========================================
    // Queries
    // ===========================================

    /// The local user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The local session, if known.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Dialogs in server order.
    pub fn dialogs(&self) -> &[Dialog] {
        &self.dialogs
    }

    /// Look up a dialog by id.
    pub fn dialog(&self, dialog_id: &DialogId) -> Option<&Dialog> {
        self.dialogs.iter().find(|d| &d.id == dialog_id)
    }

    /// The active dialog.
    pub fn active_dialog(&self) -> Option<&Dialog> {
        self.active.as_ref().and_then(|id| self.dialog(id))
    }

    /// Id of the active dialog.
    pub fn active_dialog_id(&self) -> Option<&DialogId> {
        self.active.as_ref()
    }

    /// Unread messages across all dialogs.
    pub fn total_unread(&self) -> u32 {
        self.dialogs
            .iter()
            .fold(0u32, |sum, d| sum.saturating_add(d.unread_count))
    }

    /// Number of dialogs with at least one unread message.
    pub fn unread_dialog_count(&self) -> usize {
        self.dialogs.iter().filter(|d| d.unread_count > 0).count()
    }

    /// Dialogs in presentation order: pinned first, then by newest message,
    /// dialogs without messages last. Ties keep server order.
    pub fn sorted_dialogs(&self) -> Vec<&Dialog> {
        let mut sorted: Vec<&Dialog> = self.dialogs.iter().collect();
        sorted.sort_by_key(|d| {
            let last = d.last_activity_at();
            (Reverse(d.is_pinned), last.is_none(), Reverse(last))
        });
        sorted
    }

    /// The local user's sessions.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Current notification preferences.
    pub fn notifications(&self) -> NotificationSettings {
        self.notifications
    }

    fn position(&self, dialog_id: &DialogId) -> Option<usize> {
        self.dialogs.iter().position(|d| &d.id == dialog_id)
    }

    fn dialog_mut(&mut self, dialog_id: &DialogId) -> Option<&mut Dialog> {
        self.dialogs.iter_mut().find(|d| &d.id == dialog_id)
    }

    /// Find the dialog for an incoming message, synthesizing it from the
    /// snapshot when it is not known yet.
    fn upsert_snapshot(&mut self, mut snapshot: Dialog, incoming: &MessageId) -> usize {
        if let Some(index) = self.position(&snapshot.id) {
            return index;
        }

        tracing::debug!("Creating dialog {} from message snapshot", snapshot.id);
        snapshot.messages.retain(|m| &m.id != incoming);
        snapshot.last_message = None;
        snapshot.unread_count = 0;
        snapshot.normalize();
        self.dialogs.push(snapshot);
        self.dialogs.len() - 1
    }
}
