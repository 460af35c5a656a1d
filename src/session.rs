//! Per-principal interaction state: which workflow a principal is in and the
//! transient messages emitted while in it.

use crate::telegram::MessageRef;
use dashmap::DashMap;
use serde::Serialize;

/// Workflow a principal is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Idle,
    AwaitingIngest,
    AwaitingRevokeToken,
}

/// Classified incoming event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// `/upload`
    IngestCommand,
    /// "Clear specific file" pressed in the admin panel
    RevokeMenu,
    /// `/cancel`
    Cancel,
    /// A message carrying media
    Media,
    /// Plain text (or anything else without media)
    Text,
    /// A known command handled outside the ingest/revoke workflows
    OtherCommand,
    /// A command the bot does not know
    UnknownCommand,
}

/// What the handler must do for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EnterIngest,
    Ingest,
    RejectNonMedia,
    EnterRevoke,
    Revoke,
    Cancel,
    /// Dropped without any output
    Ignore,
    /// Not part of a workflow; regular command/idle handling applies
    PassThrough,
}

/// Transition table for the ingest and revoke workflows.
///
/// Privileged-only transitions requested by anyone else are ignored without
/// feedback, so the workflows cannot be discovered by probing.
pub fn transition(mode: Mode, trigger: Trigger, privileged: bool) -> Action {
    match (mode, trigger) {
        (_, Trigger::Cancel) => Action::Cancel,
        (_, Trigger::IngestCommand | Trigger::RevokeMenu) if !privileged => Action::Ignore,
        (_, _) if !privileged => match mode {
            Mode::Idle => Action::PassThrough,
            // Only the operator can be in a workflow mode
            _ => Action::Ignore,
        },
        (_, Trigger::IngestCommand) => Action::EnterIngest,
        (_, Trigger::RevokeMenu) => Action::EnterRevoke,
        (Mode::AwaitingIngest, Trigger::Media) => Action::Ingest,
        // Nothing but media and /cancel is accepted while ingesting
        (
            Mode::AwaitingIngest,
            Trigger::Text | Trigger::UnknownCommand | Trigger::OtherCommand,
        ) => Action::RejectNonMedia,
        (Mode::AwaitingRevokeToken, _) => Action::Revoke,
        (Mode::Idle, Trigger::UnknownCommand) => Action::Ignore,
        (Mode::Idle, Trigger::Media | Trigger::Text | Trigger::OtherCommand) => Action::PassThrough,
    }
}

#[derive(Debug, Clone, Default)]
struct Session {
    mode: Mode,
    transient: Vec<MessageRef>,
}

/// Sessions keyed by principal id. A principal without an entry is Idle.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<i64, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, principal: i64) -> Mode {
        self.sessions
            .get(&principal)
            .map(|s| s.mode)
            .unwrap_or_default()
    }

    /// Switch a principal into a workflow mode. Messages already tracked stay
    /// tracked so a later cancel still wipes them.
    pub fn enter(&self, principal: i64, mode: Mode) {
        if mode == Mode::Idle {
            self.reset(principal);
            return;
        }
        self.sessions.entry(principal).or_default().mode = mode;
    }

    /// Remember a transient message for rollback. Ignored while Idle so the
    /// tracked set is never populated outside a workflow.
    pub fn track(&self, principal: i64, message: MessageRef) -> bool {
        match self.sessions.get_mut(&principal) {
            Some(mut session) if session.mode != Mode::Idle => {
                session.transient.push(message);
                true
            }
            _ => false,
        }
    }

    /// Return the principal to Idle, handing back everything tracked.
    pub fn reset(&self, principal: i64) -> Vec<MessageRef> {
        self.sessions
            .remove(&principal)
            .map(|(_, session)| session.transient)
            .unwrap_or_default()
    }

    pub fn tracked(&self, principal: i64) -> Vec<MessageRef> {
        self.sessions
            .get(&principal)
            .map(|s| s.transient.clone())
            .unwrap_or_default()
    }
}
