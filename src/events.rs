//! Application-wide notifications (toasts, connect-wallet prompts, confirmations).
//!
//! Publishers never block; with no subscriber attached events are dropped.

use tokio::sync::broadcast;

use crate::interactions::Action;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    Toast { kind: ToastKind, message: String },
    /// An action needs a wallet session first.
    ConnectWallet,
    /// A confirmation prompt should be shown for this action.
    ConfirmationRequested { action: Action, deposit_options: Vec<String> },
    /// Session account changed (None when disconnected).
    AccountChanged(Option<String>),
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AppEvent) {
        log::debug!("[events] {event:?}");
        let _ = self.tx.send(event);
    }

    pub fn toast(&self, kind: ToastKind, message: impl Into<String>) {
        self.emit(AppEvent::Toast {
            kind,
            message: message.into(),
        });
    }
}
