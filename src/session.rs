//! Wallet session: connection status, active account and cached balance.
//!
//! Persistence belongs to the wallet; [`SessionStore::restore`] reads whatever
//! account the wallet remembers. Subscribers see every change through a watch
//! channel and an [`AppEvent::AccountChanged`] on the bus.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::watch;

use crate::events::{AppEvent, EventBus};
use crate::rpc_utils::BalanceSource;
use crate::types::Session;
use crate::wallet::Wallet;

pub struct SessionStore {
    state: watch::Sender<Session>,
    balances: Arc<dyn BalanceSource>,
    events: EventBus,
}

impl SessionStore {
    pub fn new(balances: Arc<dyn BalanceSource>, events: EventBus) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            state,
            balances,
            events,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Account id when connected.
    pub fn active_account(&self) -> Option<String> {
        let s = self.state.borrow();
        if s.is_connected {
            s.account_id.clone()
        } else {
            None
        }
    }

    /// Adopt the session the wallet already holds, if any.
    pub fn restore(&self, wallet: &dyn Wallet) -> Option<String> {
        let account = wallet.account_id()?;
        match self.connect(&account) {
            Ok(()) => Some(account),
            Err(e) => {
                log::warn!("[session] wallet remembered an unusable account: {e}");
                None
            }
        }
    }

    pub fn connect(&self, account_id: &str) -> Result<()> {
        account_id
            .parse::<near_account_id::AccountId>()
            .map_err(|e| anyhow!("invalid account id '{account_id}': {e}"))?;
        let changed = self.state.send_if_modified(|s| {
            if s.is_connected && s.account_id.as_deref() == Some(account_id) {
                return false;
            }
            *s = Session {
                is_connected: true,
                account_id: Some(account_id.to_string()),
                balance: None,
            };
            true
        });
        if changed {
            log::info!("[session] connected as {account_id}");
            self.events
                .emit(AppEvent::AccountChanged(Some(account_id.to_string())));
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        let changed = self.state.send_if_modified(|s| {
            if !s.is_connected {
                return false;
            }
            *s = Session::default();
            true
        });
        if changed {
            log::info!("[session] disconnected");
            self.events.emit(AppEvent::AccountChanged(None));
        }
    }

    /// Refresh the cached balance. A failed lookup keeps the last known value;
    /// a result for an account that is no longer active is discarded.
    pub async fn refresh_balance(&self) -> Option<String> {
        let account = self.active_account()?;
        match self.balances.balance(&account).await {
            Ok(balance) => {
                let applied = self.state.send_if_modified(|s| {
                    if s.account_id.as_deref() != Some(account.as_str()) || !s.is_connected {
                        return false;
                    }
                    s.balance = Some(balance.clone());
                    true
                });
                applied.then_some(balance)
            }
            Err(e) => {
                log::warn!("[session] balance refresh for {account} failed: {e}");
                self.state.borrow().balance.clone()
            }
        }
    }
}
