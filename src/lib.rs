//! Near City - social core for a NEAR Social client
//!
//! This library provides the data side of a social feed built on the NEAR
//! Social contract: paged posts with profile and interaction hydration,
//! optimistic likes/reposts/follows/pokes signed through an external wallet,
//! and a small read-only HTTP query API.
//!
//! ## Architecture
//!
//! - [`social`]: gateway over the social index/get primitives; reads degrade,
//!   writes go through a [`wallet::Wallet`]
//! - [`feed`]: paged feed controller with superseded-load protection
//! - [`interactions`]: confirmation, optimistic update, reconcile, rollback
//! - [`session`]: wallet session and cached balance
//! - [`events`]: toasts and prompts for whatever renders the UI
//!
//! ## Usage
//!
//! Command line:
//! ```bash
//! cargo run -- feed --pages 2
//! ```
//!
//! Query API:
//! ```bash
//! cargo run --bin nearcity-api --features api
//! ```

// Core modules
pub mod config;
pub mod types;

// HTTP plumbing and NEAR RPC helpers
pub mod net;
pub mod rpc_utils;

pub mod events;
pub mod wallet;

// Social graph access
pub mod social;

// Client state
pub mod feed;
pub mod interactions;
pub mod session;

// Wallet panel extras
pub mod explorer;

#[cfg(feature = "api")]
pub mod api;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use events::{AppEvent, EventBus, ToastKind};
pub use feed::{FeedController, FeedState, LoadOutcome, PostView};
pub use interactions::{Action, Confirmation, InteractionCoordinator, InteractionError, Interactions};
pub use session::SessionStore;
pub use social::{GatewayError, NearSocialClient, SocialBackend, SocialGateway};
pub use types::{Cursor, Post, PostPage, Profile, Session, Tally};
pub use wallet::{Deposit, Wallet};
