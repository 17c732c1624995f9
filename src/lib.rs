//! Referral Link Bot
//!
//! Telegram bot that keeps a registry of tracked referral URLs and
//! auto-formats any message mentioning one: the message is edited into a
//! title line, an optional extracted referral code, and one inline button
//! per matched link. Admins manage the registry through a small command
//! surface.
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► Delivery Loop ──┬── Command Router ──► Registry ──► Store (JSON)
//!  (polling)     │             └── Detector ──► Annotator ──► edit_message
//!                └── Supervisor (bounded backoff reconnect)
//! Probes ──► Keep-alive HTTP (axum)
//! ```

pub mod annotator;
pub mod commands;
pub mod config;
pub mod detector;
pub mod health;
pub mod registry;
pub mod store;
pub mod supervisor;
pub mod telegram;

pub use annotator::{escape_html, render, Annotation};
pub use commands::{Command, CommandError, CommandKind};
pub use config::Config;
pub use detector::{detect, Detection};
pub use registry::{LinkEntry, LinkRegistry, RegistryError, DEFAULT_LABEL};
pub use store::{LinkStore, StoreError};
pub use supervisor::{RetryDecision, State, Supervisor};
