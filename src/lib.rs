//! Teachbot
//!
//! A minimal web-served chatbot that classifies message intent with a
//! TF-IDF scorer over a flat JSON intent file and, when nothing matches
//! confidently, asks the user to teach it the answer. Taught answers are
//! persisted and the classifier is retrained in place.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server with one chat page and a JSON chat API
//! - **Engine**: two-state machine per client (normal / awaiting-teach)
//! - **Classifier**: nearest-pattern TF-IDF cosine scoring, rebuilt on
//!   every teach event
//! - **Store**: JSON file of intents, rewritten wholesale on learning
//!
//! # Modules
//!
//! - [`calc`]: safe arithmetic evaluation for calculator-style messages
//! - [`classifier`]: TF-IDF intent scoring
//! - [`engine`]: chat orchestration and the teach flow
//! - [`intents`]: intent records and JSON persistence
//! - [`session`]: per-client transcript and teach state
//! - [`text`]: normalization and tokenization

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]

pub mod calc;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod intents;
pub mod server;
pub mod session;
pub mod text;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::ChatEngine;
use crate::session::SessionStore;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Intent store + classifier behind one lock.
    pub engine: Arc<ChatEngine>,
    /// Per-client session store.
    pub sessions: SessionStore,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
