//! Insights Chat
//!
//! A chat-style web front end that forwards each question to an external
//! answer service and renders the reply, replaying it word by word.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server, HTML pages plus a JSON/SSE API
//! - **Sessions**: In-memory transcripts with a one-pending-answer rule
//! - **Backend**: Configurable request/response adapters over reqwest
//! - **UI**: Server-rendered HTML with a small script for the typing replay
//!
//! # Modules
//!
//! - [`backend`]: Answer service trait, HTTP client, and response adapters
//! - [`config`]: CLI and layered configuration
//! - [`format`]: Markdown-subset to inline markup
//! - [`replay`]: Simulated streaming of finished answers
//! - [`server`]: Router and handlers
//! - [`session`]: Chat session and transcript management
//! - [`ui`]: Page rendering

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod backend;
pub mod config;
pub mod format;
pub mod replay;
pub mod server;
pub mod session;
pub mod ui;

use std::sync::Arc;

use backend::AnswerService;
use config::AppConfig;
use session::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live chat sessions.
    pub sessions: SessionStore,
    /// External answer service.
    pub answers: Arc<dyn AnswerService>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions.len())
            .field("config", &self.config)
            .finish()
    }
}
