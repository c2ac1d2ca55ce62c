//! Server-rendered chat page.
//!
//! # Structure
//!
//! - [`page`]: Document shell, header, input form and replay script
//! - [`transcript`]: Message bubbles for a transcript view

pub mod page;
pub mod transcript;

pub use page::{ChatPage, render_chat_page};
pub use transcript::render_transcript;
