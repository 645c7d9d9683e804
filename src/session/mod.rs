//! Per-client session management.
//!
//! Sessions hold the transcript and the teach-mode flag for one client.
//! They are identified by UUID, kept purely in memory, and lost on process
//! restart; the only durable state in this application is the intent file.
//!
//! # Example
//!
//! ```rust
//! use teachbot::session::{SessionStore, TeachState};
//!
//! let store = SessionStore::new();
//! let session = store.create();
//! session.add_user_message("Hello!");
//!
//! assert_eq!(session.teach_state(), TeachState::Normal);
//! assert_eq!(session.messages().len(), 1);
//! ```

mod thread;

pub use thread::{ChatMessage, ChatRole, Session, SessionStore, TeachState};
