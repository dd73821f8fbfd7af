//! Conversation data model
//!
//! Plain data types shared between the caller and the session: roles,
//! turns, and the append-only conversation that owns them. Persistence
//! is a caller concern; everything here is serde-serializable.

pub mod types;

pub use types::{Conversation, Message, Role};
