//! Conversation analyzer: an in-memory conversation store with an HTTP
//! surface, and a client driver that runs analysis sessions against it.

pub mod api;
pub mod config;
pub mod driver;
pub mod mock;
pub mod store;
pub mod webhook;
