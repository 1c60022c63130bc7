//! HTTP API for the conversation analyzer

mod error;
mod handlers;
mod types;

pub use error::AppError;
pub use handlers::create_router;
pub use types::*;

use crate::store::ConversationStore;
use crate::webhook::WebhookForwarder;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub webhook: Arc<dyn WebhookForwarder>,
}

impl AppState {
    pub fn new(store: Arc<ConversationStore>, webhook: Arc<dyn WebhookForwarder>) -> Self {
        Self { store, webhook }
    }
}
