//! reqwest-backed conversation server client

use super::traits::ConversationApi;
use super::ApiError;
use crate::api::StartAnalysisRequest;
use crate::store::{AnalysisStatus, Message};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const UPDATES_PATH: &str = "/api/conversation-updates";
const START_PATH: &str = "/api/start-analysis";

pub struct HttpConversationApi {
    client: Client,
    base_url: String,
}

impl HttpConversationApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn clear(&self, conversation_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(UPDATES_PATH))
            .query(&[("conversationId", conversation_id)])
            .send()
            .await?;
        read_json::<Value>(response).await.map(|_| ())
    }

    async fn start(&self, request: &StartAnalysisRequest) -> Result<Value, ApiError> {
        let response = self
            .client
            .post(self.url(START_PATH))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        let response = self
            .client
            .get(self.url(UPDATES_PATH))
            .query(&[("conversationId", conversation_id)])
            .send()
            .await?;
        read_json(response).await
    }

    async fn check_analysis(&self, conversation_id: &str) -> Result<AnalysisStatus, ApiError> {
        let response = self
            .client
            .get(self.url(UPDATES_PATH))
            .query(&[("conversationId", conversation_id), ("checkAnalysis", "true")])
            .send()
            .await?;
        read_json(response).await
    }
}

/// Require a success status and a JSON content type, then decode
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.contains("application/json") {
        return Err(ApiError::UnexpectedContentType(content_type));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}
