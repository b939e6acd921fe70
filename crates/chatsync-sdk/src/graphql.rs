use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use chatsync_types::{ChatMessage, ChatRoom};

use crate::api::MessageApi;
use crate::error::ApiError;

const SEND_MESSAGE: &str = "mutation sendMessage($input: SendMessageInput!) {
  sendMessage(input: $input) {
    key
    createdAt
    message { text }
    publisherId
    sender { uid displayName photoURL }
    referer
    replyMessage
  }
}";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    message: String,
}

/// [`MessageApi`] over a GraphQL HTTP endpoint.
#[derive(Clone)]
pub struct GraphQlClient {
    http: Client,
    endpoint: String,
    token: Option<String>,
}

impl GraphQlClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            token: None,
        }
    }

    /// Authenticate every request with a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one operation and return its `data` object.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("GraphQL request to {} failed with status {}", self.endpoint, status);
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        parse_response(&body)
    }
}

impl fmt::Debug for GraphQlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQlClient")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl MessageApi for GraphQlClient {
    async fn send_message(
        &self,
        room: &ChatRoom,
        message: &ChatMessage,
    ) -> Result<ChatMessage, ApiError> {
        let variables = json!({
            "input": {
                "chatId": room.id,
                "message": message,
            }
        });

        let mut data = self.execute(SEND_MESSAGE, variables).await?;
        let sent = data
            .get_mut("sendMessage")
            .map(Value::take)
            .filter(|v| !v.is_null())
            .ok_or(ApiError::MissingData)?;

        let sent = decode_sent(sent, message)?;
        debug!("Sent message {:?} to chat room {}", sent.key, room.id);
        Ok(sent)
    }
}

fn parse_response(body: &str) -> Result<Value, ApiError> {
    let response: Response = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        return Err(ApiError::GraphQl(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    response
        .data
        .filter(|data| !data.is_null())
        .ok_or(ApiError::MissingData)
}

/// Some deployments answer with the new message's key only.
fn decode_sent(sent: Value, envelope: &ChatMessage) -> Result<ChatMessage, ApiError> {
    match sent {
        Value::String(key) => Ok(ChatMessage {
            key: Some(key),
            ..envelope.clone()
        }),
        other => Ok(serde_json::from_value(other)?),
    }
}
