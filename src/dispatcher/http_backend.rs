use super::{ActionReply, DispatchError, WorkflowBackend};
use crate::models::ApiResponse;
use crate::workflow::{ActionDescriptor, PostStatus, WorkflowAction};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct StatusData {
    status: PostStatus,
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DispatchError::InvalidResponse(e.to_string())
        } else {
            DispatchError::Network(e.to_string())
        }
    }
}

/// Talks to the workflow API over HTTP. The session cookie from `login` is
/// kept in the client's cookie store and sent with every later request.
#[derive(Clone, Debug)]
pub struct HttpWorkflowBackend {
    http: Client,
    base_url: String,
}

impl HttpWorkflowBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DispatchError> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("postflow-workflow-cli/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), DispatchError> {
        log::debug!("Logging in to {} as '{}'", self.base_url, username);
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginBody { username, password })
            .send()
            .await?;
        read_envelope::<serde_json::Value>(response).await.map(|_| ())
    }

    pub async fn fetch_actions(
        &self,
        post_id: &str,
    ) -> Result<Vec<ActionDescriptor>, DispatchError> {
        let response = self
            .http
            .get(self.url(&format!("/api/posts/{}/actions", post_id)))
            .send()
            .await?;
        let envelope = read_envelope::<Vec<ActionDescriptor>>(response).await?;
        Ok(envelope.data.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl WorkflowBackend for HttpWorkflowBackend {
    async fn perform(
        &self,
        post_id: &str,
        action: WorkflowAction,
    ) -> Result<ActionReply, DispatchError> {
        let response = self
            .http
            .post(self.url(&format!("/api/posts/{}/{}", post_id, action.key())))
            .send()
            .await?;
        let envelope = read_envelope::<StatusData>(response).await?;
        reply_from_envelope(envelope, action)
    }
}

fn reply_from_envelope(
    envelope: ApiResponse<StatusData>,
    action: WorkflowAction,
) -> Result<ActionReply, DispatchError> {
    let status = envelope
        .data
        .map(|data| data.status)
        .ok_or_else(|| DispatchError::InvalidResponse("missing status in reply".to_string()))?;
    Ok(ActionReply {
        message: envelope.message.unwrap_or_else(|| action.success_message().to_string()),
        status,
    })
}

/// Turns a non-2xx reply into `Rejected`, using the server's error text when present.
async fn read_envelope<T: DeserializeOwned>(
    response: Response,
) -> Result<ApiResponse<T>, DispatchError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.error)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        return Err(DispatchError::Rejected { status: status.as_u16(), message });
    }

    serde_json::from_str(&body).map_err(|e| DispatchError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &'static str) -> Response {
        Response::from(http::Response::builder().status(status).body(body).unwrap())
    }

    async fn perform_reply(status: u16, body: &'static str) -> Result<ActionReply, DispatchError> {
        let envelope = read_envelope::<StatusData>(response(status, body)).await?;
        reply_from_envelope(envelope, WorkflowAction::Archive)
    }

    #[actix_web::test]
    async fn test_rejection_carries_server_error_text() {
        let body = r#"{"success":false,"error":"Post is not in the required status."}"#;
        match perform_reply(409, body).await {
            Err(err @ DispatchError::Rejected { status: 409, .. }) => {
                assert!(err.is_conflict());
                assert_eq!(err.to_string(), "Post is not in the required status.");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_rejection_without_envelope_uses_reason_phrase() {
        match perform_reply(502, "<html>upstream down</html>").await {
            Err(DispatchError::Rejected { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected: {:?}", other),
        }
        match perform_reply(500, "").await {
            Err(DispatchError::Rejected { message, .. }) => {
                assert_eq!(message, "Internal Server Error")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_success_without_status_is_invalid() {
        let result = perform_reply(200, r#"{"success":true,"message":"Post archived."}"#).await;
        assert!(matches!(result, Err(DispatchError::InvalidResponse(_))));

        let result = perform_reply(200, "not json").await;
        assert!(matches!(result, Err(DispatchError::InvalidResponse(_))));
    }

    #[actix_web::test]
    async fn test_success_falls_back_to_local_message() {
        let reply = perform_reply(200, r#"{"success":true,"data":{"status":"ARCHIVED"}}"#)
            .await
            .unwrap();
        assert_eq!(reply.status, PostStatus::Archived);
        assert_eq!(reply.message, WorkflowAction::Archive.success_message());
    }

    #[actix_web::test]
    async fn test_unreachable_server_is_a_network_error() {
        let backend = HttpWorkflowBackend::new("http://127.0.0.1:1/").unwrap();
        assert_eq!(backend.url("/api"), "http://127.0.0.1:1/api");
        let result = backend.perform("id", WorkflowAction::Archive).await;
        assert!(matches!(result, Err(DispatchError::Network(_))));
    }
}
