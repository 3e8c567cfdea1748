use std::time::Duration;

use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::common::{
    Attachment, ChatMessage, ClientError, ClientResult, Conversation, Session, UserProfile,
};
use crate::sync::{ChatBackend, NewGroup, NewMessage, PendingFile};

use super::upload;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper over `reqwest::Client`. Cloning is cheap; each clone carries
/// the bearer token it was cloned with.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

/// Registration either signs the user in right away or asks them to verify
/// their email first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    SignedIn(Session),
    Pending(Option<String>),
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `path` followed by one percent-encoded segment taken verbatim from input.
    fn segment_url(&self, path: &str, segment: &str) -> ClientResult<Url> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|err| ClientError::Config(format!("API base URL: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("API base URL cannot take a path: {}", self.base_url)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.authorize(request).send().await?;
        decode(response).await
    }

    // ========== Auth ==========

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<Session> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        self.execute(request).await
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<RegisterOutcome> {
        let request = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": password }));
        let body: serde_json::Value = self.execute(request).await?;
        Ok(register_outcome(body))
    }

    pub async fn verify_email(&self, token: &str) -> ClientResult<Option<String>> {
        let request = self.http.get(self.segment_url("/auth/verify", token)?);
        let body: MessageBody = self.execute(request).await?;
        Ok(body.message)
    }

    // ========== Directory ==========

    pub async fn users(&self) -> ClientResult<Vec<UserProfile>> {
        self.execute(self.http.get(self.url("/users"))).await
    }

    pub async fn conversations(&self) -> ClientResult<Vec<Conversation>> {
        self.execute(self.http.get(self.url("/chat"))).await
    }

    /// Fetch or create the direct conversation with `user_id`.
    pub async fn access_chat(&self, user_id: &str) -> ClientResult<Conversation> {
        let request = self
            .http
            .post(self.url("/chat"))
            .json(&json!({ "userId": user_id }));
        self.execute(request).await
    }

    // ========== Groups ==========

    pub async fn create_group(&self, group: &NewGroup) -> ClientResult<Conversation> {
        log::info!(
            "Creating group `{}` with {} members",
            group.name(),
            group.members().len()
        );
        let request = self.http.post(self.url("/chat/group")).json(group);
        self.execute(request).await
    }

    pub async fn rename_group(&self, conversation_id: &str, name: &str) -> ClientResult<Conversation> {
        let request = self
            .http
            .put(self.url("/chat/rename"))
            .json(&json!({ "chatId": conversation_id, "chatName": name }));
        self.execute(request).await
    }

    pub async fn add_member(&self, conversation_id: &str, user_id: &str) -> ClientResult<Conversation> {
        let request = self
            .http
            .put(self.url("/chat/groupadd"))
            .json(&json!({ "chatId": conversation_id, "userId": user_id }));
        self.execute(request).await
    }

    pub async fn remove_member(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> ClientResult<Conversation> {
        let request = self
            .http
            .put(self.url("/chat/groupremove"))
            .json(&json!({ "chatId": conversation_id, "userId": user_id }));
        self.execute(request).await
    }

    // ========== Messages ==========

    pub async fn messages(&self, conversation_id: &str) -> ClientResult<Vec<ChatMessage>> {
        self.execute(self.http.get(self.segment_url("/message", conversation_id)?))
            .await
    }
}

impl ChatBackend for ApiClient {
    async fn upload(&self, files: &[PendingFile]) -> ClientResult<Vec<Attachment>> {
        let form = upload::build_form(files).await?;
        let request = self.http.post(self.url("/upload")).multipart(form);
        let stored: upload::UploadResponse = self.execute(request).await?;
        Ok(stored.into_attachments())
    }

    async fn post_message(&self, message: &NewMessage) -> ClientResult<ChatMessage> {
        let request = self.http.post(self.url("/message")).json(message);
        self.execute(request).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    log::debug!("API request failed with {status}: {body}");
    Err(ClientError::Api {
        status: Some(status.as_u16()),
        message: error_message(&body),
    })
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty())
}

fn register_outcome(body: serde_json::Value) -> RegisterOutcome {
    match serde_json::from_value::<Session>(body.clone()) {
        Ok(session) if !session.id.is_empty() && !session.token.is_empty() => {
            RegisterOutcome::SignedIn(session)
        }
        _ => RegisterOutcome::Pending(
            body.get("message")
                .and_then(|message| message.as_str())
                .map(str::to_string),
        ),
    }
}
