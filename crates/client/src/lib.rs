//! HTTP implementation of the volunteer hub [`Backend`].
//!
//! Every request is built from the configured API base URL and the
//! [`Resource`] path, carries the caller's [`Session`] as a bearer header,
//! and maps non-success statuses onto [`ClientError`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;
use volunteer_common::config::ApiConfig;
use volunteer_common::{ClientError, ClientResult, Config, Session};
use volunteer_core::{Backend, RawPage, Resource, ToggleAction};

/// Fields a failure body may carry a human-readable reason in.
const ERROR_MESSAGE_FIELDS: &[&str] = &["message", "error", "detail"];

/// `reqwest`-backed [`Backend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    user_agent: String,
}

impl HttpBackend {
    /// Create a backend for the API described by `config`.
    pub fn new(config: &ApiConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base: base_url(&config.base_url)?,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Create a backend from the full client configuration.
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        Self::new(&config.api)
    }

    /// Base URL every resource path is joined onto.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for a path relative to the API base.
    pub fn endpoint(&self, path: &str) -> ClientResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, url: Url, session: &Session) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json");
        match session.authorization() {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        session: &Session,
        body: Option<Value>,
    ) -> ClientResult<Response> {
        debug!(
            method = %method,
            url = %url,
            authenticated = session.is_authenticated(),
            "Sending request"
        );

        let mut builder = self.request(method.clone(), url.clone(), session);
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(method = %method, url = %url, status = %status, "Request rejected");
        Err(rejection(status, &body))
    }
}

fn base_url(raw: &str) -> ClientResult<Url> {
    let mut base = Url::parse(raw.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Map a non-success status and its body onto a [`ClientError`].
fn rejection(status: StatusCode, body: &str) -> ClientError {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return ClientError::Unauthorized;
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|body| error_message(&body))
        .unwrap_or_default();
    ClientError::rejected(status.as_u16(), message)
}

fn error_message(body: &Value) -> Option<String> {
    ERROR_MESSAGE_FIELDS.iter().find_map(|field| match body.get(*field)? {
        Value::String(message) if !message.trim().is_empty() => Some(message.trim().to_string()),
        nested @ Value::Object(_) => error_message(nested),
        _ => None,
    })
}

/// Parse a response body, treating an empty body as JSON `null`.
async fn read_json(response: Response) -> ClientResult<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list(
        &self,
        session: &Session,
        resource: &Resource,
        page: u32,
        limit: u32,
    ) -> ClientResult<RawPage> {
        let mut url = self.endpoint(&resource.path())?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());

        let response = self.send(Method::GET, url, session, None).await?;
        let body = read_json(response).await?;
        let page = RawPage::from_value(&body);
        debug!(resource = %resource, items = page.items.len(), "Fetched page");
        Ok(page)
    }

    async fn create(
        &self,
        session: &Session,
        resource: &Resource,
        body: Value,
    ) -> ClientResult<Value> {
        let url = self.endpoint(&resource.path())?;
        let response = self.send(Method::POST, url, session, Some(body)).await?;
        read_json(response).await
    }

    async fn update(
        &self,
        session: &Session,
        resource: &Resource,
        id: &str,
        patch: Value,
    ) -> ClientResult<Value> {
        let url = self.endpoint(&resource.item_path(id))?;
        let response = self.send(Method::PATCH, url, session, Some(patch)).await?;
        read_json(response).await
    }

    async fn delete(&self, session: &Session, resource: &Resource, id: &str) -> ClientResult<()> {
        let url = self.endpoint(&resource.item_path(id))?;
        self.send(Method::DELETE, url, session, None).await?;
        Ok(())
    }

    async fn toggle(
        &self,
        session: &Session,
        resource: &Resource,
        id: &str,
        action: ToggleAction,
    ) -> ClientResult<()> {
        let path = format!("{}/{}", resource.item_path(id), action.segment());
        let url = self.endpoint(&path)?;
        self.send(Method::POST, url, session, None).await?;
        Ok(())
    }
}
