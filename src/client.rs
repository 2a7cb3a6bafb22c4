use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::multipart::Multipart;
use crate::page::Page;
use crate::refresh::{Entry, RefreshCoordinator};
use crate::scope::{scoped_endpoint, ScopeProvider};
use crate::token::{RefreshRequest, RefreshResponse, TokenStore};

/// Endpoint the refresh protocol posts the refresh token to. A 401 from this
/// endpoint never triggers another refresh.
pub const REFRESH_ENDPOINT: &str = "/auth/token/refresh/";

const LOGIN_ENDPOINT: &str = "/auth/login/";

enum Payload {
    None,
    Json(Value),
    Form(Multipart),
}

/// Successful login response. The token pair has already been written to the
/// client's store by the time a caller sees this.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginSession {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub detail: Option<String>,
    /// Anything else the backend attaches to the login response, e.g.
    /// approval state and authorized locations.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Gateway through which every backend call passes.
///
/// Attaches bearer authentication from the injected [`TokenStore`], recovers
/// from expired access tokens with an at-most-one-concurrent-refresh protocol
/// (concurrent 401s queue behind the single in-flight refresh and replay once
/// it lands), aggregates cursor pagination, and rewrites scope-sensitive read
/// queries with the selected location from the injected [`ScopeProvider`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    scope: Arc<dyn ScopeProvider>,
    on_session_expired: Option<Arc<dyn Fn() + Send + Sync>>,
    refresh: RefreshCoordinator,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build a client over the given credential store and scope provider.
    ///
    /// `config.base_url` must be the full API prefix (origin plus `/api`).
    pub fn new(
        config: ClientConfig,
        tokens: Arc<dyn TokenStore>,
        scope: Arc<dyn ScopeProvider>,
    ) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ApiError::Config(format!("invalid header name '{key}': {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::Config(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            tokens,
            scope,
            on_session_expired: None,
            refresh: RefreshCoordinator::new(),
        })
    }

    /// Register the hook invoked when the refresh protocol irrecoverably
    /// fails. The host uses it to route the user back to authentication; the
    /// credential store is already cleared when it fires.
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// GET a single resource. Scope-sensitive endpoints are rewritten with
    /// the selected location. `Ok(None)` means the server sent no body.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, ApiError> {
        let endpoint = scoped_endpoint(endpoint, self.scope.current_scope().as_ref());
        let value = self.request(&endpoint, Method::GET, Payload::None).await?;
        decode_body(&endpoint, value)
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = json_payload(endpoint, body)?;
        let value = self.request(endpoint, Method::POST, payload).await?;
        decode_body(endpoint, value)
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = json_payload(endpoint, body)?;
        let value = self.request(endpoint, Method::PUT, payload).await?;
        decode_body(endpoint, value)
    }

    pub async fn patch<T, B>(&self, endpoint: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = json_payload(endpoint, body)?;
        let value = self.request(endpoint, Method::PATCH, payload).await?;
        decode_body(endpoint, value)
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, ApiError> {
        let value = self.request(endpoint, Method::DELETE, Payload::None).await?;
        decode_body(endpoint, value)
    }

    /// POST a multipart payload (file uploads). The transport supplies the
    /// multipart boundary; no content type is set by hand.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: Multipart,
    ) -> Result<Option<T>, ApiError> {
        let value = self.request(endpoint, Method::POST, Payload::Form(form)).await?;
        decode_body(endpoint, value)
    }

    pub async fn put_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: Multipart,
    ) -> Result<Option<T>, ApiError> {
        let value = self.request(endpoint, Method::PUT, Payload::Form(form)).await?;
        decode_body(endpoint, value)
    }

    pub async fn patch_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: Multipart,
    ) -> Result<Option<T>, ApiError> {
        let value = self.request(endpoint, Method::PATCH, Payload::Form(form)).await?;
        decode_body(endpoint, value)
    }

    /// GET every page of a paginated listing and return the concatenated
    /// results in page order.
    ///
    /// The walk follows the server's `next` cursor until it is null. A cursor
    /// identical to the one just fetched would loop forever against a
    /// misbehaving backend, so the walk logs a warning and stops there
    /// instead. Scope rewriting applies to the initial endpoint only; the
    /// backend echoes query parameters into `next`.
    pub async fn get_all<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, ApiError> {
        let mut cursor = scoped_endpoint(endpoint, self.scope.current_scope().as_ref());
        let mut all = Vec::new();
        loop {
            let value = self
                .request(&cursor, Method::GET, Payload::None)
                .await?
                .ok_or_else(|| ApiError::Decode {
                    endpoint: cursor.clone(),
                    detail: "empty body where a paginated envelope was expected".into(),
                })?;
            let page: Page<T> = serde_json::from_value(value).map_err(|e| ApiError::Decode {
                endpoint: cursor.clone(),
                detail: e.to_string(),
            })?;
            all.extend(page.results);

            let Some(next) = page.next else {
                return Ok(all);
            };
            let next = relativize(&self.base_url, &next);
            if next == cursor {
                warn!(cursor = %cursor, "pagination cursor repeated itself, stopping walk");
                return Ok(all);
            }
            cursor = next;
        }
    }

    /// Authenticate and store the issued token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginSession, ApiError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let value = self
            .request(LOGIN_ENDPOINT, Method::POST, Payload::Json(body))
            .await?
            .ok_or_else(|| ApiError::Decode {
                endpoint: LOGIN_ENDPOINT.into(),
                detail: "empty login response".into(),
            })?;
        let session: LoginSession =
            serde_json::from_value(value).map_err(|e| ApiError::Decode {
                endpoint: LOGIN_ENDPOINT.into(),
                detail: e.to_string(),
            })?;

        if let (Some(access), Some(refresh)) = (session.access.clone(), session.refresh.clone()) {
            if !access.is_empty() && !refresh.is_empty() {
                self.tokens.set_tokens(access, refresh);
                return Ok(session);
            }
        }
        let detail = session
            .detail
            .clone()
            .unwrap_or_else(|| "login response carried no token pair".to_string());
        Err(ApiError::Decode {
            endpoint: LOGIN_ENDPOINT.into(),
            detail,
        })
    }

    /// Drop the stored token pair. Purely client-side.
    pub fn logout(&self) {
        self.tokens.clear();
    }

    /// Issue one request, refreshing and replaying once on an expired token.
    async fn request(
        &self,
        endpoint: &str,
        method: Method,
        payload: Payload,
    ) -> Result<Option<Value>, ApiError> {
        let mut is_retry = false;
        loop {
            let response = self.send_once(endpoint, &method, &payload).await?;
            let status = response.status();
            if status.is_success() {
                return read_success_body(endpoint, response).await;
            }

            let (message, data) = read_error_body(response).await;
            if status == StatusCode::UNAUTHORIZED && !is_retry && endpoint != REFRESH_ENDPOINT {
                self.resolve_expired_token().await?;
                // Exactly one replay with the new token; a second 401 takes
                // the plain error path above.
                is_retry = true;
                continue;
            }
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
                data,
            });
        }
    }

    async fn send_once(
        &self,
        endpoint: &str,
        method: &Method,
        payload: &Payload,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.http.request(method.clone(), url);
        if let Some(access) = self.tokens.access_token() {
            request = request.bearer_auth(access);
        }
        request = match payload {
            Payload::None => request,
            Payload::Json(body) => request.json(body),
            Payload::Form(parts) => request.multipart(parts.to_form()),
        };
        request.send().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    /// Funnel an expired-token 401 through the coordinator. `Ok(())` means a
    /// fresh access token is in the store and the caller should replay.
    async fn resolve_expired_token(&self) -> Result<(), ApiError> {
        match self.refresh.begin() {
            Entry::Waiter(cell) => match cell.await {
                Ok(outcome) => outcome,
                // Owner went away without settling the queue.
                Err(_) => Err(ApiError::SessionExpired(
                    "refresh cycle aborted before completion".into(),
                )),
            },
            Entry::Owner => match self.run_refresh().await {
                Ok(()) => {
                    self.refresh.finish_ok();
                    Ok(())
                }
                Err(err) => {
                    self.tokens.clear();
                    let message = match &err {
                        ApiError::SessionExpired(message) => message.clone(),
                        other => other.to_string(),
                    };
                    self.refresh.finish_err(&message);
                    if let Some(hook) = &self.on_session_expired {
                        hook();
                    }
                    Err(err)
                }
            },
        }
    }

    async fn run_refresh(&self) -> Result<(), ApiError> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            return Err(ApiError::SessionExpired("no refresh token available".into()));
        };

        debug!("access token rejected, refreshing session");
        let url = format!("{}{}", self.base_url, REFRESH_ENDPOINT);
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await
            .map_err(|e| ApiError::SessionExpired(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let (message, _) = read_error_body(response).await;
            warn!(status = status.as_u16(), "token refresh rejected");
            return Err(ApiError::SessionExpired(message));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ApiError::SessionExpired(format!("malformed refresh response: {e}")))?;
        match body.access {
            Some(access) if !access.is_empty() => {
                self.tokens.set_access_token(access);
                debug!("session refreshed");
                Ok(())
            }
            _ => Err(ApiError::SessionExpired(
                "refresh response carried no access token".into(),
            )),
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| ApiError::Config(format!("invalid base URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ApiError::Config(format!(
                "unsupported URL scheme '{scheme}' in '{raw}'"
            )));
        }
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Reduce a server-issued cursor to the base-relative form the executor
/// expects. Cursors pointing elsewhere pass through untouched.
fn relativize(base_url: &str, next: &str) -> String {
    match next.strip_prefix(base_url) {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => next.to_string(),
    }
}

fn json_payload<B: Serialize + ?Sized>(endpoint: &str, body: &B) -> Result<Payload, ApiError> {
    let value = serde_json::to_value(body).map_err(|e| ApiError::Body {
        endpoint: endpoint.to_string(),
        detail: e.to_string(),
    })?;
    Ok(Payload::Json(value))
}

fn decode_body<T: DeserializeOwned>(
    endpoint: &str,
    value: Option<Value>,
) -> Result<Option<T>, ApiError> {
    match value {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ApiError::Decode {
                endpoint: endpoint.to_string(),
                detail: e.to_string(),
            }),
    }
}

async fn read_success_body(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<Option<Value>, ApiError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    let text = response.text().await.map_err(|e| ApiError::Transport {
        endpoint: endpoint.to_string(),
        source: e,
    })?;
    if text.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        })
}

/// Best-effort extraction of `(message, parsed body)` from an error response.
/// The message prefers the body's `detail` field, then the status line.
async fn read_error_body(response: reqwest::Response) -> (String, Option<Value>) {
    let status = response.status();
    let fallback = format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("unknown server error")
    );
    let text = response.text().await.unwrap_or_default();
    if text.is_empty() {
        return (fallback, None);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(data) => {
            let message = data
                .get("detail")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(fallback);
            (message, Some(data))
        }
        Err(_) => (fallback, None),
    }
}
