//! Ceph Manager Dashboard Client
//!
//! An authenticated REST client for the Ceph Manager "dashboard" API:
//!
//! - bearer-token sessions obtained from `POST /api/auth`, with one transparent
//!   re-login when a request answers 401
//! - endpoint selection at configure time (first manager that accepts the
//!   credentials wins and stays selected)
//! - the asynchronous task protocol: `202 Accepted` answers are followed by
//!   polling `GET /api/task` until the task finishes
//!
//! The handle is cheap to clone and safe to share between concurrent callers.

pub mod session;
pub mod task;

pub use session::{Credentials, Session};
pub use task::{TaskHandle, TaskInfo, TaskList};

use crate::context::OpContext;
use crate::error::{ConfigError, Error, Result};
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use session::LoginGate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Versioned media type the dashboard API negotiates on
pub const API_MEDIA_TYPE: &str = "application/vnd.ceph.api.v1.0+json";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the dashboard client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Manager endpoints in preference order, e.g. `https://mgr-a:8443`
    pub endpoints: Vec<String>,
    /// Dashboard user name
    pub username: Option<String>,
    /// Dashboard password
    pub password: Option<String>,
    /// Pre-issued bearer token, used as-is
    pub token: Option<String>,
    /// Per-request transport timeout
    pub request_timeout: Duration,
    /// Interval between `GET /api/task` polls
    pub task_poll_interval: Duration,
    /// Accept self-signed dashboard certificates
    pub insecure_skip_verify: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            username: None,
            password: None,
            token: None,
            request_timeout: Duration::from_secs(60),
            task_poll_interval: Duration::from_secs(1),
            insecure_skip_verify: false,
        }
    }
}

impl ClientConfig {
    /// Validate endpoints and pick the authentication mode
    fn validate(&self) -> std::result::Result<(Vec<Url>, AuthMode), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }

        let endpoints = self
            .endpoints
            .iter()
            .map(|raw| parse_endpoint(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let token = self.token.as_deref().filter(|t| !t.is_empty());
        let username = self.username.as_deref().filter(|u| !u.is_empty());
        let password = self.password.as_deref().filter(|p| !p.is_empty());

        let mode = match (token, username, password) {
            (Some(token), None, None) => AuthMode::Token(token.to_string()),
            (None, Some(username), Some(password)) => AuthMode::Password(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => return Err(ConfigError::MissingAuth),
        };

        Ok((endpoints, mode))
    }
}

fn parse_endpoint(raw: &str) -> std::result::Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }

    if url.path().trim_end_matches('/').ends_with("/api") {
        return Err(ConfigError::InvalidEndpoint {
            url: raw.to_string(),
            reason: "endpoint must not include the /api suffix".into(),
        });
    }

    Ok(url)
}

#[cfg_attr(test, derive(Debug))]
enum AuthMode {
    Token(String),
    Password(Credentials),
}

// =============================================================================
// Requests
// =============================================================================

/// A dashboard API call, relative to `<endpoint>/api/`
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Raw outcome of one HTTP exchange
struct RawResponse {
    status: StatusCode,
    body: String,
}

// =============================================================================
// Client
// =============================================================================

struct ClientInner {
    http: reqwest::Client,
    /// Current endpoint + token snapshot; swapped whole on re-login
    session: RwLock<Arc<Session>>,
    /// `None` when configured with a static token
    credentials: Option<Credentials>,
    login_gate: LoginGate,
    task_poll_interval: Duration,
}

/// Shared handle to the Ceph Manager dashboard API
#[derive(Clone)]
pub struct CephClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for CephClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CephClient")
            .field("endpoint", &self.endpoint().as_str())
            .field("token_auth", &self.inner.credentials.is_none())
            .finish()
    }
}

impl CephClient {
    /// Validate `config`, log in, and return a ready client.
    ///
    /// With a static token the first endpoint is used without a login round
    /// trip. With credentials every endpoint is tried in order and the first
    /// one answering `201` with a token is kept; the others are dropped.
    pub async fn connect(ctx: &OpContext, config: ClientConfig) -> Result<Self> {
        let (endpoints, mode) = config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        let (session, credentials) = match mode {
            AuthMode::Token(token) => {
                info!("Using static dashboard token against {}", endpoints[0]);
                (Session::new(endpoints[0].clone(), token), None)
            }
            AuthMode::Password(credentials) => {
                let session = login_any(ctx, &http, &endpoints, &credentials).await?;
                (session, Some(credentials))
            }
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                session: RwLock::new(Arc::new(session)),
                credentials,
                login_gate: LoginGate::default(),
                task_poll_interval: config.task_poll_interval,
            }),
        })
    }

    /// The endpoint selected at configure time
    pub fn endpoint(&self) -> Url {
        self.session().endpoint.clone()
    }

    /// Current session snapshot
    pub fn session(&self) -> Arc<Session> {
        self.inner.session.read().clone()
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, ctx: &OpContext, path: &str) -> Result<T> {
        self.call(ctx, ApiRequest::get(path)).await
    }

    pub async fn post<B, T>(&self, ctx: &OpContext, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(ctx, ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B, T>(&self, ctx: &OpContext, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call(ctx, ApiRequest::put(path).json(body)?).await
    }

    /// Issue a request whose response body carries nothing of interest
    pub async fn execute(&self, ctx: &OpContext, request: ApiRequest) -> Result<()> {
        let _: IgnoredAny = self.call(ctx, request).await?;
        Ok(())
    }

    /// Issue a request and decode its result.
    ///
    /// A `202 Accepted` answer is treated as a task handle and the call only
    /// returns once the task finishes, yielding its `ret_value`.
    pub async fn call<T: DeserializeOwned>(&self, ctx: &OpContext, request: ApiRequest) -> Result<T> {
        let response = self.exchange(ctx, &request).await?;

        if response.status == StatusCode::ACCEPTED {
            let handle: TaskHandle = decode(&response.body)?;
            debug!(
                "{} {} accepted as task {}",
                request.method, request.path, handle.name
            );
            let ret_value = self.wait_for_task(ctx, &handle).await?;
            return Ok(serde_json::from_value(ret_value)?);
        }

        decode(&response.body)
    }

    // =========================================================================
    // Request core
    // =========================================================================

    /// Dispatch a request, re-logging in at most once on 401, and map every
    /// non-2xx status to `Error::Api`.
    async fn exchange(&self, ctx: &OpContext, request: &ApiRequest) -> Result<RawResponse> {
        let mut relogged = false;

        loop {
            let session = self.session();
            let response = ctx.run(self.dispatch(&session, request)).await?;

            if response.status == StatusCode::UNAUTHORIZED && !relogged {
                if let Some(credentials) = &self.inner.credentials {
                    warn!(
                        "{} {} answered 401; refreshing dashboard session",
                        request.method, request.path
                    );
                    session::refresh(
                        ctx,
                        &self.inner.http,
                        &self.inner.session,
                        &self.inner.login_gate,
                        credentials,
                        &session,
                    )
                    .await?;
                    relogged = true;
                    continue;
                }
            }

            if response.status.is_success() {
                return Ok(response);
            }

            return Err(Error::Api {
                status: response.status.as_u16(),
                body: response.body,
            });
        }
    }

    async fn dispatch(&self, session: &Session, request: &ApiRequest) -> Result<RawResponse> {
        let url = api_url(&session.endpoint, &request.path)?;
        debug!("{} {}", request.method, url);

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), url)
            .header(ACCEPT, API_MEDIA_TYPE)
            .bearer_auth(&session.token);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Try each endpoint in order, keeping the first that accepts the credentials
async fn login_any(
    ctx: &OpContext,
    http: &reqwest::Client,
    endpoints: &[Url],
    credentials: &Credentials,
) -> Result<Session> {
    let mut last_error = String::from("no endpoints tried");

    for endpoint in endpoints {
        match ctx.run(session::login(http, endpoint, credentials)).await {
            Ok(token) => {
                info!("Logged in to Ceph dashboard at {}", endpoint);
                return Ok(Session::new(endpoint.clone(), token));
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!("Dashboard login at {} failed: {}", endpoint, e);
                last_error = e.to_string();
            }
        }
    }

    Err(ConfigError::Authentication(last_error).into())
}

/// Build `<endpoint>/api/<path>`
pub(crate) fn api_url(endpoint: &Url, path: &str) -> Result<Url> {
    let base = endpoint.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{}/api/{}", base, path)).map_err(|e| {
        Error::Config(ConfigError::InvalidEndpoint {
            url: format!("{}/api/{}", base, path),
            reason: e.to_string(),
        })
    })
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_str(body)?)
}

/// Percent-encode one path segment (entities, uids, option names)
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
