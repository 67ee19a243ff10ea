//! Dashboard sessions: login and guarded re-login
//!
//! The session (selected endpoint + bearer token) is an immutable snapshot
//! swapped under a short write lock. Re-login is serialized through a tokio
//! mutex so concurrent 401s collapse into a single `POST /api/auth`; callers
//! that queued behind an attempt share its outcome.

use crate::context::OpContext;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{api_url, API_MEDIA_TYPE};

/// Username/password pair cached for re-login
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated endpoint
#[derive(Clone)]
pub struct Session {
    /// Manager endpoint, sticky for the life of the client
    pub endpoint: Url,
    /// Bearer token
    pub token: String,
    /// Bumped on every successful re-login
    pub generation: u64,
}

impl Session {
    pub fn new(endpoint: Url, token: String) -> Self {
        Self {
            endpoint,
            token,
            generation: 0,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint.as_str())
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// `POST /api/auth`; succeeds only on `201 Created` with a non-empty token
pub async fn login(
    http: &reqwest::Client,
    endpoint: &Url,
    credentials: &Credentials,
) -> Result<String> {
    let url = api_url(endpoint, "auth")?;
    let response = http
        .post(url)
        .header(ACCEPT, API_MEDIA_TYPE)
        .json(credentials)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if status != StatusCode::CREATED {
        return Err(Error::Authentication {
            endpoint: endpoint.to_string(),
            reason: format!("HTTP {}: {}", status.as_u16(), body.trim()),
        });
    }

    let reply: LoginResponse = serde_json::from_str(&body)?;
    if reply.token.is_empty() {
        return Err(Error::Authentication {
            endpoint: endpoint.to_string(),
            reason: "login response carried an empty token".into(),
        });
    }

    Ok(reply.token)
}

// =============================================================================
// Re-login gate
// =============================================================================

/// Outcome of the most recent re-login attempt
#[derive(Default)]
struct LastAttempt {
    failure: Option<String>,
}

/// Serializes re-login attempts
#[derive(Default)]
pub(crate) struct LoginGate {
    lock: Mutex<LastAttempt>,
    /// Number of finished attempts; readable without the lock
    completed: AtomicU64,
}

/// Replace the session that answered 401 with a fresh one.
///
/// If another caller already refreshed past `stale`, its session is reused.
/// If an attempt finished while this caller was queued and failed, that
/// failure is returned instead of trying again.
pub(crate) async fn refresh(
    ctx: &OpContext,
    http: &reqwest::Client,
    current: &RwLock<Arc<Session>>,
    gate: &LoginGate,
    credentials: &Credentials,
    stale: &Session,
) -> Result<Arc<Session>> {
    let seen = gate.completed.load(Ordering::Acquire);
    let mut last = ctx.run(async { Ok(gate.lock.lock().await) }).await?;

    let session = current.read().clone();
    if session.generation != stale.generation {
        return Ok(session);
    }

    if gate.completed.load(Ordering::Acquire) != seen {
        if let Some(reason) = &last.failure {
            return Err(Error::Authentication {
                endpoint: stale.endpoint.to_string(),
                reason: reason.clone(),
            });
        }
    }

    let outcome = ctx.run(login(http, &stale.endpoint, credentials)).await;
    if matches!(outcome, Err(ref e) if e.is_cancelled()) {
        // Nothing was learned about the credentials; leave the gate as is.
        return outcome.map(|_| session);
    }
    gate.completed.fetch_add(1, Ordering::AcqRel);

    match outcome {
        Ok(token) => {
            let next = Arc::new(Session {
                endpoint: stale.endpoint.clone(),
                token,
                generation: stale.generation + 1,
            });
            *current.write() = next.clone();
            last.failure = None;
            info!(
                "Dashboard session at {} refreshed (generation {})",
                next.endpoint, next.generation
            );
            Ok(next)
        }
        Err(e) => {
            warn!("Dashboard re-login at {} failed: {}", stale.endpoint, e);
            let reason = match e {
                Error::Authentication { reason, .. } => reason,
                other => other.to_string(),
            };
            last.failure = Some(reason.clone());
            Err(Error::Authentication {
                endpoint: stale.endpoint.to_string(),
                reason,
            })
        }
    }
}
