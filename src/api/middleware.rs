//! Request guards for the protected API routes.
//!
//! Three pieces run in front of the goal handlers: an optional bearer-key
//! check, a sliding-window throttle keyed by the connected peer, and the
//! [`CurrentUser`] extractor that reads the acting user from `X-User-Id`.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use thiserror::Error;

/// Header carrying the ID of the user a request acts on behalf of.
pub const USER_ID_HEADER: &str = "X-User-Id";

const API_KEY_VAR: &str = "JOURNAL_GOALS_API_KEY";
const CORS_ORIGINS_VAR: &str = "JOURNAL_GOALS_CORS_ORIGINS";
const RATE_LIMIT_VAR: &str = "JOURNAL_GOALS_RATE_LIMIT";

const DEFAULT_RATE_LIMIT: u32 = 100;
const RATE_WINDOW: Duration = Duration::from_secs(60);

// ============================================================
// Configuration
// ============================================================

/// Access settings for the protected routes. The default leaves every
/// guard off.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// Bearer key every protected request must present.
    pub api_key: Option<String>,
    /// Allowed CORS origins; `None` is permissive.
    pub cors_origins: Option<Vec<String>>,
    pub rate_limiter: Option<RateLimiter>,
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build the config from a variable lookup.
    ///
    /// Throttling is only switched on together with an API key. An
    /// unparsable `JOURNAL_GOALS_RATE_LIMIT` falls back to 100 per minute.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = var(API_KEY_VAR).filter(|key| !key.is_empty());

        let cors_origins = var(CORS_ORIGINS_VAR).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect()
        });

        let rate_limiter = api_key.as_ref().map(|_| {
            let limit = var(RATE_LIMIT_VAR)
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT);
            RateLimiter::new(limit, RATE_WINDOW)
        });

        Self {
            api_key,
            cors_origins,
            rate_limiter,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow `max_requests` per client per minute.
    pub fn with_rate_limit(mut self, max_requests: u32) -> Self {
        self.rate_limiter = Some(RateLimiter::new(max_requests, RATE_WINDOW));
        self
    }
}

// ============================================================
// Rate limiting
// ============================================================

/// Who a request is counted against.
///
/// Only the transport decides this. Proxy headers such as
/// `X-Forwarded-For` are client-controlled and never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKey {
    /// Address of the connected peer.
    Peer(IpAddr),
    /// Connection without peer information, such as an in-process caller.
    /// All of these share one window.
    Unknown,
}

impl ClientKey {
    pub fn of<B>(request: &Request<B>) -> Self {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self::Peer(addr.ip()))
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peer(ip) => write!(f, "{ip}"),
            Self::Unknown => f.write_str("unknown peer"),
        }
    }
}

/// Sliding-window request counter shared by every clone.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<Windows>>,
}

#[derive(Debug)]
struct Windows {
    hits: HashMap<ClientKey, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests as usize,
            window,
            state: Arc::new(Mutex::new(Windows {
                hits: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    /// Record a request from `client`. Returns false, without recording,
    /// once the client has used up its window.
    pub fn check(&self, client: ClientKey) -> bool {
        self.check_at(client, Instant::now())
    }

    /// Clients that currently hold at least one recorded request.
    pub fn tracked_clients(&self) -> usize {
        self.lock().hits.len()
    }

    fn check_at(&self, client: ClientKey, now: Instant) -> bool {
        let mut windows = self.lock();

        // Idle clients are dropped at most once per window
        if now.saturating_duration_since(windows.last_sweep) >= self.window {
            windows.sweep(now, self.window);
        }

        let hits = windows.hits.entry(client).or_default();
        expire(hits, now, self.window);
        if hits.len() >= self.max_requests {
            return false;
        }
        hits.push_back(now);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Windows> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Windows {
    fn sweep(&mut self, now: Instant, window: Duration) {
        self.hits.retain(|_, hits| {
            expire(hits, now, window);
            !hits.is_empty()
        });
        self.last_sweep = now;
    }
}

fn expire(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while hits
        .front()
        .is_some_and(|t| now.saturating_duration_since(*t) >= window)
    {
        hits.pop_front();
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let client = ClientKey::of(&request);
    if !limiter.check(client) {
        tracing::warn!(%client, "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }
    Ok(next.run(request).await)
}

// ============================================================
// Authentication
// ============================================================

#[derive(Debug, Error, PartialEq, Eq)]
enum AuthFailure {
    #[error("missing Authorization header")]
    Missing,
    #[error("Authorization header is not a bearer token")]
    NotBearer,
    #[error("bearer token does not match the API key")]
    WrongKey,
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), AuthFailure> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthFailure::Missing)?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthFailure::NotBearer)?;

    if token != expected {
        return Err(AuthFailure::WrongKey);
    }
    Ok(())
}

/// Reject requests without the configured bearer key. A config without a
/// key lets everything through.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(expected) = config.api_key.as_deref() {
        if let Err(failure) = authorize(request.headers(), expected) {
            tracing::warn!(%failure, path = request.uri().path(), "Unauthorized request");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }
    Ok(next.run(request).await)
}

// ============================================================
// Caller identity
// ============================================================

/// The user a request acts for, taken from the `X-User-Id` header.
///
/// Identity is established upstream; this service only requires the ID to
/// be a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

fn parse_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_user_id(&parts.headers).map(CurrentUser).ok_or_else(|| {
            let msg = format!("Missing or invalid {USER_ID_HEADER} header");
            tracing::warn!("{}", msg);
            (StatusCode::UNAUTHORIZED, msg)
        })
    }
}
