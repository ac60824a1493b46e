use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::router::ApiError;
use crate::cache::{Clock, SystemClock};
use crate::config::RateLimitConfig;

/// Endpoint families counted separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteGroup {
    Ml,
    RouteRisk,
}

/// Map size past which expired windows are swept on the next request.
const PRUNE_ABOVE: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// Fixed-window counter per client and route group.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clock: Arc<dyn Clock>,
    prune_above: usize,
    windows: Mutex<HashMap<(String, RouteGroup), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::seconds(config.window_secs as i64),
            max_requests: config.max_requests,
            clock: Arc::new(SystemClock),
            prune_above: PRUNE_ABOVE,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Counts one request. Once the window holds more than `max_requests`, returns the
    /// seconds left until it resets.
    ///
    /// Client keys come from a request header, so expired windows are dropped once the
    /// map grows past its threshold.
    pub fn check(&self, client: &str, group: RouteGroup) -> Result<(), u64> {
        let now = self.clock.now();
        let mut windows = self.windows.lock().expect("rate limit mutex poisoned");
        if windows.len() >= self.prune_above {
            let span = self.window;
            windows.retain(|_, window| now < window.started + span);
        }

        let window = windows
            .entry((client.to_string(), group))
            .or_insert(Window {
                started: now,
                count: 0,
            });

        if now >= window.started + self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        window.count += 1;
        if window.count > self.max_requests {
            let remaining = (window.started + self.window - now).num_seconds().max(1);
            return Err(remaining as u64);
        }
        Ok(())
    }
}

/// Middleware state: the shared limiter and the group being guarded.
#[derive(Clone)]
pub struct RateGate {
    pub limiter: Arc<RateLimiter>,
    pub group: RouteGroup,
}

/// First `x-forwarded-for` hop, or `anonymous`.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

pub async fn enforce(State(gate): State<RateGate>, request: Request, next: Next) -> Response {
    let client = client_key(request.headers());
    match gate.limiter.check(&client, gate.group) {
        Ok(()) => next.run(request).await,
        Err(retry_after_secs) => {
            warn!(%client, group = ?gate.group, "rate limit exceeded");
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
