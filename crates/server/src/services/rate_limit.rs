//! Fixed-window request limits per route and client.
//!
//! Clients are keyed on the peer address. `X-Forwarded-For` is only consulted
//! when the limiter is built with `trust_forwarded_for`.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;

use crate::error::AppError;

pub const MINUTE: Duration = Duration::from_secs(60);
pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

const SWEEP_INTERVAL: Duration = MINUTE;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    period: Duration,
    count: u32,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.period
    }
}

struct Windows {
    entries: HashMap<(&'static str, String), Window>,
    last_sweep: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<Windows>>,
    trust_forwarded_for: bool,
    sweep_interval: Duration,
}

impl RateLimiter {
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self {
            windows: Arc::new(Mutex::new(Windows {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            trust_forwarded_for,
            sweep_interval: SWEEP_INTERVAL,
        }
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    /// Count one request from `client` against `route`. Returns `false` when
    /// the client already used `max` requests in the current window.
    pub async fn check(
        &self,
        route: &'static str,
        client: &str,
        max: u32,
        period: Duration,
    ) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if now.duration_since(windows.last_sweep) >= self.sweep_interval {
            windows.entries.retain(|_, window| !window.expired(now));
            windows.last_sweep = now;
        }

        let window = windows
            .entries
            .entry((route, client.to_string()))
            .or_insert(Window {
                started: now,
                period,
                count: 0,
            });

        if window.expired(now) {
            window.started = now;
            window.period = period;
            window.count = 0;
        }

        if window.count >= max {
            return false;
        }
        window.count += 1;
        true
    }

    /// Number of (route, client) windows currently held.
    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.entries.len()
    }

    pub fn quota(&self, route: &'static str, max: u32, period: Duration) -> Quota {
        Quota {
            limiter: self.clone(),
            route,
            max,
            period,
        }
    }

    fn client_key(&self, request: &Request) -> String {
        if self.trust_forwarded_for {
            if let Some(forwarded) = request
                .headers()
                .get("X-Forwarded-For")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.split(',').next())
                .map(str::trim)
                .filter(|h| !h.is_empty())
            {
                return forwarded.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// A limit bound to one route; the state of the `enforce` middleware.
#[derive(Clone)]
pub struct Quota {
    limiter: RateLimiter,
    route: &'static str,
    max: u32,
    period: Duration,
}

pub async fn enforce(
    State(quota): State<Quota>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = quota.limiter.client_key(&request);
    if !quota
        .limiter
        .check(quota.route, &client, quota.max, quota.period)
        .await
    {
        tracing::warn!(route = quota.route, client = %client, "rate limit exceeded");
        return Err(AppError::RateLimited(format!(
            "{} per {}s allowed on {}",
            quota.max,
            quota.period.as_secs(),
            quota.route
        )));
    }

    Ok(next.run(request).await)
}
