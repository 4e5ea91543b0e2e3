//! Request limiting for protecting system capacity.
//!
//! This module provides the fixed-window rate limiter guarding the chat API
//! and the client-address extraction it keys on.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use dashmap::DashMap;

use crate::config::{LimitsConfig, RateLimitConfig};
use crate::errors::{Error, Result};

/// Container for all request limiters.
///
/// This struct holds all the individual limiters used by the application.
/// Add new limiters here as fields when implementing additional rate limiting.
#[derive(Debug, Clone)]
pub struct Limiters {
    /// Limiter for the chat proxy endpoint
    pub chat: Arc<RateLimiter>,
}

impl Limiters {
    /// Creates all limiters from configuration.
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            chat: Arc::new(RateLimiter::new(&config.chat)),
        }
    }
}

/// Fixed-window request counter per client address.
///
/// Each client gets `max_requests` per window; the window restarts once its
/// duration has elapsed since the first counted request. Exceeding the budget
/// fails with HTTP 429.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: std::time::Duration,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: config.max_requests,
            window: config.window,
        }
    }

    /// Count one request for `client`, rejecting it if the budget is spent.
    pub fn check(&self, client: &str) -> Result<()> {
        let mut entry = self.windows.entry(client.to_string()).or_insert_with(|| Window {
            started: Instant::now(),
            count: 0,
        });

        if entry.started.elapsed() > self.window {
            entry.started = Instant::now();
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return Err(Error::RateLimited {
                message: "Too many API requests from this IP, please try again later.".to_string(),
            });
        }

        entry.count += 1;
        Ok(())
    }
}

/// The client address a request is attributed to for rate limiting.
///
/// Uses the first `X-Forwarded-For` entry when present (the deployment sits
/// behind a reverse proxy in production), falling back to the socket peer
/// address.
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts.headers.get("x-forwarded-for").and_then(|h| h.to_str().ok())
            && let Some(first) = forwarded.split(',').next()
        {
            let first = first.trim();
            if !first.is_empty() {
                return Ok(ClientAddr(first.to_string()));
            }
        }

        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ClientAddr(addr))
    }
}
