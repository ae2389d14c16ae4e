//! Per-client-IP sliding-window rate limiting.

use curio_config::RateLimitsConfig;
use log::warn;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

/// Endpoint classes with independent quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    /// Session creation; moderate, prevents session flooding.
    CreateSession,
    /// Chat messages; strict, each one triggers an agent turn.
    SendMessage,
    /// Stream connections; each one holds server resources.
    Stream,
    /// Direct function endpoints.
    FunctionCall,
}

impl LimitScope {
    fn as_str(&self) -> &'static str {
        match self {
            LimitScope::CreateSession => "create_session",
            LimitScope::SendMessage => "send_message",
            LimitScope::Stream => "stream",
            LimitScope::FunctionCall => "function_call",
        }
    }
}

/// Sliding-window limiter keyed by endpoint class and client IP.
pub struct RateLimiter {
    enabled: bool,
    window: Duration,
    quotas: HashMap<LimitScope, u32>,
    hits: Mutex<HashMap<(LimitScope, IpAddr), VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Build a limiter with one-minute windows from config quotas.
    pub fn new(config: &RateLimitsConfig) -> Self {
        Self::with_window(config, Duration::from_secs(60))
    }

    /// Build a limiter with a custom window length.
    pub fn with_window(config: &RateLimitsConfig, window: Duration) -> Self {
        let quotas = HashMap::from([
            (LimitScope::CreateSession, config.create_session_per_minute),
            (LimitScope::SendMessage, config.send_message_per_minute),
            (LimitScope::Stream, config.stream_per_minute),
            (LimitScope::FunctionCall, config.function_calls_per_minute),
        ]);
        Self {
            enabled: config.enabled,
            window,
            quotas,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit and decide whether it is within quota.
    pub fn allow(&self, scope: LimitScope, ip: Option<IpAddr>) -> bool {
        if !self.enabled {
            return true;
        }
        let ip = ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let quota = self.quotas.get(&scope).copied().unwrap_or(u32::MAX);
        let now = Instant::now();
        let mut hits = self.hits.lock();
        let window = hits.entry((scope, ip)).or_default();
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }
        if window.len() as u32 >= quota {
            warn!(
                "rate limit exceeded (scope={}, ip={}, quota={})",
                scope.as_str(),
                ip,
                quota
            );
            return false;
        }
        window.push_back(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(limit: u32) -> RateLimitsConfig {
        RateLimitsConfig {
            enabled: true,
            create_session_per_minute: limit,
            send_message_per_minute: limit,
            stream_per_minute: limit,
            function_calls_per_minute: limit,
        }
    }

    #[test]
    fn quotas_are_enforced_per_scope_and_ip() {
        let limiter = RateLimiter::new(&config(2));
        let ip_a = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        let ip_b = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));

        assert_eq!(limiter.allow(LimitScope::SendMessage, ip_a), true);
        assert_eq!(limiter.allow(LimitScope::SendMessage, ip_a), true);
        assert_eq!(limiter.allow(LimitScope::SendMessage, ip_a), false);
        // Other IPs and scopes are unaffected.
        assert_eq!(limiter.allow(LimitScope::SendMessage, ip_b), true);
        assert_eq!(limiter.allow(LimitScope::Stream, ip_a), true);
    }

    #[test]
    fn window_slides_instead_of_resetting() {
        let limiter = RateLimiter::with_window(&config(1), Duration::from_millis(20));
        let ip = Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(limiter.allow(LimitScope::Stream, ip), true);
        assert_eq!(limiter.allow(LimitScope::Stream, ip), false);
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(limiter.allow(LimitScope::Stream, ip), true);
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(&RateLimitsConfig {
            enabled: false,
            ..config(0)
        });
        assert_eq!(limiter.allow(LimitScope::CreateSession, None), true);
    }
}
