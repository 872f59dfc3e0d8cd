/// Request rate limiting
use crate::{
    config::RateLimitSettings,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Two-tier limiter. Callers carrying a gateway identity get the wider
/// quota; anonymous traffic the narrower one with a fifth of the burst.
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    unauthenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        let auth_quota = Quota::per_second(
            NonZeroU32::new(settings.authenticated_rps).unwrap_or(NonZeroU32::new(100).unwrap()),
        )
        .allow_burst(NonZeroU32::new(settings.burst_size).unwrap_or(NonZeroU32::new(50).unwrap()));

        let unauth_quota = Quota::per_second(
            NonZeroU32::new(settings.unauthenticated_rps).unwrap_or(NonZeroU32::new(20).unwrap()),
        )
        .allow_burst(
            NonZeroU32::new(settings.burst_size / 5).unwrap_or(NonZeroU32::new(10).unwrap()),
        );

        Self {
            enabled: settings.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
        }
    }

    pub fn check_authenticated(&self) -> ApiResult<()> {
        self.check(&self.authenticated)
    }

    pub fn check_unauthenticated(&self) -> ApiResult<()> {
        self.check(&self.unauthenticated)
    }

    fn check(
        &self,
        limiter: &GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>,
    ) -> ApiResult<()> {
        if !self.enabled {
            return Ok(());
        }
        limiter.check().map_err(|_| ApiError::RateLimitExceeded {
            retry_after: std::time::Duration::from_secs(1),
        })
    }
}

/// Middleware enforcing the tiered limits
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Tier by presence of the identity header. Webhook callbacks carry no
    // bearer and land in the anonymous tier.
    let has_auth_header = request.headers().get("authorization").is_some();

    if has_auth_header {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_unauthenticated()?;
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(authenticated_rps: u32, unauthenticated_rps: u32, burst_size: u32) -> RateLimitSettings {
        RateLimitSettings {
            enabled: true,
            authenticated_rps,
            unauthenticated_rps,
            burst_size,
        }
    }

    #[test]
    fn first_requests_pass_both_tiers() {
        let limiter = RateLimiter::new(&settings(100, 20, 50));
        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
    }

    #[test]
    fn burst_limit_trips_after_the_allowance() {
        let limiter = RateLimiter::new(&settings(10, 5, 5));

        for _ in 0..5 {
            assert!(limiter.check_authenticated().is_ok());
        }
        assert!(limiter.check_authenticated().is_err());
    }

    #[test]
    fn unauthenticated_burst_is_a_fifth_of_the_configured_size() {
        let limiter = RateLimiter::new(&settings(100, 100, 25));

        for _ in 0..5 {
            assert!(limiter.check_unauthenticated().is_ok());
        }
        assert!(limiter.check_unauthenticated().is_err());
    }

    #[test]
    fn disabled_limiter_never_trips() {
        let mut s = settings(1, 1, 1);
        s.enabled = false;
        let limiter = RateLimiter::new(&s);

        for _ in 0..100 {
            assert!(limiter.check_authenticated().is_ok());
            assert!(limiter.check_unauthenticated().is_ok());
        }
    }
}
