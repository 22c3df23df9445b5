//! Token-bucket gate in front of outbound requests.
//!
//! [`GovernorLimiter`] uses the `governor` crate (GCRA): a bucket of
//! `tokens_per_interval` that refills evenly across one [`IntervalUnit`].

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::{fmt, num::NonZeroU32, str::FromStr, time::Duration};

use crate::Error;

/// Tokens per interval when none is given.
pub const DEFAULT_TOKENS_PER_INTERVAL: u32 = 10;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Grants permission to proceed once `count` tokens are available.
#[async_trait]
pub trait TokenLimiter: Send + Sync + fmt::Debug {
    async fn request_tokens(&self, count: u32) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Second,
    #[default]
    Minute,
    Hour,
    Day,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Second => "second",
            IntervalUnit::Minute => "minute",
            IntervalUnit::Hour => "hour",
            IntervalUnit::Day => "day",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            IntervalUnit::Second => Duration::from_secs(1),
            IntervalUnit::Minute => Duration::from_secs(60),
            IntervalUnit::Hour => Duration::from_secs(60 * 60),
            IntervalUnit::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "second" | "sec" | "s" => Ok(IntervalUnit::Second),
            "minute" | "min" | "m" => Ok(IntervalUnit::Minute),
            "hour" | "hr" | "h" => Ok(IntervalUnit::Hour),
            "day" | "d" => Ok(IntervalUnit::Day),
            _ => Err(Error::invalid(
                "interval",
                format!("unknown interval '{s}'. Supported: second, minute, hour, day."),
            )),
        }
    }
}

pub struct GovernorLimiter {
    tokens_per_interval: NonZeroU32,
    interval: IntervalUnit,
    limiter: DirectRateLimiter,
}

impl GovernorLimiter {
    pub fn new(tokens_per_interval: u32, interval: IntervalUnit) -> Result<Self, Error> {
        let burst = NonZeroU32::new(tokens_per_interval)
            .ok_or_else(|| Error::invalid("tokens", "must be at least 1"))?;

        let period = interval.duration() / burst.get();
        let quota = Quota::with_period(period)
            .ok_or_else(|| Error::invalid("tokens", "too many tokens for the interval"))?
            .allow_burst(burst);

        Ok(Self {
            tokens_per_interval: burst,
            interval,
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Limiter with 0 meaning the default token count.
    pub fn with_defaults(tokens_per_interval: u32, interval: IntervalUnit) -> Result<Self, Error> {
        let tokens = if tokens_per_interval == 0 {
            DEFAULT_TOKENS_PER_INTERVAL
        } else {
            tokens_per_interval
        };
        Self::new(tokens, interval)
    }

    pub fn tokens_per_interval(&self) -> u32 {
        self.tokens_per_interval.get()
    }

    pub fn interval(&self) -> IntervalUnit {
        self.interval
    }
}

impl fmt::Debug for GovernorLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GovernorLimiter")
            .field("tokens_per_interval", &self.tokens_per_interval)
            .field("interval", &self.interval)
            .finish()
    }
}

#[async_trait]
impl TokenLimiter for GovernorLimiter {
    async fn request_tokens(&self, count: u32) -> Result<()> {
        let n = NonZeroU32::new(count)
            .ok_or_else(|| anyhow!("must request at least one token"))?;

        self.limiter.until_n_ready(n).await.map_err(|_| {
            anyhow!(
                "requested {count} tokens but capacity is {} per {}",
                self.tokens_per_interval,
                self.interval
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn interval_names_parse() {
        assert_eq!(
            "minute".parse::<IntervalUnit>().unwrap(),
            IntervalUnit::Minute
        );
        assert_eq!("HR".parse::<IntervalUnit>().unwrap(), IntervalUnit::Hour);
        assert_eq!("sec".parse::<IntervalUnit>().unwrap(), IntervalUnit::Second);
        assert_eq!("day".parse::<IntervalUnit>().unwrap(), IntervalUnit::Day);
    }

    #[test]
    fn unknown_interval_error() {
        let err = "fortnight".parse::<IntervalUnit>().unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "interval", .. }));
    }

    #[test]
    fn zero_tokens_rejected_but_defaults_apply() {
        assert!(GovernorLimiter::new(0, IntervalUnit::Minute).is_err());

        let limiter = GovernorLimiter::with_defaults(0, IntervalUnit::Minute).unwrap();
        assert_eq!(limiter.tokens_per_interval(), DEFAULT_TOKENS_PER_INTERVAL);
        assert_eq!(limiter.interval(), IntervalUnit::Minute);
    }

    #[tokio::test]
    async fn burst_is_granted_then_next_token_waits() {
        let limiter = GovernorLimiter::new(2, IntervalUnit::Minute).unwrap();

        limiter.request_tokens(1).await.unwrap();
        limiter.request_tokens(1).await.unwrap();

        let third = timeout(Duration::from_millis(50), limiter.request_tokens(1)).await;
        assert!(
            third.is_err(),
            "third token should not be available within the minute"
        );
    }

    #[tokio::test]
    async fn more_than_capacity_fails() {
        let limiter = GovernorLimiter::new(1, IntervalUnit::Minute).unwrap();
        let err = limiter.request_tokens(5).await.unwrap_err();
        assert!(err.to_string().contains("capacity is 1 per minute"));
    }
}
