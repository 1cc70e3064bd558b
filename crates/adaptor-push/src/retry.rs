//! Retry policies
//!
//! A policy is a pure decision: given what failed and how many attempts the
//! current unit of work has used, either wait and try again or give up. The
//! caller owns the sleeping so it can be cut short by cancellation.

use adaptor_core::RetrySettings;
use adaptor_feed::TransmitError;
use rand::Rng;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::repository::RepositoryError;

/// What kind of operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Connect,
    Write,
    ReadReply,
    /// The appliance answered with something other than `Success`
    Rejected,
    /// The repository failed while enumerating documents
    Listing,
}

impl FailureClass {
    pub fn is_transient(&self) -> bool {
        !matches!(self, FailureClass::Rejected)
    }
}

impl From<&TransmitError> for FailureClass {
    fn from(error: &TransmitError) -> Self {
        match error {
            TransmitError::FailedToConnect(_) => FailureClass::Connect,
            TransmitError::FailedWriting(_) => FailureClass::Write,
            TransmitError::FailedReadingReply(_) => FailureClass::ReadReply,
            TransmitError::Rejected(_) => FailureClass::Rejected,
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureClass::Connect => "connect",
            FailureClass::Write => "write",
            FailureClass::ReadReply => "read_reply",
            FailureClass::Rejected => "rejected",
            FailureClass::Listing => "listing",
        };
        f.write_str(name)
    }
}

/// A failed attempt as seen by a [`RetryPolicy`]
#[derive(Debug, Clone, Copy)]
pub struct Failure<'a> {
    pub class: FailureClass,
    pub error: &'a (dyn StdError + Send + Sync + 'static),
}

impl<'a> Failure<'a> {
    pub fn transmission(error: &'a TransmitError) -> Self {
        Self {
            class: FailureClass::from(error),
            error,
        }
    }

    pub fn listing(error: &'a RepositoryError) -> Self {
        Self {
            class: FailureClass::Listing,
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { after: Duration },
    GiveUp,
}

/// Decides whether a failed attempt is tried again
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// `attempt` is 1-based and counts attempts of the current unit of work,
    /// including the one that just failed.
    fn on_failure(&self, failure: &Failure<'_>, attempt: u32) -> RetryDecision;
}

/// Exponential backoff with an attempt budget
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
    /// Treat appliance rejections as transient
    pub retry_rejections: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: false,
            retry_rejections: false,
        }
    }
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Same delay between every attempt
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: false,
            retry_rejections: false,
        }
    }

    pub fn for_feeds(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.feed_max_attempts,
            initial_delay: settings.initial_delay(),
            max_delay: settings.max_delay(),
            retry_rejections: settings.retry_rejections,
            ..Default::default()
        }
    }

    pub fn for_listing(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.listing_max_attempts,
            initial_delay: settings.initial_delay(),
            max_delay: settings.max_delay(),
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_rejections(mut self, retry: bool) -> Self {
        self.retry_rejections = retry;
        self
    }

    /// Delay after the `attempt`-th failure
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let delay = if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            (capped * factor).min(self.max_delay.as_millis() as f64)
        } else {
            capped
        };

        Duration::from_millis(delay as u64)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn on_failure(&self, failure: &Failure<'_>, attempt: u32) -> RetryDecision {
        if failure.class == FailureClass::Rejected && !self.retry_rejections {
            return RetryDecision::GiveUp;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            after: self.delay_for_attempt(attempt),
        }
    }
}

/// Gives up on the first failure
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn on_failure(&self, _failure: &Failure<'_>, _attempt: u32) -> RetryDecision {
        RetryDecision::GiveUp
    }
}
