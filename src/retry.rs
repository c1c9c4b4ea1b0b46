use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use http::StatusCode;
use http::header::RETRY_AFTER;
use rand::Rng;
use thiserror::Error as ThisError;

use crate::error::{BoxError, Error, TransportErrorKind};
use crate::response::Response;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenScope(String);

impl TokenScope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct RetryToken {
    scope: TokenScope,
    attempt: u32,
}

impl RetryToken {
    pub fn new(scope: TokenScope) -> Self {
        Self { scope, attempt: 1 }
    }

    pub fn scope(&self) -> &TokenScope {
        &self.scope
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn increment_attempt(&mut self) {
        self.attempt += 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Throttling,
    NonRetryable,
}

impl RetryClass {
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable | Self::Throttling)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::Throttling => "throttling",
            Self::NonRetryable => "non_retryable",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ErrorInfo {
    pub class: RetryClass,
    pub retry_after: Option<Duration>,
}

impl ErrorInfo {
    pub fn new(class: RetryClass) -> Self {
        Self {
            class,
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDirective {
    RetryAfter(Duration),
    GiveUp,
}

pub trait RetryStrategy: Send + Sync {
    fn acquire_initial_token(&self, scope: &TokenScope) -> Result<RetryToken, BoxError>;

    fn refresh_for_retry(
        &self,
        token: &mut RetryToken,
        info: &ErrorInfo,
    ) -> Result<RetryDirective, BoxError>;

    fn record_success(&self, token: &mut RetryToken);
}

pub trait ClassifyError<E>: Send + Sync
where
    E: StdError + Send + Sync + 'static,
{
    fn classify(&self, error: &Error<E>, response: Option<&Response>) -> ErrorInfo;
}

#[derive(Debug, Default)]
pub struct DefaultErrorClassifier;

impl DefaultErrorClassifier {
    fn classify_status(status: StatusCode, response: &Response) -> ErrorInfo {
        let retry_after = parse_retry_after(response, SystemTime::now());
        let info = match status.as_u16() {
            429 => ErrorInfo::new(RetryClass::Throttling),
            500 | 502 | 503 | 504 => ErrorInfo::new(RetryClass::Retryable),
            _ => return ErrorInfo::new(RetryClass::NonRetryable),
        };
        match retry_after {
            Some(delay) => info.with_retry_after(delay),
            None => info,
        }
    }
}

impl<E> ClassifyError<E> for DefaultErrorClassifier
where
    E: StdError + Send + Sync + 'static,
{
    fn classify(&self, error: &Error<E>, response: Option<&Response>) -> ErrorInfo {
        match error {
            Error::Transport { kind, .. } => match kind {
                TransportErrorKind::Dns
                | TransportErrorKind::Connect
                | TransportErrorKind::Read
                | TransportErrorKind::Timeout => ErrorInfo::new(RetryClass::Retryable),
                TransportErrorKind::Tls | TransportErrorKind::Other => {
                    ErrorInfo::new(RetryClass::NonRetryable)
                }
            },
            Error::Operation { .. } | Error::Deserialization { .. } => match response {
                Some(response) => Self::classify_status(response.status(), response),
                None => ErrorInfo::new(RetryClass::NonRetryable),
            },
            _ => ErrorInfo::new(RetryClass::NonRetryable),
        }
    }
}

fn parse_retry_after(response: &Response, now: SystemTime) -> Option<Duration> {
    let value = response.headers().get(RETRY_AFTER)?;
    let raw_value = value.to_str().ok()?.trim();
    if let Ok(seconds) = raw_value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = httpdate::parse_http_date(raw_value).ok()?;
    match date.duration_since(now) {
        Ok(duration) => Some(duration),
        Err(_) => Some(Duration::ZERO),
    }
}

#[derive(Debug, Default)]
pub struct DisabledRetryStrategy;

impl RetryStrategy for DisabledRetryStrategy {
    fn acquire_initial_token(&self, scope: &TokenScope) -> Result<RetryToken, BoxError> {
        Ok(RetryToken::new(scope.clone()))
    }

    fn refresh_for_retry(
        &self,
        _token: &mut RetryToken,
        _info: &ErrorInfo,
    ) -> Result<RetryDirective, BoxError> {
        Ok(RetryDirective::GiveUp)
    }

    fn record_success(&self, _token: &mut RetryToken) {}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryBudgetPolicy {
    window: Duration,
    retry_ratio: f64,
    min_retries_per_window: usize,
}

impl RetryBudgetPolicy {
    pub const fn standard() -> Self {
        Self {
            window: Duration::from_secs(10),
            retry_ratio: 0.2,
            min_retries_per_window: 3,
        }
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window.max(Duration::from_millis(1));
        self
    }

    pub fn retry_ratio(mut self, retry_ratio: f64) -> Self {
        self.retry_ratio = retry_ratio.clamp(0.0, 1.0);
        self
    }

    pub const fn min_retries_per_window(mut self, min_retries_per_window: usize) -> Self {
        self.min_retries_per_window = min_retries_per_window;
        self
    }
}

impl Default for RetryBudgetPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug)]
struct ScopeWindow {
    started_at: Instant,
    successes: usize,
    retries_consumed: usize,
}

impl ScopeWindow {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            successes: 0,
            retries_consumed: 0,
        }
    }

    fn roll(&mut self, window: Duration) {
        if self.started_at.elapsed() >= window {
            self.started_at = Instant::now();
            self.successes = 0;
            self.retries_consumed = 0;
        }
    }
}

#[derive(Debug)]
struct RetryBudget {
    policy: RetryBudgetPolicy,
    scopes: Mutex<HashMap<String, ScopeWindow>>,
}

impl RetryBudget {
    fn new(policy: RetryBudgetPolicy) -> Self {
        Self {
            policy,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    fn record_success(&self, scope: &TokenScope) {
        let mut scopes = lock_unpoisoned(&self.scopes);
        let window = scopes
            .entry(scope.as_str().to_owned())
            .or_insert_with(ScopeWindow::new);
        window.roll(self.policy.window);
        window.successes = window.successes.saturating_add(1);
    }

    fn try_consume_retry(&self, scope: &TokenScope) -> bool {
        let mut scopes = lock_unpoisoned(&self.scopes);
        let window = scopes
            .entry(scope.as_str().to_owned())
            .or_insert_with(ScopeWindow::new);
        window.roll(self.policy.window);
        let earned = (window.successes as f64 * self.policy.retry_ratio).floor() as usize;
        let allowance = earned.saturating_add(self.policy.min_retries_per_window);
        if window.retries_consumed >= allowance {
            return false;
        }
        window.retries_consumed = window.retries_consumed.saturating_add(1);
        true
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, ThisError)]
#[error("retry budget exhausted for scope {scope}")]
pub struct RetryBudgetExhausted {
    pub scope: String,
}

pub struct StandardRetryStrategy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    jitter_ratio: f64,
    budget: Option<RetryBudget>,
}

impl StandardRetryStrategy {
    pub fn standard() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            jitter_ratio: 0.2,
            budget: None,
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff.max(Duration::from_millis(1));
        if self.max_backoff < self.base_backoff {
            self.max_backoff = self.base_backoff;
        }
        self
    }

    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff.max(self.base_backoff);
        self
    }

    pub fn jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio.clamp(0.0, 1.0);
        self
    }

    pub fn retry_budget(mut self, policy: RetryBudgetPolicy) -> Self {
        self.budget = Some(RetryBudget::new(policy));
        self
    }

    fn backoff_for_retry(&self, retry_index: u32) -> Duration {
        let capped_exponent = retry_index.saturating_sub(1).min(31);
        let multiplier = 1_u128 << capped_exponent;
        let base_ms = self.base_backoff.as_millis().max(1);
        let max_ms = self.max_backoff.as_millis().max(base_ms);
        let delay_ms = base_ms
            .saturating_mul(multiplier)
            .min(max_ms)
            .min(u64::MAX as u128) as u64;
        self.apply_jitter(Duration::from_millis(delay_ms))
    }

    fn apply_jitter(&self, backoff: Duration) -> Duration {
        if self.jitter_ratio <= f64::EPSILON {
            return backoff;
        }
        let backoff_ms = backoff.as_millis().min(u64::MAX as u128) as u64;
        if backoff_ms <= 1 {
            return backoff;
        }
        let max_backoff_ms = self.max_backoff.as_millis().min(u64::MAX as u128) as u64;
        let jitter_window = ((backoff_ms as f64) * self.jitter_ratio).round().max(1.0) as u64;
        let low = backoff_ms.saturating_sub(jitter_window);
        let high = backoff_ms.saturating_add(jitter_window).max(low);
        let mut rng = rand::rng();
        let sampled_ms = rng.random_range(low..=high).min(max_backoff_ms.max(1));
        Duration::from_millis(sampled_ms)
    }
}

impl Default for StandardRetryStrategy {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for StandardRetryStrategy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StandardRetryStrategy")
            .field("max_attempts", &self.max_attempts)
            .field("base_backoff", &self.base_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("jitter_ratio", &self.jitter_ratio)
            .field("budget", &self.budget.is_some())
            .finish()
    }
}

impl RetryStrategy for StandardRetryStrategy {
    fn acquire_initial_token(&self, scope: &TokenScope) -> Result<RetryToken, BoxError> {
        Ok(RetryToken::new(scope.clone()))
    }

    fn refresh_for_retry(
        &self,
        token: &mut RetryToken,
        info: &ErrorInfo,
    ) -> Result<RetryDirective, BoxError> {
        if !info.class.is_retryable() || token.attempt() >= self.max_attempts {
            return Ok(RetryDirective::GiveUp);
        }
        if let Some(budget) = &self.budget {
            if !budget.try_consume_retry(token.scope()) {
                return Err(Box::new(RetryBudgetExhausted {
                    scope: token.scope().as_str().to_owned(),
                }));
            }
        }
        let delay = info
            .retry_after
            .unwrap_or_else(|| self.backoff_for_retry(token.attempt()));
        token.increment_attempt();
        Ok(RetryDirective::RetryAfter(delay))
    }

    fn record_success(&self, token: &mut RetryToken) {
        if let Some(budget) = &self.budget {
            budget.record_success(token.scope());
        }
    }
}
