use std::time::Duration;

use crate::error::BoxError;
use crate::interceptor::Hook;
use crate::retry::ErrorInfo;

pub trait Observer: Send + Sync {
    fn on_interceptor_error(&self, _hook: Hook, _interceptor: &str, _error: &BoxError) {}

    fn on_attempt_started(&self, _attempt: u32) {}

    fn on_retry_scheduled(&self, _attempt: u32, _info: &ErrorInfo, _delay: Duration) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}
