//! # Bounded readiness polling.
//!
//! [`ReadinessPoller::wait_for`] queries a [`ModuleQuery`] until the target
//! module is listed, sleeping a constant interval between queries.
//!
//! ## Rules
//! - The first query happens immediately; a module already listed returns
//!   without sleeping.
//! - A failing query returns `QueryFailed` at once; it is never retried.
//! - The deadline bounds the whole wait, including a query that hangs.
//! - No backoff: the interval is constant.

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ComponentError;
use crate::readiness::ModuleQuery;

/// Polls a module query until a module appears or the deadline passes.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessPoller {
    deadline: Duration,
    interval: Duration,
}

impl ReadinessPoller {
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self { deadline, interval }
    }

    /// Uses `readiness_timeout` and `poll_interval` from the configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.readiness_timeout, cfg.poll_interval)
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Waits until `module` is listed by `query`.
    pub async fn wait_for<Q>(
        &self,
        query: &Q,
        module: &str,
        token: &CancellationToken,
    ) -> Result<(), ComponentError>
    where
        Q: ModuleQuery + ?Sized,
    {
        let deadline = Instant::now() + self.deadline;

        loop {
            let listed = tokio::select! {
                res = time::timeout_at(deadline, query.list(token)) => res,
                _ = token.cancelled() => return Err(ComponentError::Canceled),
            };

            match listed {
                Ok(Ok(list)) if list.contains(module) => return Ok(()),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => return Err(self.timed_out(module)),
            }

            let wake = (Instant::now() + self.interval).min(deadline);
            tokio::select! {
                _ = time::sleep_until(wake) => {}
                _ = token.cancelled() => return Err(ComponentError::Canceled),
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(module));
            }
        }
    }

    fn timed_out(&self, module: &str) -> ComponentError {
        ComponentError::ReadinessTimeout {
            module: module.to_string(),
            waited: self.deadline,
        }
    }
}
