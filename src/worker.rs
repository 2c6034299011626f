//! Background worker that periodically replays durably queued promise requests
//! (§4.8 "Background JSON worker", non-core).
//!
//! This is not part of the lifecycle state machine in §4.5; it's an operational
//! convenience so a caller doesn't have to remember to call
//! [`Manager::promise_requests`] and resend them by hand after a restart.

use crate::cancel::CancelToken;
use crate::manager::Manager;
use crate::request::Request;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Replays every business's queued promises on a fixed interval until cancelled.
pub struct PromiseReplayWorker {
    manager: Arc<Manager>,
    business_identifiers: Vec<String>,
    interval: Duration,
}

impl PromiseReplayWorker {
    #[must_use]
    pub fn new(manager: Arc<Manager>, business_identifiers: Vec<String>, interval: Duration) -> Self {
        Self {
            manager,
            business_identifiers,
            interval,
        }
    }

    /// Runs until `cancel` fires. Intended to be driven from a `tokio::spawn`.
    pub async fn run(&self, cancel: CancelToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(self.interval) => {}
            }
            self.replay_once().await;
        }
    }

    /// Runs a single replay pass, useful for tests that don't want to wait on a timer.
    pub async fn replay_once(&self) {
        for business_identifier in &self.business_identifiers {
            let queued = match self.manager.promise_requests(business_identifier).await {
                Ok(queued) => queued,
                Err(err) => {
                    warn!(business = business_identifier.as_str(), error = %err, "failed to read queued promises");
                    continue;
                }
            };
            debug!(business = business_identifier.as_str(), count = queued.len(), "replaying queued promises");
            for core in queued {
                let request: Request<()> = Request::new(core);
                if let Err(err) = self.manager.send(request).await {
                    warn!(business = business_identifier.as_str(), error = %err, "promise replay failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::BusinessConfig;
    use crate::config::ManagerConfig;
    use crate::interceptor::tests::NoopInterceptor;
    use crate::manager;
    use crate::parser::DefaultParser;
    use crate::transport::tests::StaticTransport;

    #[tokio::test]
    async fn replay_once_is_a_no_op_once_a_promise_completes_normally() {
        let manager = Arc::new(Manager::new(ManagerConfig::default()).await.unwrap());
        manager
            .add_business(
                BusinessConfig::new("billing", "https://billing.example.com"),
                Arc::new(NoopInterceptor),
                Arc::new(DefaultParser),
                Arc::new(StaticTransport::ok()),
                None,
            )
            .await
            .unwrap();

        let mut core = manager::get("billing", "/invoices");
        core.promise.enable = true;
        manager.send(Request::<()>::new(core)).await.unwrap();

        // A request that already completed (success or final failure) is removed
        // from the queue by `Manager::send` itself; nothing is left for the worker
        // to replay on the next tick. The worker only matters for promises still
        // queued because the process crashed mid-flight.
        let worker = PromiseReplayWorker::new(manager.clone(), vec!["billing".to_string()], Duration::from_secs(60));
        worker.replay_once().await;
        assert!(manager.promise_requests("billing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replay_once_tolerates_an_unregistered_business() {
        let manager = Arc::new(Manager::new(ManagerConfig::default()).await.unwrap());
        let worker = PromiseReplayWorker::new(manager, vec!["nonexistent".to_string()], Duration::from_secs(60));
        worker.replay_once().await;
    }
}
