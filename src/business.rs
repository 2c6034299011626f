//! Business line registry: static configuration plus the runtime record the
//! manager attaches once a business is added (§2, §4.4, §4.5 step A).

use crate::interceptor::Interceptor;
use crate::parser::Parser;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// Immutable configuration for a single business line, supplied by the caller
/// when registering it with [`crate::manager::Manager`].
#[derive(Clone)]
pub struct BusinessConfig {
    pub identifier: String,
    pub base_url: String,
    /// Fallback retry interval used when a request doesn't specify its own (§3).
    pub retry_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub recv_timeout_ms: u64,
}

impl BusinessConfig {
    #[must_use]
    pub fn new(identifier: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            base_url: base_url.into(),
            retry_interval_ms: 1000,
            connect_timeout_ms: 10_000,
            send_timeout_ms: 10_000,
            recv_timeout_ms: 10_000,
        }
    }
}

/// Per-business runtime state tracked by the manager once `add_business` runs.
///
/// `init_gate` resolves once the business's [`Interceptor::initial_data`] hook has
/// completed (§4.4); `suspend_gate` is open (not notified) while the business is
/// suspended and closed otherwise, per §4.5's suspend/resume flow control.
pub struct BusinessRecord {
    pub config: BusinessConfig,
    pub interceptor: Arc<dyn Interceptor>,
    pub parser: Arc<dyn Parser>,
    pub transport: Arc<dyn Transport>,
    pub mock_transport: Option<Arc<dyn Transport>>,
    initialized: AtomicBool,
    init_notify: Notify,
    suspended: RwLock<bool>,
    resume_notify: Notify,
}

impl BusinessRecord {
    #[must_use]
    pub fn new(
        config: BusinessConfig,
        interceptor: Arc<dyn Interceptor>,
        parser: Arc<dyn Parser>,
        transport: Arc<dyn Transport>,
        mock_transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            config,
            interceptor,
            parser,
            transport,
            mock_transport,
            initialized: AtomicBool::new(false),
            init_notify: Notify::new(),
            suspended: RwLock::new(false),
            resume_notify: Notify::new(),
        }
    }

    pub fn mark_initialized(&self) {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            self.init_notify.notify_waiters();
        }
    }

    /// Waits for this business's one-time initialization to complete.
    pub async fn wait_initialized(&self) {
        if self.initialized.load(Ordering::SeqCst) {
            return;
        }
        let notified = self.init_notify.notified();
        if self.initialized.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    pub async fn suspend(&self) {
        *self.suspended.write().await = true;
    }

    pub async fn resume(&self) {
        let mut guard = self.suspended.write().await;
        if *guard {
            *guard = false;
            self.resume_notify.notify_waiters();
        }
    }

    pub async fn is_suspended(&self) -> bool {
        *self.suspended.read().await
    }

    /// Blocks until this business is resumed. Returns immediately if not suspended.
    pub async fn wait_until_resumed(&self) {
        loop {
            if !self.is_suspended().await {
                return;
            }
            self.resume_notify.notified().await;
        }
    }

    #[must_use]
    pub fn transport_for(&self, use_mock: bool) -> Arc<dyn Transport> {
        if use_mock {
            self.mock_transport
                .clone()
                .unwrap_or_else(|| self.transport.clone())
        } else {
            self.transport.clone()
        }
    }
}
