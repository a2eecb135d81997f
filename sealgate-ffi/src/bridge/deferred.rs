//! Deferred bridge: requests return a pending handle immediately.
//!
//! Each request runs on the bridge's blocking pool and reports back over a
//! oneshot channel, so every handle receives exactly one outcome. There is
//! no cancellation or timeout. If the runtime shuts down before a queued
//! request runs, its sender is dropped and the handle rejects as abandoned
//! rather than staying pending forever. Deliveries registered through
//! [`DeferredBridge::on_settled`] that have not run by shutdown are invoked
//! with the same rejection on the thread that shuts the bridge down.

use super::{decrypt_args, encrypt_args};
use sealgate_service::{EncryptionService, Sealed, ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Rejection delivered to a deferred caller. Carries only the message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Rejection {
    pub message: String,
}

impl Rejection {
    fn abandoned() -> Self {
        Self {
            message: "request abandoned before completion".to_string(),
        }
    }
}

impl From<ServiceError> for Rejection {
    fn from(e: ServiceError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

/// Handle to an in-flight request.
///
/// Await it from async code or call [`Pending::wait`] from a plain thread.
#[must_use = "a pending request does nothing useful unless awaited or waited on"]
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, Rejection>>,
}

impl<T> Pending<T> {
    /// Blocks the current thread until the request settles.
    ///
    /// Must not be called from inside an async runtime.
    pub fn wait(self) -> Result<T, Rejection> {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(Rejection::abandoned()))
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, Rejection>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Rejection::abandoned())))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One-shot delivery slot. Whichever side takes it first delivers.
type Slot<F> = Arc<Mutex<Option<F>>>;

fn settle<T, F>(slot: &Mutex<Option<F>>, outcome: Result<T, Rejection>)
where
    F: FnOnce(Result<T, Rejection>),
{
    let deliver = lock(slot).take();
    if let Some(deliver) = deliver {
        deliver(outcome);
    }
}

type Abandon = Box<dyn FnOnce() + Send>;

/// Deliveries that have been scheduled but not yet run.
#[derive(Default)]
struct Deliveries {
    next_id: AtomicU64,
    waiting: Mutex<HashMap<u64, Abandon>>,
}

impl Deliveries {
    fn register(&self, abandon: Abandon) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.waiting).insert(id, abandon);
        id
    }

    fn forget(&self, id: u64) {
        lock(&self.waiting).remove(&id);
    }

    /// Rejects every waiting delivery. Runs them outside the lock.
    fn abandon_all(&self) -> usize {
        let drained: Vec<Abandon> = lock(&self.waiting).drain().map(|(_, a)| a).collect();
        let count = drained.len();
        for abandon in drained {
            abandon();
        }
        count
    }

    fn len(&self) -> usize {
        lock(&self.waiting).len()
    }
}

/// Runs requests on an owned worker runtime.
pub struct DeferredBridge {
    service: Arc<EncryptionService>,
    runtime: Mutex<Option<Runtime>>,
    deliveries: Arc<Deliveries>,
}

impl DeferredBridge {
    /// Starts the worker runtime. `worker_threads` of `None` uses the
    /// runtime default.
    pub fn new(service: Arc<EncryptionService>, worker_threads: Option<usize>) -> ServiceResult<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name("sealgate-worker").enable_all();
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder
            .build()
            .map_err(|e| ServiceError::Config(format!("failed to start worker runtime: {e}")))?;

        Ok(Self {
            service,
            runtime: Mutex::new(Some(runtime)),
            deliveries: Arc::default(),
        })
    }

    /// `encrypt(text)`, resolving to `{ciphertext, token}`.
    pub fn encrypt(&self, args: &[String]) -> Pending<Sealed> {
        let args = args.to_vec();
        let service = Arc::clone(&self.service);
        self.dispatch("encrypt", move || service.encrypt(encrypt_args(&args)?))
    }

    /// `decrypt(ciphertext, token)`, resolving to the plaintext.
    pub fn decrypt(&self, args: &[String]) -> Pending<String> {
        let args = args.to_vec();
        let service = Arc::clone(&self.service);
        self.dispatch("decrypt", move || {
            let (ciphertext, token) = decrypt_args(&args)?;
            service.decrypt(ciphertext, token)
        })
    }

    /// Hands the outcome of `pending` to `deliver` exactly once.
    ///
    /// Normally runs on a worker thread once the request settles. If the
    /// bridge is shut down first, `deliver` receives an abandoned rejection
    /// during [`DeferredBridge::shutdown`], or immediately when the bridge is
    /// already shut down.
    pub fn on_settled<T, F>(&self, pending: Pending<T>, deliver: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T, Rejection>) + Send + 'static,
    {
        let slot: Slot<F> = Arc::new(Mutex::new(Some(deliver)));
        {
            let runtime = lock(&self.runtime);
            if let Some(runtime) = runtime.as_ref() {
                let abandoned = Arc::clone(&slot);
                let id = self.deliveries.register(Box::new(move || {
                    settle::<T, F>(&abandoned, Err(Rejection::abandoned()))
                }));
                let deliveries = Arc::clone(&self.deliveries);
                runtime.spawn(async move {
                    let outcome = pending.await;
                    deliveries.forget(id);
                    settle(&slot, outcome);
                });
                return;
            }
        }
        settle(&slot, Err(Rejection::abandoned()));
    }

    /// Stops the worker runtime and rejects every delivery still waiting.
    ///
    /// Requests dispatched afterwards reject as abandoned. Idempotent.
    pub fn shutdown(&self) {
        let Some(runtime) = lock(&self.runtime).take() else {
            return;
        };
        // Plain runtime drop blocks and panics inside async contexts.
        runtime.shutdown_background();
        let abandoned = self.deliveries.abandon_all();
        info!(abandoned, "deferred bridge shut down");
    }

    /// Whether the worker runtime is still accepting requests.
    pub fn is_running(&self) -> bool {
        lock(&self.runtime).is_some()
    }

    /// Deliveries scheduled through `on_settled` that have not run yet.
    pub fn waiting_deliveries(&self) -> usize {
        self.deliveries.len()
    }

    fn dispatch<T, F>(&self, op: &'static str, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> ServiceResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let runtime = lock(&self.runtime);
        let Some(runtime) = runtime.as_ref() else {
            debug!(op, "bridge shut down, request abandoned");
            // Sender dropped here; the handle rejects as abandoned.
            return Pending { rx };
        };

        let span = info_span!("deferred", request_id = %Uuid::new_v4(), op);
        let handle = runtime.handle().clone();
        runtime.spawn(
            async move {
                let outcome = match handle.spawn_blocking(work).await {
                    Ok(result) => result.map_err(|e| {
                        warn!(kind = ?e.kind(), "request rejected: {e}");
                        Rejection::from(e)
                    }),
                    Err(join_err) => {
                        warn!("request task failed: {join_err}");
                        Err(Rejection {
                            message: format!("request failed: {join_err}"),
                        })
                    }
                };
                if tx.send(outcome).is_err() {
                    debug!("pending handle dropped before delivery");
                }
            }
            .instrument(span),
        );

        Pending { rx }
    }
}

impl Drop for DeferredBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DeferredBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredBridge")
            .field("service", &self.service)
            .field("running", &self.is_running())
            .field("waiting_deliveries", &self.waiting_deliveries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_sender_rejects_as_abandoned() {
        let (tx, rx) = oneshot::channel::<Result<u8, Rejection>>();
        drop(tx);
        let err = Pending { rx }.wait().unwrap_err();
        assert_eq!(err, Rejection::abandoned());
    }

    #[test]
    fn resolved_value_delivered_once() {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(7u8)).unwrap();
        assert_eq!(tokio_test::block_on(Pending { rx }), Ok(7));
    }

    #[test]
    fn rejection_keeps_only_message() {
        let rejection = Rejection::from(ServiceError::KeyNotFound);
        assert_eq!(rejection.message, "no key registered for token");
        assert_eq!(
            serde_json::to_string(&rejection).unwrap(),
            r#"{"message":"no key registered for token"}"#
        );
    }
}
