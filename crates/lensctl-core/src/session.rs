// ── Device session ──
//
// Owns the context + device handle pair for one camera and drives the
// lifecycle Closed -> Connecting -> Ready <-> Busy -> Closed. Every engine
// operation borrows the pair through a `Lease`, which is also the session's
// only mutual-exclusion point.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lensctl_transport::{ContextHandle, DeviceHandle, DeviceTransport};
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use crate::capture::CaptureEngine;
use crate::catalog::FileCatalog;
use crate::config::{BusyPolicy, SessionConfig};
use crate::error::CoreError;
use crate::widget::ConfigEngine;

// ── SessionState ─────────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Closed,
    Connecting,
    Ready,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HandlePair {
    ctx: ContextHandle,
    dev: DeviceHandle,
}

// ── Session ──────────────────────────────────────────────────────────

/// One logical connection to a camera.
///
/// Cheaply cloneable via `Arc<SessionInner>`; clones share the same handle
/// pair and state. Does NOT connect on construction, call
/// [`connect()`](Self::connect) first.
///
/// Teardown is async, so dropping the last clone cannot release the camera.
/// A connected session must be closed with [`disconnect()`](Self::disconnect);
/// if it is dropped instead, the handles stay live and a warning is logged.
pub struct Session<T: DeviceTransport> {
    inner: Arc<SessionInner<T>>,
}

impl<T: DeviceTransport> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<T: DeviceTransport> {
    transport: Arc<T>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    handles: Mutex<Option<HandlePair>>,
    generation: AtomicU64,
}

impl<T: DeviceTransport> Drop for SessionInner<T> {
    fn drop(&mut self) {
        if let Some(pair) = self.handles.get_mut().take() {
            warn!(
                context = %pair.ctx,
                device = %pair.dev,
                "session dropped while connected; handles were not released"
            );
        }
    }
}

impl<T: DeviceTransport> Session<T> {
    pub fn new(transport: Arc<T>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Closed);
        Self {
            inner: Arc::new(SessionInner {
                transport,
                config,
                state,
                handles: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.inner.transport
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Bumped by every [`reinitialize`](Self::reinitialize); snapshots taken
    /// under an older generation are stale.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "session state changed");
        }
    }

    // ── Engines ──────────────────────────────────────────────────────

    // Each engine call takes its own lease. Inside `with_exclusive`, use
    // the engines on the `Lease` instead.

    pub fn capture(&self) -> CaptureEngine<'_, T> {
        CaptureEngine::new(Access::Session(self))
    }

    pub fn settings(&self) -> ConfigEngine<'_, T> {
        ConfigEngine::new(Access::Session(self))
    }

    pub fn files(&self) -> FileCatalog<'_, T> {
        FileCatalog::new(Access::Session(self))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Acquire and initialize the camera.
    ///
    /// On failure every handle acquired so far is released before
    /// returning and the session stays `Closed`.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.handles.lock().await;
        if handles.is_some() {
            return Err(CoreError::InvalidState {
                operation: "connect",
                state: self.state(),
            });
        }

        self.set_state(SessionState::Connecting);
        match self.open().await {
            Ok(pair) => {
                *handles = Some(pair);
                self.set_state(SessionState::Ready);
                info!(context = %pair.ctx, device = %pair.dev, "camera connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Closed);
                Err(e)
            }
        }
    }

    /// Release the camera.
    ///
    /// Every teardown step runs even if an earlier one fails; the first
    /// failure is returned. The session ends `Closed` either way.
    pub async fn disconnect(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.handles.lock().await;
        let Some(pair) = handles.take() else {
            return Err(CoreError::InvalidState {
                operation: "disconnect",
                state: self.state(),
            });
        };

        let result = self.teardown(pair).await;
        self.set_state(SessionState::Closed);
        match &result {
            Ok(()) => info!("camera disconnected"),
            Err(e) => warn!(error = %e, "camera disconnected with errors"),
        }
        result
    }

    /// Swap the device handle for a freshly initialized one on the same
    /// context. Previously fetched configuration trees become stale.
    ///
    /// If the device cannot be re-acquired the session tears down fully
    /// and ends `Closed`.
    pub async fn reinitialize(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.handles.lock().await;
        let Some(pair) = *handles else {
            return Err(CoreError::InvalidState {
                operation: "reinitialize",
                state: self.state(),
            });
        };

        self.set_state(SessionState::Busy);
        let transport = &self.inner.transport;
        if let Err(e) = transport.device_exit(pair.ctx, pair.dev).await {
            warn!(error = %e, "device exit failed during reinitialize");
        }
        if let Err(e) = transport.device_release(pair.dev).await {
            warn!(error = %e, "device release failed during reinitialize");
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match self.open_device(pair.ctx).await {
            Ok(dev) => {
                *handles = Some(HandlePair { ctx: pair.ctx, dev });
                self.set_state(SessionState::Ready);
                info!(device = %dev, generation, "camera reinitialized");
                Ok(())
            }
            Err(e) => {
                *handles = None;
                if let Err(release) = transport.context_release(pair.ctx).await {
                    warn!(error = %release, "context release failed after reinitialize");
                }
                self.set_state(SessionState::Closed);
                Err(e)
            }
        }
    }

    async fn open(&self) -> Result<HandlePair, CoreError> {
        let transport = &self.inner.transport;
        let ctx = transport
            .context_create()
            .await
            .map_err(|e| CoreError::Context { code: e.code() })?;

        match self.open_device(ctx).await {
            Ok(dev) => Ok(HandlePair { ctx, dev }),
            Err(e) => {
                if let Err(release) = transport.context_release(ctx).await {
                    warn!(error = %release, "context release failed after connect error");
                }
                Err(e)
            }
        }
    }

    async fn open_device(&self, ctx: ContextHandle) -> Result<DeviceHandle, CoreError> {
        let transport = &self.inner.transport;
        let dev = transport
            .device_create()
            .await
            .map_err(|e| CoreError::DeviceAcquire { code: e.code() })?;

        if let Err(e) = transport.device_init(ctx, dev).await {
            if let Err(release) = transport.device_release(dev).await {
                warn!(error = %release, "device release failed after init error");
            }
            return Err(CoreError::Init { code: e.code() });
        }
        Ok(dev)
    }

    async fn teardown(&self, pair: HandlePair) -> Result<(), CoreError> {
        let transport = &self.inner.transport;
        let steps = [
            ("device_exit", transport.device_exit(pair.ctx, pair.dev).await),
            ("device_release", transport.device_release(pair.dev).await),
            ("context_release", transport.context_release(pair.ctx).await),
        ];

        let mut first = None;
        for (step, outcome) in steps {
            if let Err(e) = outcome {
                warn!(step, error = %e, "teardown step failed");
                first.get_or_insert(CoreError::Teardown {
                    step,
                    code: e.code(),
                });
            }
        }
        first.map_or(Ok(()), Err)
    }

    // ── Exclusive access ─────────────────────────────────────────────

    /// Borrow the handle pair for one operation. The session reports `Busy`
    /// until the lease is dropped, on every exit path.
    pub async fn lease(&self) -> Result<Lease<'_, T>, CoreError> {
        let guard = match self.inner.config.busy_policy {
            BusyPolicy::Wait => self.inner.handles.lock().await,
            BusyPolicy::FailFast => self
                .inner
                .handles
                .try_lock()
                .map_err(|_| CoreError::SessionBusy)?,
        };
        let Some(pair) = *guard else {
            return Err(CoreError::SessionClosed);
        };

        self.set_state(SessionState::Busy);
        Ok(Lease {
            session: self,
            _guard: guard,
            pair,
        })
    }

    /// Run `op` with exclusive use of the camera. Engines obtained from the
    /// lease (`lease.capture()`, `lease.settings()`, `lease.files()`) run
    /// under it without locking again.
    pub async fn with_exclusive<R>(
        &self,
        op: impl AsyncFnOnce(&Lease<'_, T>) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let lease = self.lease().await?;
        op(&lease).await
    }
}

// ── Lease ────────────────────────────────────────────────────────────

/// Exclusive, scoped access to a connected session's handles.
pub struct Lease<'a, T: DeviceTransport> {
    session: &'a Session<T>,
    _guard: MutexGuard<'a, Option<HandlePair>>,
    pair: HandlePair,
}

impl<T: DeviceTransport> Lease<'_, T> {
    pub fn transport(&self) -> &T {
        &self.session.inner.transport
    }

    pub fn context(&self) -> ContextHandle {
        self.pair.ctx
    }

    pub fn device(&self) -> DeviceHandle {
        self.pair.dev
    }

    pub fn config(&self) -> &SessionConfig {
        &self.session.inner.config
    }

    pub fn generation(&self) -> u64 {
        self.session.generation()
    }

    pub fn capture(&self) -> CaptureEngine<'_, T> {
        CaptureEngine::new(Access::Lease(self))
    }

    pub fn settings(&self) -> ConfigEngine<'_, T> {
        ConfigEngine::new(Access::Lease(self))
    }

    pub fn files(&self) -> FileCatalog<'_, T> {
        FileCatalog::new(Access::Lease(self))
    }
}

impl<T: DeviceTransport> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        self.session.set_state(SessionState::Ready);
    }
}

// ── Access ───────────────────────────────────────────────────────────

/// Where an engine gets its handles: a fresh lease per operation, or a
/// lease its caller already holds.
pub(crate) enum Access<'a, T: DeviceTransport> {
    Session(&'a Session<T>),
    Lease(&'a Lease<'a, T>),
}

impl<T: DeviceTransport> Clone for Access<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: DeviceTransport> Copy for Access<'_, T> {}

impl<'a, T: DeviceTransport> Access<'a, T> {
    pub(crate) async fn lease(self) -> Result<Held<'a, T>, CoreError> {
        match self {
            Self::Session(session) => session.lease().await.map(Held::Owned),
            Self::Lease(lease) => Ok(Held::Borrowed(lease)),
        }
    }

    pub(crate) fn generation(self) -> u64 {
        match self {
            Self::Session(session) => session.generation(),
            Self::Lease(lease) => lease.generation(),
        }
    }
}

/// A lease taken for one operation, or borrowed from an enclosing one.
pub(crate) enum Held<'a, T: DeviceTransport> {
    Owned(Lease<'a, T>),
    Borrowed(&'a Lease<'a, T>),
}

impl<'a, T: DeviceTransport> Deref for Held<'a, T> {
    type Target = Lease<'a, T>;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Owned(lease) => lease,
            Self::Borrowed(lease) => *lease,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use lensctl_transport::{RawValue, StatusCode};
    use lensctl_transport::simulated::{Call, SimulatedCamera};
    use pretty_assertions::assert_eq;

    use super::*;

    fn session_with(config: SessionConfig) -> (Arc<SimulatedCamera>, Session<SimulatedCamera>) {
        let camera = Arc::new(SimulatedCamera::default());
        let session = Session::new(Arc::clone(&camera), config);
        (camera, session)
    }

    fn session() -> (Arc<SimulatedCamera>, Session<SimulatedCamera>) {
        session_with(SessionConfig::default())
    }

    #[tokio::test]
    async fn connect_then_disconnect_releases_everything() {
        let (camera, session) = session();
        assert_eq!(session.state(), SessionState::Closed);

        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(camera.live_contexts(), 1);
        assert_eq!(camera.live_devices(), 1);

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(camera.live_contexts(), 0);
        assert_eq!(camera.live_devices(), 0);
    }

    #[tokio::test]
    async fn init_failure_releases_device_and_context_once() {
        let (camera, session) = session();
        camera.inject(|f| f.device_init = Some(StatusCode::IO_USB_CLAIM));

        let err = session.connect().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Init {
                code: StatusCode::IO_USB_CLAIM
            }
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(camera.live_devices(), 0);
        assert_eq!(camera.live_contexts(), 0);

        let journal = camera.journal();
        assert_eq!(journal.iter().filter(|c| c.is_device_release()).count(), 1);
        assert_eq!(
            journal
                .iter()
                .filter(|c| matches!(c, Call::ContextRelease(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn device_create_failure_releases_context() {
        let (camera, session) = session();
        camera.inject(|f| f.device_create = Some(StatusCode::MODEL_NOT_FOUND));

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceAcquire { .. }));
        assert_eq!(camera.live_contexts(), 0);
        assert!(!camera.journal().iter().any(Call::is_device_release));
    }

    #[tokio::test]
    async fn context_failure_acquires_nothing() {
        let (camera, session) = session();
        camera.inject(|f| f.context_create = Some(StatusCode::NO_MEMORY));

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, CoreError::Context { .. }));
        assert_eq!(camera.journal(), vec![Call::ContextCreate]);
    }

    #[tokio::test]
    async fn connect_twice_is_invalid() {
        let (_camera, session) = session();
        session.connect().await.unwrap();
        let err = session.connect().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidState {
                operation: "connect",
                state: SessionState::Ready
            }
        ));
    }

    #[tokio::test]
    async fn teardown_runs_every_step_and_reports_first_failure() {
        let (camera, session) = session();
        session.connect().await.unwrap();
        camera.inject(|f| {
            f.device_exit = Some(StatusCode::IO);
            f.context_release = Some(StatusCode::GENERIC);
        });

        let err = session.disconnect().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Teardown {
                step: "device_exit",
                code: StatusCode::IO
            }
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(camera.live_devices(), 0);
        assert_eq!(camera.live_contexts(), 0);
    }

    #[tokio::test]
    async fn disconnect_when_closed_is_invalid() {
        let (_camera, session) = session();
        assert!(matches!(
            session.disconnect().await,
            Err(CoreError::InvalidState {
                operation: "disconnect",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn lease_requires_connection() {
        let (_camera, session) = session();
        assert!(matches!(session.lease().await, Err(CoreError::SessionClosed)));
    }

    #[tokio::test]
    async fn lease_marks_busy_until_dropped() {
        let (_camera, session) = session();
        session.connect().await.unwrap();

        let lease = session.lease().await.unwrap();
        assert_eq!(session.state(), SessionState::Busy);
        drop(lease);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn fail_fast_rejects_concurrent_operation() {
        let (_camera, session) = session_with(SessionConfig {
            busy_policy: BusyPolicy::FailFast,
            ..SessionConfig::default()
        });
        session.connect().await.unwrap();

        let _held = session.lease().await.unwrap();
        assert!(matches!(session.lease().await, Err(CoreError::SessionBusy)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_policy_queues_behind_running_operation() {
        let (_camera, session) = session();
        session.connect().await.unwrap();

        let held = session.lease().await.unwrap();
        let waiter = tokio::time::timeout(Duration::from_millis(50), session.lease()).await;
        assert!(waiter.is_err());
        drop(held);
        assert!(session.lease().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_operation_returns_session_to_ready() {
        let (_camera, session) = session();
        session.connect().await.unwrap();

        let op = session.with_exclusive(async |_lease| {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let outcome = tokio::time::timeout(Duration::from_secs(1), op).await;
        assert!(outcome.is_err());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn with_exclusive_restores_ready_after_failure() {
        let (_camera, session) = session();
        session.connect().await.unwrap();

        let result: Result<(), _> = session
            .with_exclusive(async |lease| {
                assert_eq!(lease.generation(), 0);
                Err(CoreError::Cancelled)
            })
            .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn engines_run_under_an_exclusive_lease() {
        let (camera, session) = session();
        session.connect().await.unwrap();

        let op = session.with_exclusive(async |lease| {
            lease.settings().write_value("iso", "400").await?;
            let image = lease.capture().still().await?;
            let folders = lease.files().list_folders("/").await?;
            Ok((image, folders))
        });
        let (image, folders) = tokio::time::timeout(Duration::from_secs(60), op)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(image.file.name, "capt0000.jpg");
        assert_eq!(folders, vec!["store_00010001"]);
        assert_eq!(camera.setting("iso"), Some(RawValue::Text("400".into())));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn fail_fast_does_not_reject_its_own_lease() {
        let (_camera, session) = session_with(SessionConfig {
            busy_policy: BusyPolicy::FailFast,
            ..SessionConfig::default()
        });
        session.connect().await.unwrap();

        let frame = session
            .with_exclusive(async |lease| {
                assert!(matches!(
                    session.capture().preview().await,
                    Err(CoreError::SessionBusy)
                ));
                lease.capture().preview().await
            })
            .await
            .unwrap();
        assert!(!frame.is_empty());
    }

    #[tokio::test]
    async fn reinitialize_bumps_generation_and_keeps_context() {
        let (camera, session) = session();
        session.connect().await.unwrap();
        let before = session.lease().await.unwrap().context();

        session.reinitialize().await.unwrap();
        assert_eq!(session.generation(), 1);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.lease().await.unwrap().context(), before);
        assert_eq!(camera.live_devices(), 1);
        assert_eq!(camera.live_contexts(), 1);
    }

    #[tokio::test]
    async fn failed_reinitialize_ends_closed_without_leaks() {
        let (camera, session) = session();
        session.connect().await.unwrap();
        camera.inject(|f| f.device_create = Some(StatusCode::IO_USB_CLAIM));

        let err = session.reinitialize().await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceAcquire { .. }));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(camera.live_devices(), 0);
        assert_eq!(camera.live_contexts(), 0);
    }

    #[tokio::test]
    async fn dropping_a_connected_session_does_not_release_the_camera() {
        let (camera, session) = session();
        session.connect().await.unwrap();
        drop(session);

        assert_eq!(camera.live_contexts(), 1);
        assert_eq!(camera.live_devices(), 1);
        assert!(!camera.journal().iter().any(Call::is_device_release));
    }

    #[tokio::test]
    async fn state_changes_are_observable() {
        let (_camera, session) = session();
        let mut rx = session.subscribe_state();
        session.connect().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Ready);
    }
}
