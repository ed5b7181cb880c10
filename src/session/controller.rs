//! Owns the transport for the lifetime of a session and shuts everything down on every exit path.
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::{CancelToken, Cancellation, KeepaliveScheduler, OutputSink, ReceiveListener, SessionConfig};
use crate::can::{AdapterConfig, AsyncCanAdapter};
use crate::Result;

/// Everything a running session shares: the transport and the cancellation signal. Created at startup and passed explicitly.
pub struct RunState {
    adapter: AsyncCanAdapter,
    cancellation: Cancellation,
    shut_down: AtomicBool,
}

impl RunState {
    pub fn new(adapter: AsyncCanAdapter) -> Self {
        Self {
            adapter,
            cancellation: Cancellation::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn adapter(&self) -> &AsyncCanAdapter {
        &self.adapter
    }

    pub fn token(&self) -> CancelToken {
        self.cancellation.token()
    }

    pub fn is_running(&self) -> bool {
        !self.shut_down.load(Ordering::SeqCst)
    }

    /// Ask the scheduler and listener to stop, without releasing the transport yet.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Cancel and close the transport. Idempotent: only the first call closes, later calls return `false`.
    ///
    /// Blocks the calling thread while the adapter thread stops, for at most the adapter's close grace period
    /// ([`crate::can::async_can::DEFAULT_CLOSE_GRACE`] unless configured). Called once at the end of a session,
    /// so stalling the runtime thread for that long is acceptable.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return false;
        }

        self.cancellation.cancel();
        info!("Shutting down CAN bus");
        self.adapter.close();
        true
    }
}

impl Drop for RunState {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Composes transport, keepalive scheduler and receive listener.
pub struct SessionController {
    config: SessionConfig,
    sink: Arc<dyn OutputSink>,
}

impl SessionController {
    pub fn new(config: SessionConfig, sink: Arc<dyn OutputSink>) -> Self {
        Self { config, sink }
    }

    /// Open the transport described by `adapter_config` and run the session until `shutdown_signal` resolves.
    pub async fn run<F>(&self, adapter_config: &AdapterConfig, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;

        info!("Connecting to CAN bus");
        let adapter = crate::can::open(adapter_config)?;
        self.run_with_adapter(adapter, shutdown_signal).await
    }

    /// Run the session on an already opened transport. The transport is closed before this returns, whatever the outcome.
    pub async fn run_with_adapter<F>(&self, adapter: AsyncCanAdapter, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let state = RunState::new(adapter);
        let result = match self.config.validate() {
            Ok(()) => self.drive(&state, shutdown_signal).await,
            Err(e) => Err(e),
        };
        state.shutdown();
        result
    }

    async fn drive<F>(&self, state: &RunState, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let sink = self.sink.as_ref();
        let scheduler = KeepaliveScheduler::new(state.adapter(), &self.config, sink);
        let listener = ReceiveListener::new(&self.config, sink);

        // Subscribe before the session request goes out, so the response is not missed
        let stream = state.adapter().recv();
        info!("Listening for incoming CAN messages");

        let scheduler_run = scheduler.run(state.token());
        let listener_run = listener.run(stream, state.token());
        tokio::pin!(shutdown_signal);
        tokio::pin!(scheduler_run);
        tokio::pin!(listener_run);

        let mut interrupted = false;
        let mut scheduler_result = None;
        let mut listener_result = None;

        while scheduler_result.is_none() || listener_result.is_none() {
            tokio::select! {
                _ = &mut shutdown_signal, if !interrupted => {
                    info!("Stopped by user");
                    interrupted = true;
                    state.cancel();
                }
                result = &mut scheduler_run, if scheduler_result.is_none() => {
                    // Either cancelled, or the scheduler hit a fatal error and the listener has to follow
                    state.cancel();
                    scheduler_result = Some(result);
                }
                result = &mut listener_run, if listener_result.is_none() => {
                    state.cancel();
                    listener_result = Some(result);
                }
            }
        }

        info!(
            "Session ended: {:?}, {} frames received, session {:?}",
            scheduler.stats(),
            listener.received(),
            listener.session_status()
        );

        match (scheduler_result, listener_result) {
            (Some(Err(e)), _) => Err(e),
            (_, Some(Err(e))) => Err(e),
            _ => Ok(()),
        }
    }
}
