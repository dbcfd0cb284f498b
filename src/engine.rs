//! Background transform engine.
//!
//! One dedicated thread owns the loaded transform. Callers talk to it only through channels, so
//! the interactive thread never waits on pixel work.

pub mod protocol;
mod worker;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::foundation::error::{ProofError, ProofResult};

pub use protocol::{
    DEFAULT_GAMUT_COLOR, EngineRequest, EngineResponse, TransformKind, TransformOptions,
    TransformRequest, TransformResult,
};

/// Message seam between orchestrators and an engine.
///
/// [`TransformEngine`] is the production implementation; tests wrap or replace it to observe
/// traffic.
pub trait EnginePort: Send {
    /// Queue a request. Fails only when the engine is gone.
    fn send(&mut self, req: EngineRequest) -> ProofResult<()>;

    /// Next available response, without blocking.
    fn try_recv(&mut self) -> Option<EngineResponse>;
}

/// Handle to an engine thread.
///
/// Dropping the handle closes the request channel and joins the thread.
pub struct TransformEngine {
    tx: Option<Sender<EngineRequest>>,
    rx: Receiver<EngineResponse>,
    handle: Option<JoinHandle<()>>,
    name: String,
}

impl TransformEngine {
    /// Start an engine thread called `name`.
    pub fn spawn(name: &str) -> ProofResult<Self> {
        let (req_tx, req_rx) = mpsc::channel::<EngineRequest>();
        let (resp_tx, resp_rx) = mpsc::channel::<EngineResponse>();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = worker::EngineState::default();
                while let Ok(req) = req_rx.recv() {
                    let id = req.id();
                    let kind = req.name();
                    let span = tracing::debug_span!("engine", %id, kind);
                    let resp = span.in_scope(|| state.handle(req));
                    if resp_tx.send(resp).is_err() {
                        break;
                    }
                }
                tracing::debug!("engine thread exiting");
            })
            .map_err(|e| {
                ProofError::EngineInitFailed(format!("failed to spawn engine thread: {e}"))
            })?;

        tracing::debug!(name, "engine thread started");
        Ok(Self {
            tx: Some(req_tx),
            rx: resp_rx,
            handle: Some(handle),
            name: name.to_string(),
        })
    }

    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block for the next response up to `timeout`. `Ok(None)` means the time ran out.
    pub fn recv_timeout(&mut self, timeout: Duration) -> ProofResult<Option<EngineResponse>> {
        match self.rx.recv_timeout(timeout) {
            Ok(resp) => Ok(Some(resp)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ProofError::EngineDisconnected),
        }
    }
}

impl EnginePort for TransformEngine {
    fn send(&mut self, req: EngineRequest) -> ProofResult<()> {
        let tx = self.tx.as_ref().ok_or(ProofError::EngineDisconnected)?;
        tx.send(req).map_err(|_| ProofError::EngineDisconnected)
    }

    fn try_recv(&mut self) -> Option<EngineResponse> {
        match self.rx.try_recv() {
            Ok(resp) => Some(resp),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for TransformEngine {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!(name = %self.name, "engine thread panicked");
        }
    }
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("name", &self.name)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
