// Signal handling for graceful server shutdown

use crate::error::{BookSearchError, Result};
use tokio::signal::unix::{signal, Signal as TokioSignal, SignalKind};

/// Signal that stopped the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Terminate,
    Interrupt,
    Hangup,
}

/// Listens for SIGTERM, SIGINT and SIGHUP
pub struct SignalHandler {
    sigterm: TokioSignal,
    sigint: TokioSignal,
    sighup: TokioSignal,
}

impl SignalHandler {
    pub fn new() -> Result<Self> {
        Ok(Self {
            sigterm: install(SignalKind::terminate(), "SIGTERM")?,
            sigint: install(SignalKind::interrupt(), "SIGINT")?,
            sighup: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Wait until any handled signal arrives
    pub async fn wait(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                ShutdownSignal::Terminate
            }
            _ = self.sigint.recv() => {
                tracing::info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
            _ = self.sighup.recv() => {
                tracing::info!("Received SIGHUP");
                ShutdownSignal::Hangup
            }
        }
    }
}

fn install(kind: SignalKind, name: &str) -> Result<TokioSignal> {
    signal(kind).map_err(|e| BookSearchError::Io {
        source: e,
        context: format!("Failed to setup {} handler", name),
    })
}
