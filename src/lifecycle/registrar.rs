//! Process termination hooks
//!
//! A [`ShutdownRegistrar`] accepts one hook and runs it at most once, when the
//! process is asked to terminate. The hook is a future, so it is consumed the
//! first time it is driven and cannot fire again.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Deferred action run on the first termination signal
pub type ShutdownHook = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Action taken for a termination signal that arrives after the hook ran
pub type RepeatSignalAction = Arc<dyn Fn(TerminationSignal) + Send + Sync + 'static>;

/// Errors raised while registering a shutdown hook
#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("Failed to install signal handler: {0}")]
    SignalInstall(#[source] std::io::Error),
    #[error("No tokio runtime available to run the shutdown hook")]
    NoRuntime,
    #[error("A shutdown hook is already registered")]
    AlreadyRegistered,
}

/// Registers a one-shot hook on the process termination signal
pub trait ShutdownRegistrar: Send + Sync {
    /// Arrange for `hook` to run once when termination is requested
    fn register_once(&self, hook: ShutdownHook) -> Result<(), RegistrarError>;
}

/// Signals that request process termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl TerminationSignal {
    /// Shell-style exit status for a process ended by this signal
    pub fn exit_code(&self) -> i32 {
        match self {
            TerminationSignal::Interrupt => 130,
            TerminationSignal::Terminate => 143,
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Registrar backed by OS signals
///
/// Listens for SIGINT, and SIGTERM on unix. The first signal runs the hook to
/// completion. Installing the listener replaces the default disposition of
/// both signals for the rest of the process, so the listener stays up after
/// the hook: any later signal (including one that arrived while the hook was
/// running) ends the process with status 130 or 143. The hook itself never
/// runs twice.
pub struct SignalRegistrar {
    armed: AtomicBool,
    on_repeat: RepeatSignalAction,
}

impl fmt::Debug for SignalRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRegistrar")
            .field("armed", &self.is_armed())
            .finish_non_exhaustive()
    }
}

impl Default for SignalRegistrar {
    fn default() -> Self {
        Self {
            armed: AtomicBool::new(false),
            on_repeat: Arc::new(exit_on_signal),
        }
    }
}

impl SignalRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace what happens on a signal delivered after the hook completed
    pub fn with_repeat_action<F>(mut self, action: F) -> Self
    where
        F: Fn(TerminationSignal) + Send + Sync + 'static,
    {
        self.on_repeat = Arc::new(action);
        self
    }

    /// Whether a hook has been registered
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

fn exit_on_signal(signal: TerminationSignal) {
    std::process::exit(signal.exit_code());
}

impl ShutdownRegistrar for SignalRegistrar {
    fn register_once(&self, hook: ShutdownHook) -> Result<(), RegistrarError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| RegistrarError::NoRuntime)?;

        if self.armed.swap(true, Ordering::SeqCst) {
            return Err(RegistrarError::AlreadyRegistered);
        }

        // signal() must be called inside the runtime context
        let _guard = handle.enter();
        let mut signals = match TerminationSignals::install() {
            Ok(signals) => signals,
            Err(e) => {
                self.armed.store(false, Ordering::SeqCst);
                return Err(RegistrarError::SignalInstall(e));
            }
        };
        let on_repeat = Arc::clone(&self.on_repeat);

        handle.spawn(async move {
            let Some(signal) = signals.recv().await else {
                error!("Termination signal listener closed before any signal");
                return;
            };
            info!(%signal, "Termination signal received");
            hook.await;

            while let Some(signal) = signals.recv().await {
                warn!(%signal, "Termination signal received after shutdown, exiting");
                on_repeat(signal);
            }
        });

        Ok(())
    }
}

#[cfg(unix)]
struct TerminationSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(TerminationSignal::Interrupt),
            Some(()) = self.terminate.recv() => Some(TerminationSignal::Terminate),
            else => None,
        }
    }
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<TerminationSignal> {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(TerminationSignal::Interrupt),
            Err(e) => {
                error!(error = %e, "Termination signal listener failed");
                None
            }
        }
    }
}
