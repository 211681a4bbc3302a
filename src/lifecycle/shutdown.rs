//! Ordered, one-shot shutdown of a channel and its connection
//!
//! The coordinator closes the channel first and the connection second, each
//! bounded by a timeout. A failed or timed-out close is logged and the
//! sequence carries on, so the connection is always attempted. Progress is
//! published on a [`ShutdownWatch`]:
//!
//! ```text
//! Armed -> Closing(Channel) -> Closing(Connection) -> Closed { clean }
//! ```

use crate::error::sanitize_error_message;
use crate::lifecycle::registrar::{RegistrarError, ShutdownRegistrar};
use crate::lifecycle_span;
use crate::transport::Closeable;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, Instrument, Span};

/// Default upper bound for a single close operation
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Which resource is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStep {
    Channel,
    Connection,
}

impl fmt::Display for CloseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseStep::Channel => f.write_str("channel"),
            CloseStep::Connection => f.write_str("connection"),
        }
    }
}

/// Shutdown progress for one channel/connection pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Registered, waiting for the termination signal
    Armed,
    /// Close sequence running; the step is the resource currently being closed
    Closing(CloseStep),
    /// Terminal; `clean` is false when any close failed or timed out
    Closed { clean: bool },
}

impl ShutdownState {
    pub fn is_closed(&self) -> bool {
        matches!(self, ShutdownState::Closed { .. })
    }
}

/// Errors raised while closing broker resources
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Channel close failed: {0}")]
    ChannelClose(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Connection close failed: {0}")]
    ConnectionClose(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Timed out closing {step} after {timeout:?}")]
    Timeout { step: CloseStep, timeout: Duration },
    #[error("Shutdown sequence was dropped before it completed")]
    Abandoned,
}

/// Read side of a coordinator's progress
#[derive(Debug, Clone)]
pub struct ShutdownWatch {
    rx: watch::Receiver<ShutdownState>,
}

impl ShutdownWatch {
    /// Current state
    pub fn state(&self) -> ShutdownState {
        *self.rx.borrow()
    }

    /// Wait until the close sequence finishes
    ///
    /// Returns `Err(ShutdownError::Abandoned)` when the hook was dropped
    /// without running, for example because the runtime shut down first.
    pub async fn wait_closed(&mut self) -> Result<bool, ShutdownError> {
        loop {
            let current = *self.rx.borrow_and_update();
            if let ShutdownState::Closed { clean } = current {
                return Ok(clean);
            }
            if self.rx.changed().await.is_err() {
                return match *self.rx.borrow() {
                    ShutdownState::Closed { clean } => Ok(clean),
                    _ => Err(ShutdownError::Abandoned),
                };
            }
        }
    }
}

/// Closes a channel and then its connection when the process terminates
pub struct ShutdownCoordinator<Ch, Conn> {
    channel: Ch,
    connection: Conn,
    close_timeout: Duration,
}

impl<Ch, Conn> ShutdownCoordinator<Ch, Conn>
where
    Ch: Closeable + 'static,
    Conn: Closeable + 'static,
{
    pub fn new(channel: Ch, connection: Conn) -> Self {
        Self {
            channel,
            connection,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// Register the close sequence with `registrar`
    ///
    /// Nothing is closed now. The returned watch reports `Armed` until the
    /// registrar fires the hook.
    pub fn arm<R>(self, registrar: &R) -> Result<ShutdownWatch, RegistrarError>
    where
        R: ShutdownRegistrar + ?Sized,
    {
        let (tx, rx) = watch::channel(ShutdownState::Armed);
        // Runs long after the arming call returns, so it must not nest under it
        let span = lifecycle_span!(parent: None, event = "shutdown");
        span.follows_from(Span::current());

        registrar.register_once(Box::pin(self.run(tx).instrument(span)))?;

        Ok(ShutdownWatch { rx })
    }

    async fn run(self, state: watch::Sender<ShutdownState>) {
        info!("Shutdown sequence started");

        state.send_replace(ShutdownState::Closing(CloseStep::Channel));
        let channel_result =
            close_within(&self.channel, CloseStep::Channel, self.close_timeout).await;
        if let Err(e) = &channel_result {
            error!(
                step = %CloseStep::Channel,
                error = %sanitize_error_message(&e.to_string()),
                "Failed to close channel, closing connection anyway"
            );
        }

        state.send_replace(ShutdownState::Closing(CloseStep::Connection));
        let connection_result =
            close_within(&self.connection, CloseStep::Connection, self.close_timeout).await;
        if let Err(e) = &connection_result {
            error!(
                step = %CloseStep::Connection,
                error = %sanitize_error_message(&e.to_string()),
                "Failed to close connection"
            );
        }

        let clean = channel_result.is_ok() && connection_result.is_ok();
        state.send_replace(ShutdownState::Closed { clean });
        info!(clean, "Shutdown sequence complete");
    }
}

/// Close `resource`, giving up after `close_timeout`
pub(crate) async fn close_within<C>(
    resource: &C,
    step: CloseStep,
    close_timeout: Duration,
) -> Result<(), ShutdownError>
where
    C: Closeable + ?Sized,
{
    match timeout(close_timeout, resource.close()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(match step {
            CloseStep::Channel => ShutdownError::ChannelClose(Box::new(e)),
            CloseStep::Connection => ShutdownError::ConnectionClose(Box::new(e)),
        }),
        Err(_) => Err(ShutdownError::Timeout {
            step,
            timeout: close_timeout,
        }),
    }
}
