//! Broker connection establishment
//!
//! Opens one connection, derives one channel and arms the shutdown
//! coordinator for the pair. [`ConnectionEstablisher::establish`] never
//! fails loudly: it logs exactly one line and returns `Some(channel)` or
//! `None`.

use crate::broker_span;
use crate::error::{redact_endpoint, sanitize_error_message};
use crate::lifecycle::registrar::{RegistrarError, ShutdownRegistrar};
use crate::lifecycle::shutdown::{
    close_within, CloseStep, ShutdownCoordinator, ShutdownWatch, DEFAULT_CLOSE_TIMEOUT,
};
use crate::transport::{BrokerConnector, Closeable};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, Instrument};

/// Operation name attached to establishment log lines
pub const OPERATION: &str = "create_connection";

/// Why establishment failed
#[derive(Debug, Error)]
pub enum EstablishError {
    #[error("connect failed: {0}")]
    Connect(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("create_channel failed: {0}")]
    CreateChannel(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("register_shutdown failed: {0}")]
    RegisterShutdown(#[source] RegistrarError),
}

impl EstablishError {
    /// The step that failed
    pub fn operation(&self) -> &'static str {
        match self {
            EstablishError::Connect(_) => "connect",
            EstablishError::CreateChannel(_) => "create_channel",
            EstablishError::RegisterShutdown(_) => "register_shutdown",
        }
    }
}

/// A live channel together with the progress of its shutdown sequence
pub struct Established<Ch> {
    pub channel: Ch,
    pub shutdown: ShutdownWatch,
}

/// Opens the broker connection and arms its shutdown
pub struct ConnectionEstablisher<C, R> {
    connector: C,
    registrar: R,
    close_timeout: Duration,
}

impl<C, R> ConnectionEstablisher<C, R>
where
    C: BrokerConnector,
    R: ShutdownRegistrar,
{
    pub fn new(connector: C, registrar: R) -> Self {
        Self {
            connector,
            registrar,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Bound for each close in the shutdown sequence
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    /// Connect and return the channel, or `None` on any failure
    pub async fn establish(&self, endpoint: &str, connection_name: &str) -> Option<C::Channel> {
        self.establish_watched(endpoint, connection_name)
            .await
            .map(|established| established.channel)
    }

    /// Like [`establish`](Self::establish), also returning the shutdown watch
    pub async fn establish_watched(
        &self,
        endpoint: &str,
        connection_name: &str,
    ) -> Option<Established<C::Channel>> {
        let span = broker_span!(operation = OPERATION, connection_name = %connection_name);

        async {
            match self.try_establish(endpoint, connection_name).await {
                Ok(established) => {
                    info!(
                        endpoint = %redact_endpoint(endpoint),
                        "Broker connected successfully"
                    );
                    Some(established)
                }
                Err(e) => {
                    error!(
                        step = e.operation(),
                        endpoint = %redact_endpoint(endpoint),
                        error = %sanitize_error_message(&e.to_string()),
                        "Failed to connect to broker in {}",
                        OPERATION
                    );
                    None
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Connect, derive the channel and arm shutdown, reporting the cause on failure
    ///
    /// Logs nothing above DEBUG. Resources created before a failing step are
    /// closed on a best-effort basis, each within the close timeout; nothing
    /// is closed when the connect itself fails.
    pub async fn try_establish(
        &self,
        endpoint: &str,
        connection_name: &str,
    ) -> Result<Established<C::Channel>, EstablishError> {
        let connection = self
            .connector
            .connect(endpoint, connection_name)
            .await
            .map_err(|e| EstablishError::Connect(Box::new(e)))?;
        let connection = Arc::new(connection);

        let channel = match self.connector.create_channel(&connection).await {
            Ok(channel) => channel,
            Err(e) => {
                self.discard(&connection, CloseStep::Connection).await;
                return Err(EstablishError::CreateChannel(Box::new(e)));
            }
        };

        let coordinator = ShutdownCoordinator::new(channel.clone(), Arc::clone(&connection))
            .with_close_timeout(self.close_timeout);

        match coordinator.arm(&self.registrar) {
            Ok(shutdown) => Ok(Established { channel, shutdown }),
            Err(e) => {
                self.discard(&channel, CloseStep::Channel).await;
                self.discard(&connection, CloseStep::Connection).await;
                Err(EstablishError::RegisterShutdown(e))
            }
        }
    }

    /// Best-effort close of a resource left over from a failed step
    ///
    /// The failing step is what gets reported, so a cleanup failure only
    /// shows up at DEBUG.
    async fn discard<T>(&self, resource: &T, step: CloseStep)
    where
        T: Closeable + ?Sized,
    {
        if let Err(e) = close_within(resource, step, self.close_timeout).await {
            debug!(
                %step,
                error = %sanitize_error_message(&e.to_string()),
                "Cleanup close failed"
            );
        }
    }
}
