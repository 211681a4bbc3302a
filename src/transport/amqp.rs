//! AMQP 0-9-1 transport backed by `lapin`
//!
//! Endpoint validation and connection properties are pure functions so they
//! can be tested without a broker. [`AmqpConnector`] is the only piece that
//! performs network I/O.

use crate::error::redact_endpoint;
use crate::transport::{BrokerConnector, Closeable};
use lapin::{Channel, Connection, ConnectionProperties};
use thiserror::Error;
use url::Url;

/// AMQP reply code for a normal close
pub const NORMAL_SHUTDOWN_CODE: u16 = 200;

/// Reply text sent with a normal close
pub const NORMAL_SHUTDOWN_TEXT: &str = "normal shutdown";

/// AMQP transport errors
#[derive(Debug, Error)]
pub enum AmqpError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] lapin::Error),
    #[error("Channel creation failed: {0}")]
    ChannelFailed(#[source] lapin::Error),
    #[error("Close failed: {0}")]
    CloseFailed(#[source] lapin::Error),
}

/// Check that `endpoint` is an `amqp://` or `amqps://` URL with a host
pub fn validate_endpoint(endpoint: &str) -> Result<Url, AmqpError> {
    let invalid = || AmqpError::InvalidBrokerUrl(redact_endpoint(endpoint));

    let url = Url::parse(endpoint).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "amqp" | "amqps") {
        return Err(invalid());
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }

    Ok(url)
}

/// Build connection properties carrying `connection_name` as a client property,
/// which the broker shows in its management UI
pub fn connection_properties(connection_name: &str) -> ConnectionProperties {
    ConnectionProperties::default().with_connection_name(connection_name.into())
}

/// `lapin`-backed connector used in production
#[derive(Debug, Clone, Default)]
pub struct AmqpConnector;

impl AmqpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl BrokerConnector for AmqpConnector {
    type Connection = Connection;
    type Channel = Channel;
    type Error = AmqpError;

    async fn connect(
        &self,
        endpoint: &str,
        connection_name: &str,
    ) -> Result<Self::Connection, Self::Error> {
        validate_endpoint(endpoint)?;
        Connection::connect(endpoint, connection_properties(connection_name))
            .await
            .map_err(AmqpError::ConnectionFailed)
    }

    async fn create_channel(
        &self,
        connection: &Self::Connection,
    ) -> Result<Self::Channel, Self::Error> {
        connection
            .create_channel()
            .await
            .map_err(AmqpError::ChannelFailed)
    }
}

#[async_trait::async_trait]
impl Closeable for Channel {
    type Error = AmqpError;

    async fn close(&self) -> Result<(), Self::Error> {
        Channel::close(self, NORMAL_SHUTDOWN_CODE, NORMAL_SHUTDOWN_TEXT)
            .await
            .map_err(AmqpError::CloseFailed)
    }
}

#[async_trait::async_trait]
impl Closeable for Connection {
    type Error = AmqpError;

    async fn close(&self) -> Result<(), Self::Error> {
        Connection::close(self, NORMAL_SHUTDOWN_CODE, NORMAL_SHUTDOWN_TEXT)
            .await
            .map_err(AmqpError::CloseFailed)
    }
}
