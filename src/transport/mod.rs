//! Transport layer for the broker connection
//!
//! This module provides the narrow abstractions the lifecycle code depends on
//! and the AMQP implementation of them.

pub mod amqp;

/// A broker resource that can be closed.
///
/// This is the only capability the shutdown sequence uses, so anything that
/// can be closed asynchronously can take part in it.
#[async_trait::async_trait]
pub trait Closeable: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Close the resource, waiting until the broker acknowledges it
    async fn close(&self) -> Result<(), Self::Error>;
}

/// Opens broker connections and derives channels from them
///
/// Abstracts over the broker client library to enable dependency injection
/// and testing without a running broker.
#[async_trait::async_trait]
pub trait BrokerConnector: Send + Sync {
    type Connection: Closeable + 'static;
    type Channel: Closeable + Clone + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a connection to `endpoint`, tagged with `connection_name` for the broker's operators
    async fn connect(
        &self,
        endpoint: &str,
        connection_name: &str,
    ) -> Result<Self::Connection, Self::Error>;

    /// Derive a new channel from an open connection
    async fn create_channel(
        &self,
        connection: &Self::Connection,
    ) -> Result<Self::Channel, Self::Error>;
}

#[async_trait::async_trait]
impl<T> Closeable for std::sync::Arc<T>
where
    T: Closeable + ?Sized,
{
    type Error = T::Error;

    async fn close(&self) -> Result<(), Self::Error> {
        (**self).close().await
    }
}
