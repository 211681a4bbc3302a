//! amqp-link - AMQP connection lifecycle management
//!
//! Opens a single connection to an AMQP 0-9-1 broker, derives one channel from
//! it and hands that channel to the application. The channel and connection are
//! closed exactly once, channel first, when the process receives a termination
//! signal.
//!
//! # Overview
//!
//! - [`lifecycle::ConnectionEstablisher`] connects, derives the channel and
//!   arms the shutdown sequence. Failure is reported as `None`, never a panic.
//! - [`lifecycle::ShutdownCoordinator`] closes the channel, then the connection,
//!   once, when its registrar fires.
//! - [`transport`] holds the narrow traits the lifecycle depends on and the
//!   `lapin` implementation behind them.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use amqp_link::lifecycle::{ConnectionEstablisher, SignalRegistrar};
//! use amqp_link::transport::amqp::AmqpConnector;
//!
//! # tokio_test::block_on(async {
//! let establisher = ConnectionEstablisher::new(AmqpConnector::new(), SignalRegistrar::new());
//!
//! match establisher.establish("amqp://localhost:5672", "order-service").await {
//!     Some(channel) => {
//!         // hand the channel to the messaging layer
//!         let _ = channel;
//!     }
//!     None => std::process::exit(1),
//! }
//! # });
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, ServiceConfig};
pub use error::{LinkError, LinkResult};
pub use lifecycle::{
    ConnectionEstablisher, EstablishError, ShutdownCoordinator, ShutdownError, ShutdownRegistrar,
    ShutdownState, ShutdownWatch, SignalRegistrar,
};
pub use transport::{BrokerConnector, Closeable};
