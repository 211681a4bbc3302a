//! Connection lifecycle: establishment and ordered shutdown
//!
//! [`ConnectionEstablisher`] opens the connection and channel, then arms a
//! [`ShutdownCoordinator`] through a [`ShutdownRegistrar`]. The coordinator is
//! the only component that closes either resource.

pub mod establisher;
pub mod registrar;
pub mod shutdown;

pub use establisher::{ConnectionEstablisher, EstablishError, Established};
pub use registrar::{
    RegistrarError, RepeatSignalAction, ShutdownHook, ShutdownRegistrar, SignalRegistrar,
    TerminationSignal,
};
pub use shutdown::{
    CloseStep, ShutdownCoordinator, ShutdownError, ShutdownState, ShutdownWatch,
    DEFAULT_CLOSE_TIMEOUT,
};
