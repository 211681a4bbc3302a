//! Mock implementations for testing
//!
//! Provides a mock connector, closeable resources that record what happened
//! to them, and a registrar whose "signal" is delivered by hand.

use crate::lifecycle::registrar::{RegistrarError, ShutdownHook, ShutdownRegistrar};
use crate::transport::{BrokerConnector, Closeable};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Errors produced by the mocks
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MockError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),
    #[error("Channel creation rejected by broker")]
    ChannelRejected,
    #[error("Mock close failure for {0}")]
    CloseFailed(String),
}

/// Ordered record of calls shared between mocks
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CloseBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Closeable resource that records `<name>.close.begin` / `<name>.close.end`
///
/// Clones share the call counter, so a test can keep one clone and hand the
/// other to the code under test.
#[derive(Debug, Clone)]
pub struct MockCloseable {
    name: String,
    log: CallLog,
    behavior: CloseBehavior,
    close_calls: Arc<AtomicUsize>,
}

impl MockCloseable {
    pub fn new(name: &str, log: CallLog) -> Self {
        Self::with_behavior(name, log, CloseBehavior::Succeed)
    }

    /// Close returns an error after recording its start
    pub fn failing(name: &str, log: CallLog) -> Self {
        Self::with_behavior(name, log, CloseBehavior::Fail)
    }

    /// Close never completes
    pub fn hanging(name: &str, log: CallLog) -> Self {
        Self::with_behavior(name, log, CloseBehavior::Hang)
    }

    fn with_behavior(name: &str, log: CallLog, behavior: CloseBehavior) -> Self {
        Self {
            name: name.to_string(),
            log,
            behavior,
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Closeable for MockCloseable {
    type Error = MockError;

    async fn close(&self) -> Result<(), Self::Error> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.log.record(format!("{}.close.begin", self.name));

        // Let other tasks run so an overlapping close would show up in the log
        tokio::task::yield_now().await;

        match self.behavior {
            CloseBehavior::Succeed => {
                self.log.record(format!("{}.close.end", self.name));
                Ok(())
            }
            CloseBehavior::Fail => Err(MockError::CloseFailed(self.name.clone())),
            CloseBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Connector that hands out pre-built [`MockCloseable`] handles
#[derive(Debug, Clone)]
pub struct MockConnector {
    pub log: CallLog,
    pub connection: MockCloseable,
    pub channel: MockCloseable,
    refuse_connect: bool,
    reject_channel: bool,
    connect_attempts: Arc<AtomicUsize>,
    connection_names: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        let log = CallLog::new();
        Self {
            connection: MockCloseable::new("connection", log.clone()),
            channel: MockCloseable::new("channel", log.clone()),
            log,
            refuse_connect: false,
            reject_channel: false,
            connect_attempts: Arc::new(AtomicUsize::new(0)),
            connection_names: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect attempt is refused
    pub fn unreachable() -> Self {
        Self {
            refuse_connect: true,
            ..Self::default()
        }
    }

    /// Connect succeeds but the broker rejects the channel
    pub fn rejecting_channels() -> Self {
        Self {
            reject_channel: true,
            ..Self::default()
        }
    }

    /// Closing the handed-out connection or channel never completes
    pub fn hanging_on_close(mut self) -> Self {
        self.connection = MockCloseable::hanging(self.connection.name(), self.log.clone());
        self.channel = MockCloseable::hanging(self.channel.name(), self.log.clone());
        self
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Connection names passed to `connect`, in call order
    pub fn connection_names(&self) -> Vec<String> {
        lock(&self.connection_names).clone()
    }
}

#[async_trait]
impl BrokerConnector for MockConnector {
    type Connection = MockCloseable;
    type Channel = MockCloseable;
    type Error = MockError;

    async fn connect(
        &self,
        endpoint: &str,
        connection_name: &str,
    ) -> Result<Self::Connection, Self::Error> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        lock(&self.connection_names).push(connection_name.to_string());

        if self.refuse_connect {
            return Err(MockError::ConnectionRefused(endpoint.to_string()));
        }

        self.log.record("connect");
        Ok(self.connection.clone())
    }

    async fn create_channel(
        &self,
        _connection: &Self::Connection,
    ) -> Result<Self::Channel, Self::Error> {
        if self.reject_channel {
            return Err(MockError::ChannelRejected);
        }

        self.log.record("create_channel");
        Ok(self.channel.clone())
    }
}

/// Registrar whose termination signal is delivered with [`ManualRegistrar::trigger`]
#[derive(Default)]
pub struct ManualRegistrar {
    hook: Mutex<Option<ShutdownHook>>,
    registrations: AtomicUsize,
    fired: AtomicUsize,
    refuse: bool,
}

impl ManualRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration fails as if the signal handler could not be installed
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Number of successful registrations
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Number of times a hook actually ran
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    /// Deliver the termination signal
    ///
    /// Runs the registered hook to completion and returns `true`, or returns
    /// `false` when there is nothing left to run.
    pub async fn trigger(&self) -> bool {
        let hook = lock(&self.hook).take();
        match hook {
            Some(hook) => {
                self.fired.fetch_add(1, Ordering::SeqCst);
                hook.await;
                true
            }
            None => false,
        }
    }
}

impl ShutdownRegistrar for ManualRegistrar {
    fn register_once(&self, hook: ShutdownHook) -> Result<(), RegistrarError> {
        if self.refuse {
            return Err(RegistrarError::SignalInstall(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mock signal handler refused",
            )));
        }

        let mut slot = lock(&self.hook);
        if slot.is_some() || self.registrations() > 0 {
            return Err(RegistrarError::AlreadyRegistered);
        }
        *slot = Some(hook);
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
