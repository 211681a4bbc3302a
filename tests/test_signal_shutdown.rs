//! Real OS signal delivery to `SignalRegistrar`
//!
//! Kept in its own test binary: the signals are sent to this process, so no
//! other test may share it.

#![cfg(unix)]

use amqp_link::lifecycle::{ConnectionEstablisher, SignalRegistrar, TerminationSignal};
use amqp_link::testing::MockConnector;
use std::process::Command;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn send_sigint_to_self() {
    let status = Command::new("kill")
        .args(["-INT", &std::process::id().to_string()])
        .status()
        .expect("kill should be available");
    assert!(status.success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sigint_runs_shutdown_once_then_ends_process_on_next_signal() {
    let (repeat_tx, mut repeat_rx) = mpsc::unbounded_channel();
    let registrar = SignalRegistrar::new().with_repeat_action(move |signal| {
        let _ = repeat_tx.send(signal);
    });
    let establisher = ConnectionEstablisher::new(MockConnector::new(), registrar);

    let established = establisher
        .establish_watched("amqp://valid-host:5672", "order-service")
        .await
        .expect("mock broker is reachable");
    let mut shutdown = established.shutdown;
    assert!(establisher.registrar().is_armed());

    send_sigint_to_self();
    let clean = timeout(Duration::from_secs(5), shutdown.wait_closed())
        .await
        .expect("first SIGINT should run the shutdown sequence")
        .unwrap();
    assert!(clean);

    let connector = establisher.connector();
    assert_eq!(connector.channel.close_calls(), 1);
    assert_eq!(connector.connection.close_calls(), 1);
    assert_eq!(
        connector.log.entries(),
        vec![
            "connect",
            "create_channel",
            "channel.close.begin",
            "channel.close.end",
            "connection.close.begin",
            "connection.close.end",
        ]
    );

    // The listener is still installed and now takes the terminal action
    send_sigint_to_self();
    let repeated = timeout(Duration::from_secs(5), repeat_rx.recv())
        .await
        .expect("second SIGINT should reach the listener");
    assert_eq!(repeated, Some(TerminationSignal::Interrupt));
    assert_eq!(TerminationSignal::Interrupt.exit_code(), 130);

    assert_eq!(connector.channel.close_calls(), 1);
    assert_eq!(connector.connection.close_calls(), 1);
}
