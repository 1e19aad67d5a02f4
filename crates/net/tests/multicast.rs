use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use meshnet::{Encoding, EndpointConfig, MulticastClient, MulticastServer, NetError};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(43000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

fn group_config(host: &str, port: u16) -> EndpointConfig {
    EndpointConfig {
        host: host.to_owned(),
        port,
        ..Default::default()
    }
}

#[test]
fn test_server_rejects_address_outside_multicast_range() {
    let err = MulticastServer::join(group_config("10.0.0.1", next_port())).unwrap_err();

    match err {
        NetError::InvalidAddress { addr, .. } => assert_eq!(addr, "10.0.0.1"),
        other => panic!("expected an invalid-address error, got {:?}", other),
    }
}

#[test]
fn test_client_rejects_address_outside_multicast_range() {
    let err = MulticastClient::new(group_config("192.168.1.50", next_port())).unwrap_err();
    assert!(matches!(err, NetError::InvalidAddress { .. }));
}

#[test]
fn test_client_rejects_resolved_unicast_hostname() {
    let err = MulticastClient::new(group_config("localhost", next_port())).unwrap_err();
    assert!(matches!(err, NetError::InvalidAddress { .. }));
}

#[test]
fn test_server_joins_group_in_range() {
    let server = MulticastServer::join(group_config("224.1.1.1", next_port())).unwrap();
    assert_eq!(server.local_addr().ip().to_string(), "224.1.1.1");
}

#[test]
fn test_client_accepts_group_in_range() {
    assert!(MulticastClient::new(group_config("224.1.1.1", next_port())).is_ok());
}

#[test]
fn test_non_blocking_listen_times_out() {
    let mut config = group_config("224.1.1.1", next_port());
    config.blocking = false;
    config.timeout_secs = Some(0.2);
    let mut server = MulticastServer::join(config).unwrap();

    let start = Instant::now();
    let err = server.listen(Encoding::Raw).unwrap_err();

    assert!(matches!(err, NetError::Socket { .. }));
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_send_revalidates_mutated_group() {
    let mut client = MulticastClient::new(group_config("224.1.1.1", next_port())).unwrap();

    // The group was valid at construction; a later edit must be caught on
    // the next send.
    client.config.host = "10.0.0.1".to_owned();
    let err = client
        .send(&meshnet::Payload::from("late"), Encoding::Raw)
        .unwrap_err();
    assert!(matches!(err, NetError::InvalidAddress { .. }));
}
