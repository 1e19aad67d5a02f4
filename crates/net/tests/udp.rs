use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use meshnet::{Encoding, EndpointConfig, NetError, Payload, UdpClient, UdpServer};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(42000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

fn local_config(port: u16) -> EndpointConfig {
    EndpointConfig {
        host: "127.0.0.1".to_owned(),
        port,
        ..Default::default()
    }
}

#[test]
fn test_datagram_exchange() {
    let port = next_port();
    let mut server = UdpServer::bind(local_config(port)).unwrap();
    let client = UdpClient::new(local_config(port)).unwrap();

    let sent = client.send(&Payload::from("ping"), Encoding::Raw).unwrap();
    let received = server.listen(Encoding::Raw).unwrap();

    assert_eq!(received.content.as_bytes(), b"ping");
    assert_eq!(received.receiver, server.local_addr());
    assert_eq!(received.sender.port(), sent.sender.port());
}

#[test]
fn test_send_reports_payload_and_target() {
    let port = next_port();
    let _server = UdpServer::bind(local_config(port)).unwrap();
    let client = UdpClient::new(local_config(port)).unwrap();

    let sent = client.send(&Payload::from("ping"), Encoding::Raw).unwrap();

    assert_eq!(sent.content, Payload::from("ping"));
    assert_eq!(sent.receiver.to_string(), format!("127.0.0.1:{}", port));
}

#[test]
fn test_serialized_payload_survives_the_wire() {
    let port = next_port();
    let mut server = UdpServer::bind(local_config(port)).unwrap();
    let client = UdpClient::new(local_config(port)).unwrap();

    let payload = Payload::Text("structured message".to_owned());
    client.send(&payload, Encoding::Serialized).unwrap();

    let received = server.listen(Encoding::Serialized).unwrap();
    assert_eq!(received.content, payload);
}

#[test]
fn test_zero_byte_buffer_is_a_usable_receive() {
    let port = next_port();
    let mut config = local_config(port);
    config.buffer_size = 0;
    let mut server = UdpServer::bind(config).unwrap();
    let client = UdpClient::new(local_config(port)).unwrap();

    client.send(&Payload::from("dropped"), Encoding::Raw).unwrap();

    let received = server.listen(Encoding::Raw).unwrap();
    assert!(received.content.is_empty());
}

#[test]
fn test_non_blocking_listen_times_out() {
    let port = next_port();
    let mut config = local_config(port);
    config.blocking = false;
    config.timeout_secs = Some(0.2);
    let mut server = UdpServer::bind(config).unwrap();

    let start = Instant::now();
    let err = server.listen(Encoding::Raw).unwrap_err();

    assert!(matches!(err, NetError::Socket { .. }));
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_non_blocking_listen_picks_up_waiting_datagram() {
    let port = next_port();
    let mut config = local_config(port);
    config.blocking = false;
    config.timeout_secs = Some(1.0);
    let mut server = UdpServer::bind(config).unwrap();
    let client = UdpClient::new(local_config(port)).unwrap();

    client.send(&Payload::from("queued"), Encoding::Raw).unwrap();

    let received = server.listen(Encoding::Raw).unwrap();
    assert_eq!(received.content.as_bytes(), b"queued");
}

#[test]
fn test_validation_blocks_oversized_buffer() {
    let port = next_port();
    let mut server = UdpServer::bind(local_config(port)).unwrap();

    server.config.buffer_size = 5000;
    let err = server.listen(Encoding::Raw).unwrap_err();
    assert!(matches!(err, NetError::Config { .. }));
}
