use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::NetError;

pub const DEFAULT_PORT: u16 = 10000;
pub const MAX_BUFFER_SIZE: usize = 4096;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Options shared by every endpoint. Fields are public so a caller can
/// adjust them between calls; endpoints re-validate on every listen/send,
/// not just at construction.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    /// When false, listen() polls for up to `timeout_secs` instead of
    /// blocking indefinitely.
    pub blocking: bool,
    /// Poll bound in non-blocking mode; connect/IO deadline for TCP
    /// clients.
    pub timeout_secs: Option<f64>,
    /// Label attached to every log line and error from this endpoint.
    pub identifier: String,
    /// Receive size per call, in bytes. 0 is a valid (always-empty)
    /// degenerate configuration.
    pub buffer_size: usize,
    /// Listen backlog for TCP servers.
    pub max_connections: u32,
    /// Fixed reply a TCP server writes back after each accepted message.
    pub ack: Option<Vec<u8>>,
    /// Content bytes logged on receipt; 0 disables the preview line.
    pub preview_len: usize,
    /// Hop limit for multicast sends.
    pub ttl: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host().to_string(),
            port: DEFAULT_PORT,
            blocking: true,
            timeout_secs: None,
            identifier: String::new(),
            buffer_size: MAX_BUFFER_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            ack: None,
            preview_len: 0,
            ttl: 1,
        }
    }
}

impl EndpointConfig {
    /// Checks the option combination shared by every endpoint. Pure; first
    /// violation wins.
    pub fn validate(&self) -> Result<(), NetError> {
        match self.timeout_secs {
            None if !self.blocking => {
                return Err(NetError::config(&self.identifier, "invalid timeout"));
            }
            Some(timeout) if !timeout.is_finite() || timeout < 0.0 => {
                return Err(NetError::config(&self.identifier, "invalid timeout"));
            }
            _ => {}
        }

        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(NetError::config(&self.identifier, "invalid buffer size"));
        }

        Ok(())
    }

    /// Validation for TCP servers, which also enforce a connection limit.
    pub fn validate_listener(&self) -> Result<(), NetError> {
        self.validate()?;

        if self.max_connections < 1 {
            return Err(NetError::config(&self.identifier, "invalid connection limit"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|timeout| timeout.is_finite() && *timeout >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Resolves `host:port` to the first usable socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, NetError> {
        let endpoint = format!("{}:{}", self.host, self.port);

        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| NetError::address(&self.identifier, endpoint.clone(), e))?
            .next()
            .ok_or_else(|| {
                NetError::address(
                    &self.identifier,
                    endpoint,
                    io::Error::new(io::ErrorKind::NotFound, "hostname resolved to no addresses"),
                )
            })
    }
}

/// Resolves this machine's primary outbound address, falling back to
/// loopback when nothing is routable. Resolved per call so endpoint
/// instances never share a stale default.
pub fn default_host() -> IpAddr {
    fn probe() -> io::Result<IpAddr> {
        // Connecting a UDP socket selects a source address without
        // sending any traffic.
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(("8.8.8.8", 53))?;
        Ok(socket.local_addr()?.ip())
    }

    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
