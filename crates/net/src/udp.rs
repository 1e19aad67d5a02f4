use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use crate::codec::{self, Encoding, Payload};
use crate::config::EndpointConfig;
use crate::error::NetError;
use crate::transmission::Transmission;

const POLL_SLICE: Duration = Duration::from_millis(5);

/// Connectionless server. One datagram per `listen()` call.
pub struct UdpServer {
    pub config: EndpointConfig,
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpServer {
    pub fn bind(mut config: EndpointConfig) -> Result<Self, NetError> {
        if config.identifier.is_empty() {
            config.identifier = "Anonymous UDP Server".to_owned();
        }
        config.validate()?;

        let addr = config.socket_addr()?;
        let socket = open_socket(addr, &config)
            .map_err(|e| NetError::address(&config.identifier, addr.to_string(), e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| NetError::socket(&config.identifier, e))?;

        log::info!("{} opened on {}", config.identifier, local_addr);

        Ok(Self {
            config,
            socket,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receives one datagram of up to `buffer_size` bytes. No
    /// acknowledgment is sent; UDP exchanges are one-way at this layer.
    pub fn listen(&mut self, encoding: Encoding) -> Result<Transmission, NetError> {
        self.config.validate()?;

        let mut buf = vec![0u8; self.config.buffer_size];
        let (received, sender) = recv_bounded(&self.socket, &mut buf, &self.config)?;

        let content = codec::decode(&buf[..received], encoding)
            .map_err(|e| NetError::codec(&self.config.identifier, e))?;
        let transmission = Transmission::new(content, sender, self.local_addr);

        if self.config.preview_len > 0 {
            log::info!(
                "{} received: {}...",
                self.config.identifier,
                transmission.preview(self.config.preview_len)
            );
        }

        Ok(transmission)
    }
}

fn open_socket(addr: SocketAddr, config: &EndpointConfig) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(!config.blocking)?;
    Ok(socket.into())
}

/// One `recv_from`, either blocking or bounded by the configured poll
/// window. Shared with the multicast server.
pub(crate) fn recv_bounded(
    socket: &UdpSocket,
    buf: &mut [u8],
    config: &EndpointConfig,
) -> Result<(usize, SocketAddr), NetError> {
    // The blocking flag may have been edited since the last call.
    socket
        .set_nonblocking(!config.blocking)
        .map_err(|e| NetError::socket(&config.identifier, e))?;

    if config.blocking {
        return socket
            .recv_from(buf)
            .map_err(|e| NetError::socket(&config.identifier, e));
    }

    let deadline = Instant::now() + config.timeout().unwrap_or(Duration::ZERO);
    loop {
        match socket.recv_from(buf) {
            Ok(pair) => return Ok(pair),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(NetError::socket(
                        &config.identifier,
                        io::Error::new(io::ErrorKind::TimedOut, "no datagram within the poll window"),
                    ));
                }
                std::thread::sleep(POLL_SLICE.min(deadline - now));
            }
            Err(e) => return Err(NetError::socket(&config.identifier, e)),
        }
    }
}

/// Fire-and-forget datagram client. The socket is created once and reused
/// across sends.
pub struct UdpClient {
    pub config: EndpointConfig,
    socket: UdpSocket,
}

impl UdpClient {
    pub fn new(mut config: EndpointConfig) -> Result<Self, NetError> {
        if config.identifier.is_empty() {
            config.identifier = "Anonymous UDP Client".to_owned();
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|e| NetError::address(&config.identifier, "0.0.0.0:0", e))?;

        Ok(Self { config, socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.socket
            .local_addr()
            .map_err(|e| NetError::socket(&self.config.identifier, e))
    }

    /// Hands one datagram to the local transport. Success means handed
    /// off, not delivered; there is no confirmation at this layer.
    pub fn send(&self, payload: &Payload, encoding: Encoding) -> Result<Transmission, NetError> {
        self.config.validate()?;

        let data = codec::encode(payload, encoding)
            .map_err(|e| NetError::codec(&self.config.identifier, e))?;
        let target = self.config.socket_addr()?;

        self.socket
            .send_to(&data, target)
            .map_err(|e| NetError::socket(&self.config.identifier, e))?;

        let local_addr = self.local_addr()?;
        Ok(Transmission::new(payload.clone(), local_addr, target))
    }
}
