use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use crate::codec::{self, Encoding, Payload};
use crate::config::EndpointConfig;
use crate::error::NetError;
use crate::transmission::Transmission;

const POLL_SLICE: Duration = Duration::from_millis(5);

/// Connection-oriented server. The listening socket is created once at
/// construction and lives until the instance is dropped.
#[derive(Debug)]
pub struct TcpServer {
    pub config: EndpointConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpServer {
    /// Binds and starts listening with `max_connections` as the backlog.
    /// A bind failure (address in use, permission denied) is fatal for
    /// this instance and is never retried.
    pub fn bind(mut config: EndpointConfig) -> Result<Self, NetError> {
        if config.identifier.is_empty() {
            config.identifier = "Anonymous TCP Server".to_owned();
        }
        config.validate_listener()?;

        let addr = config.socket_addr()?;
        let listener = open_listener(addr, &config)
            .map_err(|e| NetError::address(&config.identifier, addr.to_string(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NetError::socket(&config.identifier, e))?;

        log::info!("{} opened on {}", config.identifier, local_addr);

        Ok(Self {
            config,
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts one connection and returns its first message.
    ///
    /// Exactly one buffer-sized chunk is read per accepted connection;
    /// payloads longer than `buffer_size` arrive truncated. One logical
    /// message per connection is the wire contract at this layer, not a
    /// reassembly bug.
    ///
    /// Validation re-runs on entry so configuration edits made between
    /// calls take effect. Socket failures are returned to the caller and
    /// leave the listener usable for the next call.
    pub fn listen(&mut self, encoding: Encoding) -> Result<Transmission, NetError> {
        self.config.validate_listener()?;

        let (mut connection, peer) = self.accept()?;

        let mut buf = vec![0u8; self.config.buffer_size];
        let received = if buf.is_empty() {
            0
        } else {
            connection
                .read(&mut buf)
                .map_err(|e| NetError::socket(&self.config.identifier, e))?
        };

        if let Some(ack) = &self.config.ack {
            connection
                .write_all(ack)
                .map_err(|e| NetError::socket(&self.config.identifier, e))?;
        }

        let content = codec::decode(&buf[..received], encoding)
            .map_err(|e| NetError::codec(&self.config.identifier, e))?;
        let transmission = Transmission::new(content, peer, self.local_addr);

        if self.config.preview_len > 0 {
            log::info!(
                "{} received: {}...",
                self.config.identifier,
                transmission.preview(self.config.preview_len)
            );
        }

        Ok(transmission)
    }

    fn accept(&self) -> Result<(TcpStream, SocketAddr), NetError> {
        // The blocking flag may have been edited since the last call.
        self.listener
            .set_nonblocking(!self.config.blocking)
            .map_err(|e| NetError::socket(&self.config.identifier, e))?;

        if self.config.blocking {
            return self
                .listener
                .accept()
                .map_err(|e| NetError::socket(&self.config.identifier, e));
        }

        // Timed poll: the wait is bounded by timeout_secs, never
        // indefinite.
        let deadline = Instant::now() + self.config.timeout().unwrap_or(Duration::ZERO);
        loop {
            match self.listener.accept() {
                Ok((connection, peer)) => {
                    // Whether the accepted socket inherits the listener's
                    // non-blocking flag is platform-dependent.
                    connection
                        .set_nonblocking(false)
                        .map_err(|e| NetError::socket(&self.config.identifier, e))?;
                    return Ok((connection, peer));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(NetError::socket(
                            &self.config.identifier,
                            io::Error::new(
                                io::ErrorKind::TimedOut,
                                "no connection within the poll window",
                            ),
                        ));
                    }
                    std::thread::sleep(POLL_SLICE.min(deadline - now));
                }
                Err(e) => return Err(NetError::socket(&self.config.identifier, e)),
            }
        }
    }
}

fn open_listener(addr: SocketAddr, config: &EndpointConfig) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.bind(&addr.into())?;
    socket.listen(config.max_connections as i32)?;
    socket.set_nonblocking(!config.blocking)?;
    Ok(socket.into())
}

/// Connection-per-send client. No socket is held between calls, so one
/// client value can be reused for any number of sends.
pub struct TcpClient {
    pub config: EndpointConfig,
}

impl TcpClient {
    pub fn new(mut config: EndpointConfig) -> Self {
        if config.identifier.is_empty() {
            config.identifier = "Anonymous TCP Client".to_owned();
        }
        Self { config }
    }

    /// Connects, writes the whole encoded payload, then reads the response
    /// until the server closes the connection. The stream is dropped on
    /// every exit path, including timeouts.
    pub fn send(&self, payload: &Payload, encoding: Encoding) -> Result<Transmission, NetError> {
        self.config.validate()?;

        let data = codec::encode(payload, encoding)
            .map_err(|e| NetError::codec(&self.config.identifier, e))?;
        let addr = self.config.socket_addr()?;

        let stream = self.connect(addr)?;
        let local_addr = stream
            .local_addr()
            .map_err(|e| NetError::socket(&self.config.identifier, e))?;

        self.write_all_accumulating(&stream, &data)?;
        let response = self.read_to_close(&stream)?;

        let content = codec::decode(&response, encoding)
            .map_err(|e| NetError::codec(&self.config.identifier, e))?;
        Ok(Transmission::new(content, addr, local_addr))
    }

    fn connect(&self, addr: SocketAddr) -> Result<TcpStream, NetError> {
        // The OS layer rejects zero deadlines outright; a zero timeout
        // degrades to a blocking connect.
        let limit = self.config.timeout().filter(|limit| !limit.is_zero());

        let stream = match limit {
            Some(limit) => TcpStream::connect_timeout(&addr, limit),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| self.classify(e))?;

        stream
            .set_read_timeout(limit)
            .and_then(|_| stream.set_write_timeout(limit))
            .map_err(|e| NetError::socket(&self.config.identifier, e))?;

        Ok(stream)
    }

    /// A short write is accumulated, not an error; only a write reporting
    /// zero bytes with data remaining means the connection is broken.
    fn write_all_accumulating(&self, mut stream: &TcpStream, data: &[u8]) -> Result<(), NetError> {
        let mut sent = 0;
        while sent < data.len() {
            match stream.write(&data[sent..]) {
                Ok(0) => {
                    return Err(NetError::ConnectionBroken {
                        identifier: self.config.identifier.clone(),
                        remaining: data.len() - sent,
                    });
                }
                Ok(written) => sent += written,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.classify(e)),
            }
        }
        Ok(())
    }

    fn read_to_close(&self, mut stream: &TcpStream) -> Result<Vec<u8>, NetError> {
        let mut response = Vec::new();
        let mut chunk = vec![0u8; self.config.buffer_size];

        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(received) => response.extend_from_slice(&chunk[..received]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.classify(e)),
            }
        }

        Ok(response)
    }

    fn classify(&self, e: io::Error) -> NetError {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => NetError::Timeout {
                identifier: self.config.identifier.clone(),
                seconds: self.config.timeout_secs.unwrap_or(0.0),
            },
            _ => NetError::socket(&self.config.identifier, e),
        }
    }
}
