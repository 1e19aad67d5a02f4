use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::codec::{self, Encoding, Payload};
use crate::config::EndpointConfig;
use crate::error::NetError;
use crate::transmission::Transmission;
use crate::udp::recv_bounded;

/// Resolves the configured host and checks it lies in the multicast range
/// (224.0.0.0/4 or an IPv6 multicast address).
fn group_address(config: &EndpointConfig) -> Result<IpAddr, NetError> {
    let ip = match config.host.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => config.socket_addr()?.ip(),
    };

    if !ip.is_multicast() {
        return Err(NetError::InvalidAddress {
            identifier: config.identifier.clone(),
            addr: config.host.clone(),
        });
    }

    Ok(ip)
}

/// Datagram server joined to a multicast group.
#[derive(Debug)]
pub struct MulticastServer {
    pub config: EndpointConfig,
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl MulticastServer {
    /// Resolves the group, binds to its port and joins it. An out-of-range
    /// address and a failed join are both fatal here.
    pub fn join(mut config: EndpointConfig) -> Result<Self, NetError> {
        if config.identifier.is_empty() {
            config.identifier = "Anonymous Multicast Server".to_owned();
        }
        config.validate()?;

        let group = group_address(&config)?;
        let socket = open_group_socket(group, &config).map_err(|e| {
            NetError::address(&config.identifier, format!("{}:{}", group, config.port), e)
        })?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| NetError::socket(&config.identifier, e))?;

        log::info!("{} joined {} on {}", config.identifier, group, local_addr);

        Ok(Self {
            config,
            socket,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receives one datagram from the group. Trailing NUL padding, which
    /// some transports append to short datagrams, is stripped before
    /// decoding.
    pub fn listen(&mut self, encoding: Encoding) -> Result<Transmission, NetError> {
        self.config.validate()?;

        let mut buf = vec![0u8; self.config.buffer_size];
        let (received, sender) = recv_bounded(&self.socket, &mut buf, &self.config)?;

        let mut end = received;
        while end > 0 && buf[end - 1] == 0 {
            end -= 1;
        }

        let content = codec::decode(&buf[..end], encoding)
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

fn open_group_socket(group: IpAddr, config: &EndpointConfig) -> io::Result<UdpSocket> {
    let domain = if group.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::new(group, config.port).into())?;
    socket.set_nonblocking(!config.blocking)?;

    let socket: UdpSocket = socket.into();
    match group {
        IpAddr::V4(v4) => socket.join_multicast_v4(&v4, &Ipv4Addr::UNSPECIFIED)?,
        IpAddr::V6(v6) => socket.join_multicast_v6(&v6, 0)?,
    }

    Ok(socket)
}

/// Datagram client for a multicast group. Like the TCP client, the socket
/// lives only for the duration of one send.
#[derive(Debug)]
pub struct MulticastClient {
    pub config: EndpointConfig,
}

impl MulticastClient {
    /// The group address is checked here as well as per send, so a
    /// misconfigured client fails before any traffic.
    pub fn new(mut config: EndpointConfig) -> Result<Self, NetError> {
        if config.identifier.is_empty() {
            config.identifier = "Anonymous Multicast Client".to_owned();
        }

        group_address(&config)?;
        Ok(Self { config })
    }

    /// Sends one datagram to the group with the configured hop limit.
    /// Loopback is disabled: the sender never receives its own datagrams.
    pub fn send(&self, payload: &Payload, encoding: Encoding) -> Result<Transmission, NetError> {
        self.config.validate()?;

        let group = group_address(&self.config)?;
        let data = codec::encode(payload, encoding)
            .map_err(|e| NetError::codec(&self.config.identifier, e))?;

        let socket = open_sender_socket(group, self.config.ttl)
            .map_err(|e| NetError::socket(&self.config.identifier, e))?;
        let target = SocketAddr::new(group, self.config.port);

        socket
            .send_to(&data, target)
            .map_err(|e| NetError::socket(&self.config.identifier, e))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| NetError::socket(&self.config.identifier, e))?;
        Ok(Transmission::new(payload.clone(), local_addr, target))
    }
}

fn open_sender_socket(group: IpAddr, ttl: u32) -> io::Result<UdpSocket> {
    match group {
        IpAddr::V4(_) => {
            let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
            socket.set_multicast_ttl_v4(ttl)?;
            socket.set_multicast_loop_v4(false)?;
            socket.bind(&SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0).into())?;
            Ok(socket.into())
        }
        IpAddr::V6(_) => {
            let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
            socket.set_multicast_hops_v6(ttl)?;
            socket.set_multicast_loop_v6(false)?;
            socket.bind(&SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0).into())?;
            Ok(socket.into())
        }
    }
}
