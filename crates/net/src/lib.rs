pub mod codec;
pub mod config;
pub mod error;
pub mod multicast;
pub mod tcp;
pub mod transmission;
pub mod udp;

pub use codec::{decode, encode, CodecError, Encoding, Payload};
pub use config::{default_host, EndpointConfig, DEFAULT_PORT, MAX_BUFFER_SIZE};
pub use error::NetError;
pub use multicast::{MulticastClient, MulticastServer};
pub use tcp::{TcpClient, TcpServer};
pub use transmission::Transmission;
pub use udp::{UdpClient, UdpServer};
