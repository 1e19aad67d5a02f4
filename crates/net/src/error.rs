use std::io;

use crate::codec::CodecError;

/// Failure taxonomy shared by every endpoint. Each variant carries the
/// endpoint identifier so errors from several endpoints running side by
/// side can be told apart.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Invalid option combination. Always raised before any socket
    /// operation; retrying without changing the configuration is useless.
    #[error("{identifier}: {reason}")]
    Config { identifier: String, reason: String },

    /// Bind, group-join or address-resolution failure. Fatal for this
    /// endpoint instance; the caller must construct a new one.
    #[error("{identifier}: address {addr} could not be assigned: {source}")]
    Address {
        identifier: String,
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The configured host is not a multicast group address.
    #[error("{identifier}: {addr} is not a multicast group address")]
    InvalidAddress { identifier: String, addr: String },

    /// I/O failure during accept, send or receive. Recoverable; the same
    /// endpoint stays usable for the next call.
    #[error("{identifier}: socket error: {source}")]
    Socket {
        identifier: String,
        #[source]
        source: io::Error,
    },

    /// Client-side connect or I/O deadline exceeded.
    #[error("{identifier}: timed out after {seconds}s")]
    Timeout { identifier: String, seconds: f64 },

    /// A send reported zero bytes written while data remained.
    #[error("{identifier}: connection broken with {remaining} bytes unsent")]
    ConnectionBroken { identifier: String, remaining: usize },

    /// The payload could not be encoded or decoded.
    #[error("{identifier}: {source}")]
    Codec {
        identifier: String,
        #[source]
        source: CodecError,
    },
}

impl NetError {
    pub(crate) fn config(identifier: &str, reason: &str) -> Self {
        NetError::Config {
            identifier: identifier.to_owned(),
            reason: reason.to_owned(),
        }
    }

    pub(crate) fn address(identifier: &str, addr: impl Into<String>, source: io::Error) -> Self {
        NetError::Address {
            identifier: identifier.to_owned(),
            addr: addr.into(),
            source,
        }
    }

    pub(crate) fn socket(identifier: &str, source: io::Error) -> Self {
        NetError::Socket {
            identifier: identifier.to_owned(),
            source,
        }
    }

    pub(crate) fn codec(identifier: &str, source: CodecError) -> Self {
        NetError::Codec {
            identifier: identifier.to_owned(),
            source,
        }
    }
}
