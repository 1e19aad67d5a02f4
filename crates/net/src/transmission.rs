use std::fmt;
use std::net::SocketAddr;

use crate::codec::Payload;

/// Result of one completed exchange. Produced only on success; a failed
/// call returns an error instead of a partially filled value.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    pub content: Payload,
    pub sender: SocketAddr,
    pub receiver: SocketAddr,
}

impl Transmission {
    pub fn new(content: Payload, sender: SocketAddr, receiver: SocketAddr) -> Self {
        Self {
            content,
            sender,
            receiver,
        }
    }

    /// First `len` content bytes as printable text, for receipt previews.
    pub fn preview(&self, len: usize) -> String {
        let bytes = self.content.as_bytes();
        let cut = bytes.len().min(len);
        String::from_utf8_lossy(&bytes[..cut]).into_owned()
    }
}

impl fmt::Display for Transmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates() {
        let transmission = Transmission::new(
            Payload::from("a longer payload"),
            "127.0.0.1:2000".parse().unwrap(),
            "127.0.0.1:3000".parse().unwrap(),
        );

        assert_eq!(transmission.preview(8), "a longer");
        assert_eq!(transmission.preview(100), "a longer payload");
        assert_eq!(transmission.preview(0), "");
    }

    #[test]
    fn test_display_shows_content() {
        let transmission = Transmission::new(
            Payload::from("hello"),
            "127.0.0.1:2000".parse().unwrap(),
            "127.0.0.1:3000".parse().unwrap(),
        );

        assert_eq!(transmission.to_string(), "hello");
    }
}
