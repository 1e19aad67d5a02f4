use std::fmt;

use rkyv::{rancor, Archive, Deserialize, Serialize};

/// How a payload is laid out on the wire. Always an explicit argument to
/// send/listen calls; endpoints never guess the encoding from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Bytes pass through untouched; text becomes UTF-8.
    Raw,
    /// rkyv-archived `Payload`, symmetric between encode and decode.
    Serialized,
    /// Best-effort string rendering, for diagnostics.
    Text,
}

/// The unit of content an endpoint sends or receives.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => text.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Payload::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

pub fn encode(payload: &Payload, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Raw => Ok(payload.as_bytes().to_vec()),
        Encoding::Serialized => rkyv::to_bytes::<rancor::Error>(payload)
            .map(|aligned| aligned.into_vec())
            .map_err(CodecError::Serialize),
        Encoding::Text => Ok(payload.to_string().into_bytes()),
    }
}

pub fn decode(data: &[u8], encoding: Encoding) -> Result<Payload, CodecError> {
    match encoding {
        Encoding::Raw => Ok(Payload::Bytes(data.to_vec())),
        Encoding::Serialized => {
            rkyv::from_bytes::<Payload, rancor::Error>(data).map_err(CodecError::Deserialize)
        }
        Encoding::Text => Ok(Payload::Text(String::from_utf8_lossy(data).into_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_round_trip_text() {
        let payload = Payload::Text("structured message".to_owned());

        let encoded = encode(&payload, Encoding::Serialized).unwrap();
        let decoded = decode(&encoded, Encoding::Serialized).unwrap();

        assert_eq!(payload, decoded);
    }

    #[test]
    fn test_serialized_round_trip_bytes() {
        let payload = Payload::Bytes(vec![0, 159, 146, 150, 0]);

        let encoded = encode(&payload, Encoding::Serialized).unwrap();
        let decoded = decode(&encoded, Encoding::Serialized).unwrap();

        assert_eq!(payload, decoded);
    }

    #[test]
    fn test_raw_text_becomes_utf8() {
        let encoded = encode(&Payload::from("héllo"), Encoding::Raw).unwrap();
        assert_eq!(encoded, "héllo".as_bytes());

        let decoded = decode(&encoded, Encoding::Raw).unwrap();
        assert_eq!(decoded.as_bytes(), "héllo".as_bytes());
    }

    #[test]
    fn test_text_decoding_is_lossy() {
        let decoded = decode(&[0x66, 0x6f, 0xff, 0x6f], Encoding::Text).unwrap();
        assert_eq!(decoded, Payload::Text("fo\u{fffd}o".to_owned()));
    }

    #[test]
    fn test_serialized_rejects_garbage() {
        assert!(decode(&[1, 2, 3], Encoding::Serialized).is_err());
    }
}
