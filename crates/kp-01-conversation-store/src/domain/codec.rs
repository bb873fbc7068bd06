//! Record encoding.
//!
//! Fixed-shape records use bincode. Messages and profiles use JSON because
//! their optional fields are skipped when absent. Counters and timeline
//! scores are big-endian `u64` so the raw bytes sort numerically.

use super::errors::ConversationError;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, ConversationError> {
    Ok(bincode::serialize(value)?)
}

pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConversationError> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, ConversationError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConversationError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn decode_u64(bytes: &[u8]) -> Result<u64, ConversationError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        ConversationError::serialization(format!("expected 8 bytes, found {}", bytes.len()))
    })?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_rejects_wrong_width() {
        assert_eq!(decode_u64(&encode_u64(42)).unwrap(), 42);
        assert!(matches!(
            decode_u64(&[1, 2, 3]),
            Err(ConversationError::Serialization { .. })
        ));
    }
}
