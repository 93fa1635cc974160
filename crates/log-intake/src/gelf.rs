// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! GELF (Graylog Extended Log Format) datagram decoding.
//!
//! A GELF datagram is either a complete message or one chunk of a larger
//! message. Complete payloads are gzip, zlib or uncompressed JSON. Chunks start
//! with the magic bytes `0x1e 0x0f`, followed by an 8 byte message id, the
//! sequence number and the sequence count.
//!
//! ```text
//!  0      2                10     11     12
//!  ┌──────┬────────────────┬──────┬──────┬────────────────────
//!  │ 1e0f │   message id   │ seq  │ cnt  │ payload slice ...
//!  └──────┴────────────────┴──────┴──────┴────────────────────
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::time::{Duration, Instant};

use flate2::read::{GzDecoder, ZlibDecoder};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

pub const CHUNK_MAGIC: [u8; 2] = [0x1e, 0x0f];
const CHUNK_HEADER_LEN: usize = 12;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZLIB_MAGIC: u8 = 0x78;

/// Largest sequence count a sender may announce.
pub const MAX_CHUNKS: u8 = 128;

/// Incomplete messages are discarded after this long.
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive buffer for one GELF datagram (chunked senders stay below this).
pub const MAX_DATAGRAM_SIZE: usize = 8192;

const MAX_PENDING_MESSAGES: usize = 4096;
const MAX_DECOMPRESSED_SIZE: u64 = 16 * 1024 * 1024;

/// GELF's default level when a message carries none (Alert).
const DEFAULT_LEVEL: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum GelfError {
    #[error("empty GELF payload")]
    Empty,
    #[error("GELF chunk shorter than its {} byte header", CHUNK_HEADER_LEN)]
    ChunkHeader,
    #[error("GELF chunk sequence {number} is outside a count of {count}")]
    InvalidSequence { number: u8, count: u8 },
    #[error("GELF message announces {0} chunks, at most {} are allowed", MAX_CHUNKS)]
    TooManyChunks(u8),
    #[error("GELF chunk belongs to a message with a different chunk count")]
    CountMismatch,
    #[error("too many incomplete GELF messages in flight")]
    TooManyPending,
    #[error("failed to decompress GELF payload: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("decompressed GELF payload exceeds {} bytes", MAX_DECOMPRESSED_SIZE)]
    PayloadTooLarge,
    #[error("invalid GELF JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decoded GELF message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GelfMessage {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub short_message: String,
    #[serde(default)]
    pub full_message: String,
    /// Seconds since the Unix epoch with optional fraction. Zero when absent.
    #[serde(default)]
    pub timestamp: f64,
    /// Raw level as sent; see [`GelfMessage::level_code`].
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub facility: String,
    /// Additional `_`-prefixed fields, keys kept as sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GelfMessage {
    /// Level code of the message, GELF's default (1) when absent.
    #[must_use]
    pub fn level_code(&self) -> i64 {
        match self.level {
            Some(level) if level.is_finite() && level.fract() == 0.0 => level as i64,
            Some(_) => -1,
            None => DEFAULT_LEVEL,
        }
    }
}

struct PendingMessage {
    first_seen: Instant,
    chunks: Vec<Option<Vec<u8>>>,
    received: usize,
}

/// Reassembles chunked datagrams and decodes complete GELF payloads.
#[derive(Default)]
pub struct GelfDecoder {
    pending: HashMap<[u8; 8], PendingMessage>,
}

impl GelfDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one datagram to the decoder.
    ///
    /// Returns `Ok(None)` while a chunked message is still incomplete.
    pub fn decode(&mut self, datagram: &[u8]) -> Result<Option<GelfMessage>, GelfError> {
        self.decode_at(datagram, Instant::now())
    }

    fn decode_at(
        &mut self,
        datagram: &[u8],
        now: Instant,
    ) -> Result<Option<GelfMessage>, GelfError> {
        if !datagram.starts_with(&CHUNK_MAGIC) {
            return decode_payload(datagram).map(Some);
        }
        match self.add_chunk(datagram, now)? {
            Some(payload) => decode_payload(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Number of chunked messages waiting for more chunks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn add_chunk(&mut self, datagram: &[u8], now: Instant) -> Result<Option<Vec<u8>>, GelfError> {
        if datagram.len() < CHUNK_HEADER_LEN {
            return Err(GelfError::ChunkHeader);
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&datagram[2..10]);
        let number = datagram[10];
        let count = datagram[11];
        if count == 0 || number >= count {
            return Err(GelfError::InvalidSequence { number, count });
        }
        if count > MAX_CHUNKS {
            return Err(GelfError::TooManyChunks(count));
        }

        self.expire(now);
        if !self.pending.contains_key(&id) && self.pending.len() >= MAX_PENDING_MESSAGES {
            return Err(GelfError::TooManyPending);
        }

        let entry = self.pending.entry(id).or_insert_with(|| PendingMessage {
            first_seen: now,
            chunks: vec![None; usize::from(count)],
            received: 0,
        });
        if entry.chunks.len() != usize::from(count) {
            return Err(GelfError::CountMismatch);
        }
        let slot = &mut entry.chunks[usize::from(number)];
        if slot.is_none() {
            *slot = Some(datagram[CHUNK_HEADER_LEN..].to_vec());
            entry.received += 1;
        }
        if entry.received < entry.chunks.len() {
            return Ok(None);
        }

        let Some(complete) = self.pending.remove(&id) else {
            return Ok(None);
        };
        Ok(Some(complete.chunks.into_iter().flatten().flatten().collect()))
    }

    fn expire(&mut self, now: Instant) {
        let before = self.pending.len();
        self.pending
            .retain(|_, msg| now.saturating_duration_since(msg.first_seen) < CHUNK_TIMEOUT);
        let expired = before - self.pending.len();
        if expired > 0 {
            debug!("Discarded {} incomplete GELF messages", expired);
        }
    }
}

/// Decodes a complete (unchunked) GELF payload.
pub fn decode_payload(payload: &[u8]) -> Result<GelfMessage, GelfError> {
    if payload.is_empty() {
        return Err(GelfError::Empty);
    }
    let json = decompress(payload)?;
    let mut message: GelfMessage = serde_json::from_slice(&json)?;
    message.extra.retain(|key, _| key.starts_with('_'));
    Ok(message)
}

fn decompress(payload: &[u8]) -> Result<Cow<'_, [u8]>, GelfError> {
    if payload.starts_with(&GZIP_MAGIC) {
        read_limited(GzDecoder::new(payload)).map(Cow::Owned)
    } else if payload[0] == ZLIB_MAGIC {
        read_limited(ZlibDecoder::new(payload)).map(Cow::Owned)
    } else {
        Ok(Cow::Borrowed(payload))
    }
}

fn read_limited<R: Read>(reader: R) -> Result<Vec<u8>, GelfError> {
    let mut out = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_end(&mut out)
        .map_err(GelfError::Decompress)?;
    if out.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(GelfError::PayloadTooLarge);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;

    const MESSAGE: &str = r#"{"version":"1.1","host":"localhost","short_message":"short","full_message":"full","timestamp":1700000000.25,"level":6,"facility":"local6","_user_id":42,"ignored":"x"}"#;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn chunk(id: [u8; 8], number: u8, count: u8, data: &[u8]) -> Vec<u8> {
        let mut out = CHUNK_MAGIC.to_vec();
        out.extend_from_slice(&id);
        out.push(number);
        out.push(count);
        out.extend_from_slice(data);
        out
    }

    fn assert_expected(message: &GelfMessage) {
        assert_eq!(message.version, "1.1");
        assert_eq!(message.host, "localhost");
        assert_eq!(message.short_message, "short");
        assert_eq!(message.full_message, "full");
        assert_eq!(message.timestamp, 1_700_000_000.25);
        assert_eq!(message.level_code(), 6);
        assert_eq!(message.facility, "local6");
        assert_eq!(message.extra.get("_user_id"), Some(&json!(42)));
        assert!(!message.extra.contains_key("ignored"));
    }

    #[test]
    fn test_uncompressed() {
        let message = decode_payload(MESSAGE.as_bytes()).unwrap();
        assert_expected(&message);
    }

    #[test]
    fn test_gzip() {
        let message = decode_payload(&gzip(MESSAGE.as_bytes())).unwrap();
        assert_expected(&message);
    }

    #[test]
    fn test_zlib() {
        let message = decode_payload(&zlib(MESSAGE.as_bytes())).unwrap();
        assert_expected(&message);
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let message = decode_payload(br#"{"short_message":"hi"}"#).unwrap();
        assert_eq!(message.timestamp, 0.0);
        assert_eq!(message.level_code(), DEFAULT_LEVEL);
        assert_eq!(message.full_message, "");
        assert!(message.extra.is_empty());
    }

    #[test]
    fn test_fractional_level_is_invalid() {
        let message = decode_payload(br#"{"short_message":"hi","level":2.5}"#).unwrap();
        assert_eq!(message.level_code(), -1);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            decode_payload(b"{not json"),
            Err(GelfError::Json(_))
        ));
        assert!(matches!(decode_payload(b""), Err(GelfError::Empty)));
    }

    #[test]
    fn test_chunked_message_out_of_order() {
        let payload = gzip(MESSAGE.as_bytes());
        let (first, rest) = payload.split_at(payload.len() / 3);
        let (second, third) = rest.split_at(rest.len() / 2);
        let id = *b"msgid-01";

        let mut decoder = GelfDecoder::new();
        assert!(decoder.decode(&chunk(id, 2, 3, third)).unwrap().is_none());
        assert!(decoder.decode(&chunk(id, 0, 3, first)).unwrap().is_none());
        // Duplicates are ignored.
        assert!(decoder.decode(&chunk(id, 0, 3, first)).unwrap().is_none());
        assert_eq!(decoder.pending(), 1);

        let message = decoder.decode(&chunk(id, 1, 3, second)).unwrap().unwrap();
        assert_expected(&message);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_incomplete_chunks_expire() {
        let id = *b"msgid-02";
        let start = Instant::now();
        let mut decoder = GelfDecoder::new();

        assert!(decoder
            .decode_at(&chunk(id, 0, 2, b"{\"short"), start)
            .unwrap()
            .is_none());
        assert_eq!(decoder.pending(), 1);

        let later = start + CHUNK_TIMEOUT + Duration::from_millis(1);
        let other = *b"msgid-03";
        assert!(decoder
            .decode_at(&chunk(other, 0, 2, b"{"), later)
            .unwrap()
            .is_none());
        assert_eq!(decoder.pending(), 1);

        // The late second half of the expired message starts a new entry instead of completing it.
        assert!(decoder
            .decode_at(&chunk(id, 1, 2, b"_message\":\"x\"}"), later)
            .unwrap()
            .is_none());
        assert_eq!(decoder.pending(), 2);
    }

    #[test]
    fn test_bad_chunk_headers() {
        let mut decoder = GelfDecoder::new();
        assert!(matches!(
            decoder.decode(&CHUNK_MAGIC),
            Err(GelfError::ChunkHeader)
        ));
        assert!(matches!(
            decoder.decode(&chunk(*b"abcdefgh", 3, 3, b"x")),
            Err(GelfError::InvalidSequence {
                number: 3,
                count: 3
            })
        ));
        assert!(matches!(
            decoder.decode(&chunk(*b"abcdefgh", 0, 129, b"x")),
            Err(GelfError::TooManyChunks(129))
        ));
    }

    #[test]
    fn test_count_mismatch() {
        let mut decoder = GelfDecoder::new();
        let id = *b"msgid-04";
        assert!(decoder.decode(&chunk(id, 0, 2, b"{")).unwrap().is_none());
        assert!(matches!(
            decoder.decode(&chunk(id, 1, 3, b"}")),
            Err(GelfError::CountMismatch)
        ));
    }
}
