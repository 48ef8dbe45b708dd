//! Report entry stream decoding.
//!
//! The session layer delivers subscription data as a byte stream of framed
//! report entries. The framing below is this engine's interchange contract
//! with session-layer adapters; adapters produce it with the encode
//! functions in this module.
//!
//! Frame: `kind:u8` (1 attribute, 2 event), `body_len:u16 LE`, body.
//! Attribute body: `endpoint:u16 cluster:u32 attribute:u32 flag:u8`, then
//! either the encoded value (flag 0) or a peer status `u32` (flag 1).
//! Event body: `endpoint:u16 cluster:u32 event:u32 event_number:u64
//! priority:u8 timestamp:u64`, then the encoded value.
//! Values: `tag:u8` (0 null, 1 bool, 2 uint, 3 int, 4 octets, 5 utf8) plus
//! payload; octets/utf8 carry a `u16 LE` length.
//!
//! Frames may be split at any byte boundary; [ReportDecoder] buffers
//! partial frames across [ReportDecoder::feed] calls. A malformed value
//! spoils only its own datum ([ReportStatus::DecodeError]); malformed
//! framing is a [StreamError] and spoils the stream.

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{Cursor, Read, Write};

use crate::paths::{AttributePath, EventPath};

const KIND_ATTRIBUTE: u8 = 1;
const KIND_EVENT: u8 = 2;

const VALUE_TAG_NULL: u8 = 0;
const VALUE_TAG_BOOL: u8 = 1;
const VALUE_TAG_UINT: u8 = 2;
const VALUE_TAG_INT: u8 = 3;
const VALUE_TAG_OCTETS: u8 = 4;
const VALUE_TAG_UTF8: u8 = 5;

const FLAG_VALUE: u8 = 0;
const FLAG_PEER_STATUS: u8 = 1;

/// Upper bound on one entry body; larger lengths mean stream corruption.
const MAX_ENTRY_LEN: usize = 4096;

/// Decoded datum value.
#[derive(Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Bytes(#[serde(serialize_with = "crate::clusters::helpers::serialize_bytes_as_hex")] Vec<u8>),
    Str(String),
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::UInt(v) => write!(f, "UInt({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Bytes(v) => write!(f, "Bytes({})", hex::encode(v)),
            Value::Str(v) => write!(f, "Str({:?})", v),
        }
    }
}

/// Per-datum delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Ok,
    /// Peer reported a status code for this datum instead of a value.
    PeerStatus(u32),
    /// Value bytes did not decode; the datum is dropped, the stream is not.
    DecodeError,
}

/// One attribute datum pushed by the peer.
#[derive(Debug, Clone)]
pub struct AttributeReport {
    pub path: AttributePath,
    pub value: Option<Value>,
    pub status: ReportStatus,
}

/// Event metadata preceding the event value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub path: EventPath,
    pub event_number: u64,
    pub priority: u8,
    pub epoch_timestamp_ms: u64,
}

/// One event datum pushed by the peer.
#[derive(Debug, Clone)]
pub struct EventReport {
    pub header: EventHeader,
    pub value: Option<Value>,
    pub status: Option<ReportStatus>,
}

/// One decoded report entry.
#[derive(Debug, Clone)]
pub enum ReportEntry {
    Attribute(AttributeReport),
    Event(EventReport),
}

/// Framing-level stream corruption; not attributable to a single datum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError(pub String);

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "report stream corrupted: {}", self.0)
    }
}

impl std::error::Error for StreamError {}

fn encode_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    match value {
        Value::Null => out.push(VALUE_TAG_NULL),
        Value::Bool(v) => {
            out.push(VALUE_TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::UInt(v) => {
            out.push(VALUE_TAG_UINT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Int(v) => {
            out.push(VALUE_TAG_INT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Bytes(v) => {
            out.push(VALUE_TAG_OCTETS);
            out.extend_from_slice(&(v.len() as u16).to_le_bytes());
            out.extend_from_slice(v);
        }
        Value::Str(v) => {
            out.push(VALUE_TAG_UTF8);
            out.extend_from_slice(&(v.len() as u16).to_le_bytes());
            out.extend_from_slice(v.as_bytes());
        }
    }
    out
}

fn decode_value(data: &[u8]) -> Result<Value> {
    let mut cursor = Cursor::new(data);
    let tag = cursor.read_u8().context("value tag missing")?;
    let value = match tag {
        VALUE_TAG_NULL => Value::Null,
        VALUE_TAG_BOOL => match cursor.read_u8().context("bool byte missing")? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => anyhow::bail!("bad bool byte {}", other),
        },
        VALUE_TAG_UINT => Value::UInt(cursor.read_u64::<LittleEndian>().context("uint truncated")?),
        VALUE_TAG_INT => Value::Int(cursor.read_i64::<LittleEndian>().context("int truncated")?),
        VALUE_TAG_OCTETS => {
            let len = cursor.read_u16::<LittleEndian>().context("octets length missing")? as usize;
            let mut buf = vec![0u8; len];
            cursor.read_exact(&mut buf).context("octets truncated")?;
            Value::Bytes(buf)
        }
        VALUE_TAG_UTF8 => {
            let len = cursor.read_u16::<LittleEndian>().context("string length missing")? as usize;
            let mut buf = vec![0u8; len];
            cursor.read_exact(&mut buf).context("string truncated")?;
            Value::Str(String::from_utf8(buf).context("string not utf8")?)
        }
        other => anyhow::bail!("unknown value tag {}", other),
    };
    Ok(value)
}

fn frame(kind: u8, body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 3);
    out.push(kind);
    _ = out.write_u16::<LittleEndian>(body.len() as u16);
    _ = out.write_all(&body);
    out
}

/// Encode one attribute entry carrying a value.
pub fn encode_attribute_entry(path: &AttributePath, value: &Value) -> Vec<u8> {
    let mut body = Vec::new();
    _ = body.write_u16::<LittleEndian>(path.endpoint_id);
    _ = body.write_u32::<LittleEndian>(path.cluster_id);
    _ = body.write_u32::<LittleEndian>(path.attribute_id);
    _ = body.write_u8(FLAG_VALUE);
    _ = body.write_all(&encode_value(value));
    frame(KIND_ATTRIBUTE, body)
}

/// Encode one attribute entry carrying a peer status instead of a value.
pub fn encode_attribute_status_entry(path: &AttributePath, status: u32) -> Vec<u8> {
    let mut body = Vec::new();
    _ = body.write_u16::<LittleEndian>(path.endpoint_id);
    _ = body.write_u32::<LittleEndian>(path.cluster_id);
    _ = body.write_u32::<LittleEndian>(path.attribute_id);
    _ = body.write_u8(FLAG_PEER_STATUS);
    _ = body.write_u32::<LittleEndian>(status);
    frame(KIND_ATTRIBUTE, body)
}

/// Encode one event entry.
pub fn encode_event_entry(header: &EventHeader, value: &Value) -> Vec<u8> {
    let mut body = Vec::new();
    _ = body.write_u16::<LittleEndian>(header.path.endpoint_id);
    _ = body.write_u32::<LittleEndian>(header.path.cluster_id);
    _ = body.write_u32::<LittleEndian>(header.path.event_id);
    _ = body.write_u64::<LittleEndian>(header.event_number);
    _ = body.write_u8(header.priority);
    _ = body.write_u64::<LittleEndian>(header.epoch_timestamp_ms);
    _ = body.write_all(&encode_value(value));
    frame(KIND_EVENT, body)
}

fn parse_attribute_body(body: &[u8]) -> Result<ReportEntry, StreamError> {
    let mut cursor = Cursor::new(body);
    let header = (|| -> Result<(AttributePath, u8)> {
        let endpoint_id = cursor.read_u16::<LittleEndian>()?;
        let cluster_id = cursor.read_u32::<LittleEndian>()?;
        let attribute_id = cursor.read_u32::<LittleEndian>()?;
        let flag = cursor.read_u8()?;
        Ok((
            AttributePath {
                endpoint_id,
                cluster_id,
                attribute_id,
            },
            flag,
        ))
    })()
    .map_err(|_| StreamError("attribute entry header truncated".to_owned()))?;
    let (path, flag) = header;
    let rest = &body[cursor.position() as usize..];
    match flag {
        FLAG_VALUE => match decode_value(rest) {
            Ok(value) => Ok(ReportEntry::Attribute(AttributeReport {
                path,
                value: Some(value),
                status: ReportStatus::Ok,
            })),
            Err(e) => {
                log::debug!("attribute {:?} value decode failed: {:#}", path, e);
                Ok(ReportEntry::Attribute(AttributeReport {
                    path,
                    value: None,
                    status: ReportStatus::DecodeError,
                }))
            }
        },
        FLAG_PEER_STATUS => {
            let status = Cursor::new(rest)
                .read_u32::<LittleEndian>()
                .map_err(|_| StreamError("attribute status truncated".to_owned()))?;
            Ok(ReportEntry::Attribute(AttributeReport {
                path,
                value: None,
                status: ReportStatus::PeerStatus(status),
            }))
        }
        other => Err(StreamError(format!("unknown attribute entry flag {}", other))),
    }
}

fn parse_event_body(body: &[u8]) -> Result<ReportEntry, StreamError> {
    let mut cursor = Cursor::new(body);
    let header = (|| -> Result<EventHeader> {
        let endpoint_id = cursor.read_u16::<LittleEndian>()?;
        let cluster_id = cursor.read_u32::<LittleEndian>()?;
        let event_id = cursor.read_u32::<LittleEndian>()?;
        let event_number = cursor.read_u64::<LittleEndian>()?;
        let priority = cursor.read_u8()?;
        let epoch_timestamp_ms = cursor.read_u64::<LittleEndian>()?;
        Ok(EventHeader {
            path: EventPath {
                endpoint_id,
                cluster_id,
                event_id,
            },
            event_number,
            priority,
            epoch_timestamp_ms,
        })
    })()
    .map_err(|_| StreamError("event entry header truncated".to_owned()))?;
    let rest = &body[cursor.position() as usize..];
    match decode_value(rest) {
        Ok(value) => Ok(ReportEntry::Event(EventReport {
            header,
            value: Some(value),
            status: None,
        })),
        Err(e) => {
            log::debug!("event {:?} value decode failed: {:#}", header.path, e);
            Ok(ReportEntry::Event(EventReport {
                header,
                value: None,
                status: Some(ReportStatus::DecodeError),
            }))
        }
    }
}

/// Incremental report entry decoder. One instance per subscription stream.
pub struct ReportDecoder {
    buf: Vec<u8>,
}

impl ReportDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume one chunk and return the entries completed by it. Partial
    /// trailing frames stay buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<ReportEntry>, StreamError> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        loop {
            if self.buf.len() < 3 {
                break;
            }
            let kind = self.buf[0];
            let body_len = u16::from_le_bytes([self.buf[1], self.buf[2]]) as usize;
            if kind != KIND_ATTRIBUTE && kind != KIND_EVENT {
                return Err(StreamError(format!("unknown entry kind {}", kind)));
            }
            if body_len > MAX_ENTRY_LEN {
                return Err(StreamError(format!("entry body length {} too large", body_len)));
            }
            if self.buf.len() < 3 + body_len {
                break;
            }
            let body: Vec<u8> = self.buf.drain(..3 + body_len).skip(3).collect();
            let entry = match kind {
                KIND_ATTRIBUTE => parse_attribute_body(&body)?,
                _ => parse_event_body(&body)?,
            };
            out.push(entry);
        }
        Ok(out)
    }

    /// Bytes buffered waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for ReportDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_off_path() -> AttributePath {
        AttributePath {
            endpoint_id: 1,
            cluster_id: 6,
            attribute_id: 0,
        }
    }

    #[test]
    fn decode_single_attribute_entry() {
        let data = encode_attribute_entry(&on_off_path(), &Value::Bool(true));
        let mut decoder = ReportDecoder::new();
        let entries = decoder.feed(&data).unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            ReportEntry::Attribute(a) => {
                assert_eq!(a.path, on_off_path());
                assert_eq!(a.value, Some(Value::Bool(true)));
                assert_eq!(a.status, ReportStatus::Ok);
            }
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn decode_tolerates_byte_by_byte_delivery() {
        let mut data = encode_attribute_entry(&on_off_path(), &Value::UInt(128));
        data.extend(encode_attribute_entry(&on_off_path(), &Value::Bool(false)));
        let mut decoder = ReportDecoder::new();
        let mut entries = Vec::new();
        for b in &data {
            entries.extend(decoder.feed(std::slice::from_ref(b)).unwrap());
        }
        assert_eq!(entries.len(), 2);
        match (&entries[0], &entries[1]) {
            (ReportEntry::Attribute(a), ReportEntry::Attribute(b)) => {
                assert_eq!(a.value, Some(Value::UInt(128)));
                assert_eq!(b.value, Some(Value::Bool(false)));
            }
            other => panic!("unexpected entries {:?}", other),
        }
    }

    #[test]
    fn bad_value_spoils_only_its_datum() {
        // entry with an unknown value tag, followed by a good entry
        let mut body = Vec::new();
        _ = body.write_u16::<LittleEndian>(1);
        _ = body.write_u32::<LittleEndian>(6);
        _ = body.write_u32::<LittleEndian>(0);
        _ = body.write_u8(0);
        _ = body.write_u8(0x77); // no such value tag
        let mut data = frame(KIND_ATTRIBUTE, body);
        data.extend(encode_attribute_entry(&on_off_path(), &Value::Bool(true)));

        let mut decoder = ReportDecoder::new();
        let entries = decoder.feed(&data).unwrap();
        assert_eq!(entries.len(), 2);
        match &entries[0] {
            ReportEntry::Attribute(a) => {
                assert_eq!(a.status, ReportStatus::DecodeError);
                assert!(a.value.is_none());
            }
            other => panic!("unexpected entry {:?}", other),
        }
        match &entries[1] {
            ReportEntry::Attribute(a) => assert_eq!(a.status, ReportStatus::Ok),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn peer_status_entry() {
        let data = encode_attribute_status_entry(&on_off_path(), 0x86);
        let entries = ReportDecoder::new().feed(&data).unwrap();
        match &entries[0] {
            ReportEntry::Attribute(a) => {
                assert_eq!(a.status, ReportStatus::PeerStatus(0x86));
                assert!(a.value.is_none());
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn event_entry_round() {
        let header = EventHeader {
            path: EventPath {
                endpoint_id: 1,
                cluster_id: 0x3b,
                event_id: 1,
            },
            event_number: 77,
            priority: 2,
            epoch_timestamp_ms: 1_700_000_000_000,
        };
        let data = encode_event_entry(&header, &Value::Str("pressed".into()));
        let entries = ReportDecoder::new().feed(&data).unwrap();
        match &entries[0] {
            ReportEntry::Event(e) => {
                assert_eq!(e.header, header);
                assert_eq!(e.value, Some(Value::Str("pressed".into())));
                assert!(e.status.is_none());
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_is_stream_error() {
        let res = ReportDecoder::new().feed(&[9, 1, 0, 0]);
        assert!(res.is_err());
    }

    #[test]
    fn oversized_body_is_stream_error() {
        let res = ReportDecoder::new().feed(&[KIND_ATTRIBUTE, 0xff, 0xff]);
        assert!(res.is_err());
    }

    #[test]
    fn value_json_shapes() {
        assert_eq!(serde_json::to_value(Value::Bool(true)).unwrap(), serde_json::json!(true));
        assert_eq!(serde_json::to_value(Value::UInt(5)).unwrap(), serde_json::json!(5));
        assert_eq!(
            serde_json::to_value(Value::Bytes(vec![0xde, 0xad])).unwrap(),
            serde_json::json!("dead")
        );
    }
}
