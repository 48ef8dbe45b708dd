//! Built-in command response decoders.
//!
//! Typed responses of a few standard clusters, decoded from the session
//! layer's little-endian payload form into JSON for the inspection sink.
//! Callers extend the table through
//! [DecoderRegistry::register](crate::invoke::DecoderRegistry::register).

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::invoke::{DecoderRegistry, ResponseDecoder};

use super::defs;

/// Door lock GetUserResponse.
#[derive(Debug, Serialize)]
struct DoorLockGetUserResponse {
    user_index: u16,
    user_name: String,
    user_status: u8,
    user_type: u8,
    credential_rule: u8,
    #[serde(serialize_with = "super::helpers::serialize_opt_bytes_as_hex")]
    credential_data: Option<Vec<u8>>,
}

struct DoorLockGetUserDecoder;

impl ResponseDecoder for DoorLockGetUserDecoder {
    fn decode(&self, payload: &[u8]) -> Result<serde_json::Value> {
        let mut cursor = Cursor::new(payload);
        let user_index = cursor.read_u16::<LittleEndian>().context("user index missing")?;
        let name_len = cursor.read_u8().context("name length missing")? as usize;
        let mut name = vec![0u8; name_len];
        cursor.read_exact(&mut name).context("user name truncated")?;
        let user_name = String::from_utf8(name).context("user name not utf8")?;
        let user_status = cursor.read_u8().context("user status missing")?;
        let user_type = cursor.read_u8().context("user type missing")?;
        let credential_rule = cursor.read_u8().context("credential rule missing")?;
        let credential_data = match cursor.read_u8().context("credential flag missing")? {
            0 => None,
            _ => {
                let len = cursor.read_u8().context("credential length missing")? as usize;
                let mut data = vec![0u8; len];
                cursor.read_exact(&mut data).context("credential truncated")?;
                Some(data)
            }
        };
        let response = DoorLockGetUserResponse {
            user_index,
            user_name,
            user_status,
            user_type,
            credential_rule,
            credential_data,
        };
        Ok(serde_json::to_value(response)?)
    }
}

/// Group key management KeySetReadResponse.
#[derive(Debug, Serialize)]
struct KeySetReadResponse {
    group_key_set_id: u16,
    security_policy: u8,
    #[serde(serialize_with = "super::helpers::serialize_vec_bytes_as_hex")]
    epoch_keys: Vec<Vec<u8>>,
}

struct KeySetReadDecoder;

impl ResponseDecoder for KeySetReadDecoder {
    fn decode(&self, payload: &[u8]) -> Result<serde_json::Value> {
        let mut cursor = Cursor::new(payload);
        let group_key_set_id = cursor.read_u16::<LittleEndian>().context("key set id missing")?;
        let security_policy = cursor.read_u8().context("security policy missing")?;
        let key_count = cursor.read_u8().context("key count missing")? as usize;
        let mut epoch_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let mut key = vec![0u8; 16];
            cursor.read_exact(&mut key).context("epoch key truncated")?;
            epoch_keys.push(key);
        }
        let response = KeySetReadResponse {
            group_key_set_id,
            security_policy,
            epoch_keys,
        };
        Ok(serde_json::to_value(response)?)
    }
}

/// Register the built-in decoders. Called by the client at construction.
pub fn register_builtin(registry: &DecoderRegistry) {
    registry.register(
        defs::CLUSTER_ID_DOOR_LOCK,
        defs::CLUSTER_DOOR_LOCK_CMD_ID_GETUSER_RESPONSE,
        Arc::new(DoorLockGetUserDecoder),
    );
    registry.register(
        defs::CLUSTER_ID_GROUP_KEY_MANAGEMENT,
        defs::CLUSTER_GROUP_KEY_MANAGEMENT_CMD_ID_KEYSET_READ_RESPONSE,
        Arc::new(KeySetReadDecoder),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_lock_get_user_response() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&5u16.to_le_bytes());
        payload.push(3);
        payload.extend_from_slice(b"bob");
        payload.push(1); // occupied
        payload.push(0); // unrestricted
        payload.push(0); // single
        payload.push(1); // credential present
        payload.push(2);
        payload.extend_from_slice(&[0xca, 0xfe]);

        let json = DoorLockGetUserDecoder.decode(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "user_index": 5,
                "user_name": "bob",
                "user_status": 1,
                "user_type": 0,
                "credential_rule": 0,
                "credential_data": "cafe",
            })
        );
    }

    #[test]
    fn door_lock_truncated_payload_fails() {
        let err = DoorLockGetUserDecoder.decode(&[0x05]).unwrap_err();
        assert!(err.to_string().contains("user index"));
    }

    #[test]
    fn key_set_read_response() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&9u16.to_le_bytes());
        payload.push(0);
        payload.push(2);
        payload.extend_from_slice(&[0x11; 16]);
        payload.extend_from_slice(&[0x22; 16]);

        let json = KeySetReadDecoder.decode(&payload).unwrap();
        assert_eq!(json["group_key_set_id"], 9);
        assert_eq!(json["epoch_keys"][0], "11".repeat(16));
        assert_eq!(json["epoch_keys"][1], "22".repeat(16));
    }

    #[test]
    fn builtin_table_contains_expected_keys() {
        let registry = DecoderRegistry::new();
        register_builtin(&registry);
        assert!(registry
            .lookup(
                defs::CLUSTER_ID_DOOR_LOCK,
                defs::CLUSTER_DOOR_LOCK_CMD_ID_GETUSER_RESPONSE
            )
            .is_some());
        assert!(registry
            .lookup(defs::CLUSTER_ID_ON_OFF, defs::CLUSTER_ON_OFF_CMD_ID_TOGGLE)
            .is_none());
    }
}
