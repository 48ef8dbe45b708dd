//! Serde helpers for rendering Matter octet strings as hex in JSON output.

/// Serialize Vec<u8> as a hex string.
pub fn serialize_bytes_as_hex<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

/// Serialize Option<Vec<u8>> as a hex string, or null when absent.
pub fn serialize_opt_bytes_as_hex<S>(
    bytes: &Option<Vec<u8>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match bytes {
        Some(b) => serializer.serialize_str(&hex::encode(b)),
        None => serializer.serialize_none(),
    }
}

/// Serialize Vec<Vec<u8>> as an array of hex strings.
pub fn serialize_vec_bytes_as_hex<S>(
    vec_bytes: &Vec<Vec<u8>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = serializer.serialize_seq(Some(vec_bytes.len()))?;
    for bytes in vec_bytes {
        seq.serialize_element(&hex::encode(bytes))?;
    }
    seq.end()
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        #[serde(serialize_with = "super::serialize_bytes_as_hex")]
        data: Vec<u8>,
        #[serde(serialize_with = "super::serialize_opt_bytes_as_hex")]
        optional: Option<Vec<u8>>,
        #[serde(serialize_with = "super::serialize_vec_bytes_as_hex")]
        keys: Vec<Vec<u8>>,
    }

    #[test]
    fn hex_rendering() {
        let sample = Sample {
            data: vec![0xab, 0xcd],
            optional: None,
            keys: vec![vec![0x01], vec![0x02, 0x03]],
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "data": "abcd", "optional": null, "keys": ["01", "0203"] })
        );
    }
}
