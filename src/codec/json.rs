use crate::codec::{CodecError, WireCodec};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Copy, Clone, Debug)]
pub struct CodecOptions {
    /// When false, decoding fails if the input carries an attribute the target type doesn't know.
    pub tolerate_unknown_fields: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            tolerate_unknown_fields: true,
        }
    }
}

/// JsonCodec is the `WireCodec` used throughout the crate.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonCodec {
    options: CodecOptions,
}

impl JsonCodec {
    pub fn new(options: CodecOptions) -> Self {
        JsonCodec { options }
    }
}

impl WireCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, CodecError> {
        serde_json::to_vec(value).map(Bytes::from).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned + Serialize>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let raw: Value = serde_json::from_slice(bytes).map_err(CodecError::Decode)?;
        if self.options.tolerate_unknown_fields {
            return serde_json::from_value(raw).map_err(CodecError::Decode);
        }

        let typed: T = serde_json::from_value(raw.clone()).map_err(CodecError::Decode)?;
        // Whatever the typed value can't reproduce was dropped during deserialization.
        let known = serde_json::to_value(&typed).map_err(CodecError::Encode)?;
        reject_unknown_fields(&raw, &known, "")?;

        Ok(typed)
    }
}

fn reject_unknown_fields(raw: &Value, known: &Value, path: &str) -> Result<(), CodecError> {
    match (raw, known) {
        (Value::Object(raw_fields), Value::Object(known_fields)) => {
            for (name, raw_value) in raw_fields {
                let field_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                };
                match known_fields.get(name) {
                    Some(known_value) => reject_unknown_fields(raw_value, known_value, &field_path)?,
                    None => return Err(CodecError::UnknownField(field_path)),
                }
            }
            Ok(())
        }
        (Value::Array(raw_items), Value::Array(known_items)) => {
            for (i, (raw_item, known_item)) in raw_items.iter().zip(known_items.iter()).enumerate() {
                reject_unknown_fields(raw_item, known_item, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Envelope {
        result: Inner,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Inner {
        index: u64,
    }

    #[test]
    fn tolerant_codec_ignores_unknown_fields() {
        let codec = JsonCodec::default();
        let decoded: Envelope = codec.decode(br#"{"result":{"index":3,"extra":1},"code":200}"#).unwrap();
        assert_eq!(Envelope { result: Inner { index: 3 } }, decoded);
    }

    #[test]
    fn strict_codec_names_the_unknown_field() {
        let codec = JsonCodec::new(CodecOptions {
            tolerate_unknown_fields: false,
        });

        let ok: Envelope = codec.decode(br#"{"result":{"index":3}}"#).unwrap();
        assert_eq!(3, ok.result.index);

        match codec.decode::<Envelope>(br#"{"result":{"index":3,"extra":1}}"#) {
            Err(CodecError::UnknownField(field)) => assert_eq!("result.extra", field),
            other => panic!("Unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let codec = JsonCodec::default();
        assert!(matches!(codec.decode::<Envelope>(b"{nope"), Err(CodecError::Decode(_))));
    }
}
