//! 包装对象编码器（`unversioned` / `1`）
//!
//! 每个扩展值编码为自描述包装对象 `{ "___type": ..., "value": ... }`，
//! 可读性好但体积偏大。数字原样写出，不做精度处理。

use chrono::SecondsFormat;
use serde_json::Value as JsonValue;

use super::{json_number, tagged, SnapshotCodec};
use crate::value::SnapshotValue;

pub struct WrapperCodec;

impl SnapshotCodec for WrapperCodec {
    fn encode(&self, value: &SnapshotValue) -> JsonValue {
        encode_value(value)
    }
}

fn encode_value(value: &SnapshotValue) -> JsonValue {
    match value {
        SnapshotValue::Null => JsonValue::Null,
        SnapshotValue::Bool(b) => JsonValue::Bool(*b),
        SnapshotValue::Number(n) => json_number(*n),
        SnapshotValue::String(s) => JsonValue::String(s.clone()),
        SnapshotValue::Array(items) => {
            JsonValue::Array(items.iter().map(encode_value).collect())
        }
        SnapshotValue::Object(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), encode_value(value)))
                .collect(),
        ),
        SnapshotValue::BigInt(big) => {
            tagged("bigint", JsonValue::String(big.as_str().to_string()))
        }
        SnapshotValue::Timestamp(ts) => tagged(
            "date",
            JsonValue::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
        SnapshotValue::Map(map) => tagged(
            "map",
            JsonValue::Array(
                map.iter()
                    .map(|(key, value)| {
                        JsonValue::Array(vec![encode_value(key), encode_value(value)])
                    })
                    .collect(),
            ),
        ),
        SnapshotValue::Set(set) => tagged(
            "set",
            JsonValue::Array(set.iter().map(encode_value).collect()),
        ),
        SnapshotValue::Pubkey(key) => {
            tagged("pubkey", JsonValue::String(key.as_str().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::BigInt;
    use serde_json::json;

    #[test]
    fn test_bigint_uses_wrapper_form() {
        let encoded = WrapperCodec.encode(&SnapshotValue::BigInt(BigInt::from(7_i64)));
        assert_eq!(encoded, json!({ "___type": "bigint", "value": "7" }));
    }

    #[test]
    fn test_numbers_not_rounded() {
        // 包装编码不做 7 位有效数字截断
        let value = SnapshotValue::Number(0.123456789012345);
        let encoded = WrapperCodec.encode(&value);
        assert_eq!(encoded, json!(0.123456789012345));
    }
}
