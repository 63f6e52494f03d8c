//! 紧凑编码器（`2`）
//!
//! 在包装对象编码的基础上，对大整数和时间戳改用内联 sigil 字符串
//! （保留标记字符 + 3 字母类型码 + 载荷），并把有限非零非整数的数字
//! 有损截断到 7 位有效数字。截断是刻意的"精度换体积"取舍，解码时
//! 不会也无法恢复。
//!
//! pubkey / map / set 仍使用包装对象形态；内联形态只由编码器选用，
//! 解码器对两种形态都无条件接受。

use serde_json::Value as JsonValue;

use super::decode::SIGIL;
use super::{json_number, tagged, SnapshotCodec};
use crate::value::SnapshotValue;

pub struct CompactCodec;

impl SnapshotCodec for CompactCodec {
    fn encode(&self, value: &SnapshotValue) -> JsonValue {
        encode_value(value)
    }
}

const MAX_SIG_FIGS: usize = 7;

fn encode_value(value: &SnapshotValue) -> JsonValue {
    match value {
        SnapshotValue::Null => JsonValue::Null,
        SnapshotValue::Bool(b) => JsonValue::Bool(*b),
        SnapshotValue::Number(n) => encode_number(*n),
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
        SnapshotValue::BigInt(big) => JsonValue::String(format!("{}BIG{}", SIGIL, big.as_str())),
        SnapshotValue::Timestamp(ts) => {
            JsonValue::String(format!("{}DAT{}", SIGIL, ts.timestamp_millis()))
        }
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

/// 有限、非零、非整数的数字截断到 7 位有效数字
///
/// 量级在 [1e-4, 1e6) 的"常规"数字只有在截断确实改变取值时才替换，
/// 避免无谓的精度抖动；极大/极小数字一律截断。
fn encode_number(n: f64) -> JsonValue {
    if !n.is_finite() || n == 0.0 || n.fract() == 0.0 {
        return json_number(n);
    }
    let abs = n.abs();
    if (1e-4..1e6).contains(&abs) {
        let truncated = round_sig_figs(n);
        if truncated == n {
            json_number(n)
        } else {
            json_number(truncated)
        }
    } else {
        json_number(round_sig_figs(n))
    }
}

fn round_sig_figs(n: f64) -> f64 {
    format!("{:.*e}", MAX_SIG_FIGS - 1, n).parse().unwrap_or(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::resolve;
    use crate::formats::FormatVersion;
    use crate::value::BigInt;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_bigint_and_date_use_sigil_form() {
        let encoded = CompactCodec.encode(&SnapshotValue::BigInt(BigInt::from(12345_i64)));
        assert_eq!(encoded, json!(format!("{}BIG12345", SIGIL)));

        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let encoded = CompactCodec.encode(&SnapshotValue::Timestamp(ts));
        assert_eq!(encoded, json!(format!("{}DAT1700000000123", SIGIL)));
    }

    #[test]
    fn test_rounding_to_seven_significant_digits() {
        let original = 0.123456789_f64;
        let encoded = CompactCodec.encode(&SnapshotValue::Number(original));
        let rounded = encoded.as_f64().unwrap();
        assert_eq!(rounded, 0.1234568);
        // 有损截断：解码不逆转，但在 7 位有效数字的舍入范围内
        assert!((rounded - original).abs() < 1e-7);
    }

    #[test]
    fn test_integers_and_exact_values_untouched() {
        // 整数不截断
        let encoded = CompactCodec.encode(&SnapshotValue::Number(1234567890.0));
        assert_eq!(encoded.as_f64().unwrap(), 1234567890.0);
        // 已经在 7 位精度内可精确表示的值不改动
        let encoded = CompactCodec.encode(&SnapshotValue::Number(2.25));
        assert_eq!(encoded.as_f64().unwrap(), 2.25);
        // 零不截断
        let encoded = CompactCodec.encode(&SnapshotValue::Number(0.0));
        assert_eq!(encoded.as_f64().unwrap(), 0.0);
    }

    #[test]
    fn test_extreme_magnitudes_always_truncated() {
        let encoded = CompactCodec.encode(&SnapshotValue::Number(1.23456789012e-9));
        assert_eq!(encoded.as_f64().unwrap(), 1.234568e-9);

        let encoded = CompactCodec.encode(&SnapshotValue::Number(9_876_543.21));
        assert_eq!(encoded.as_f64().unwrap(), 9_876_543.0);
    }

    #[test]
    fn test_rounding_survives_round_trip_within_tolerance() {
        let codec = resolve(FormatVersion::V2);
        let original = 3.14159265358979_f64;
        let decoded = codec.decode(&codec.encode(&SnapshotValue::Number(original))).unwrap();
        match decoded {
            SnapshotValue::Number(n) => {
                assert_eq!(n, 3.141593);
                assert!((n - original).abs() < 1e-6);
            }
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_values_inside_map_use_compact_rules() {
        let mut map = crate::value::OrderedMap::new();
        map.insert("total".into(), SnapshotValue::BigInt(BigInt::from(10_u64)));
        let encoded = CompactCodec.encode(&SnapshotValue::Map(map));
        // map 本身是包装对象，内部的大整数依然走 sigil 编码
        let entries = encoded.get("value").and_then(|v| v.as_array()).unwrap();
        let inner = entries[0].as_array().unwrap();
        assert_eq!(inner[1], json!(format!("{}BIG10", SIGIL)));
    }
}
