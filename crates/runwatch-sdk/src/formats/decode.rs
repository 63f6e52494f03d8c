//! 共享解码器
//!
//! 所有格式版本共用这一套解码逻辑：无条件识别包装对象
//! `{ "___type": ..., "value": ... }` 与 sigil 内联字符串两种形态。
//! 这样"解码任何历史版本产生过的数据"的不变量只需在一处维护。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::error::{Result, RunwatchSDKError};
use crate::value::{BigInt, OpaqueKey, OrderedMap, SnapshotValue, UniqueSet};

/// 内联编码的保留标记字符
///
/// 数据本身若含有该字符将无法与内联编码区分，属于已知取舍。
pub(crate) const SIGIL: char = '\u{0FCF}';

/// 包装对象的类型判别字段
pub(crate) const TYPE_KEY: &str = "___type";

pub(crate) fn decode_value(value: &JsonValue) -> Result<SnapshotValue> {
    match value {
        JsonValue::Null => Ok(SnapshotValue::Null),
        JsonValue::Bool(b) => Ok(SnapshotValue::Bool(*b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(SnapshotValue::Number)
            .ok_or_else(|| RunwatchSDKError::Decode(format!("unrepresentable number `{}`", n))),
        JsonValue::String(s) => decode_string(s),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decode_value(item)?);
            }
            Ok(SnapshotValue::Array(out))
        }
        JsonValue::Object(fields) => {
            match fields.get(TYPE_KEY).and_then(JsonValue::as_str) {
                Some(tag) => decode_tagged(tag, fields.get("value"), value),
                // `___type` 缺失或不是字符串：普通对象
                None => decode_plain_object(fields),
            }
        }
    }
}

fn decode_plain_object(fields: &serde_json::Map<String, JsonValue>) -> Result<SnapshotValue> {
    let mut out = BTreeMap::new();
    for (key, value) in fields {
        out.insert(key.clone(), decode_value(value)?);
    }
    Ok(SnapshotValue::Object(out))
}

/// 字符串解码：识别 sigil 内联形态，其余原样透传
fn decode_string(s: &str) -> Result<SnapshotValue> {
    let Some(rest) = s.strip_prefix(SIGIL) else {
        return Ok(SnapshotValue::String(s.to_string()));
    };
    let mut chars = rest.chars();
    let code: String = chars.by_ref().take(3).collect();
    let payload = chars.as_str();
    match code.as_str() {
        "BIG" => Ok(SnapshotValue::BigInt(BigInt::parse(payload)?)),
        "DAT" => {
            let millis: i64 = payload.parse().map_err(|_| {
                RunwatchSDKError::Decode(format!("invalid millisecond timestamp `{}`", payload))
            })?;
            timestamp_from_millis(millis).map(SnapshotValue::Timestamp)
        }
        _ => Err(RunwatchSDKError::UnknownSigil {
            code,
            value: s.to_string(),
        }),
    }
}

/// 包装对象解码
///
/// 判别器已知但 `value` 形状不符、或判别器未注册时，整条记录按解码失败
/// 处理（由上层按记录粒度跳过）。
fn decode_tagged(
    tag: &str,
    value_field: Option<&JsonValue>,
    whole: &JsonValue,
) -> Result<SnapshotValue> {
    match (tag, value_field) {
        ("pubkey", Some(JsonValue::String(s))) => {
            Ok(SnapshotValue::Pubkey(OpaqueKey::new(s.as_str())))
        }
        ("bigint", Some(JsonValue::String(s))) => Ok(SnapshotValue::BigInt(BigInt::parse(s)?)),
        ("date", Some(JsonValue::String(s))) => parse_datetime(s).map(SnapshotValue::Timestamp),
        ("date", Some(JsonValue::Number(n))) => {
            let millis = n.as_i64().ok_or_else(|| {
                RunwatchSDKError::Decode(format!("invalid millisecond timestamp `{}`", n))
            })?;
            timestamp_from_millis(millis).map(SnapshotValue::Timestamp)
        }
        ("map", Some(JsonValue::Array(entries))) => {
            let mut map = OrderedMap::new();
            for entry in entries {
                let JsonValue::Array(pair) = entry else {
                    return Err(RunwatchSDKError::Decode(
                        "map entry is not a [key, value] pair".to_string(),
                    ));
                };
                if pair.len() != 2 {
                    return Err(RunwatchSDKError::Decode(
                        "map entry is not a [key, value] pair".to_string(),
                    ));
                }
                map.insert(decode_value(&pair[0])?, decode_value(&pair[1])?);
            }
            Ok(SnapshotValue::Map(map))
        }
        ("set", Some(JsonValue::Array(items))) => {
            let mut set = UniqueSet::new();
            for item in items {
                set.insert(decode_value(item)?);
            }
            Ok(SnapshotValue::Set(set))
        }
        ("pubkey" | "bigint" | "date" | "map" | "set", _) => Err(RunwatchSDKError::Decode(
            format!("malformed `{}` wrapper: {}", tag, whole),
        )),
        (unknown, _) => Err(RunwatchSDKError::Decode(format!(
            "unknown ___type discriminator `{}`",
            unknown
        ))),
    }
}

/// 包装形态的时间戳字符串：RFC 3339 优先，退回 RFC 2822
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    Err(RunwatchSDKError::Decode(format!(
        "unparseable date string `{}`",
        s
    )))
}

fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        RunwatchSDKError::Decode(format!("millisecond timestamp `{}` out of range", millis))
    })
}
