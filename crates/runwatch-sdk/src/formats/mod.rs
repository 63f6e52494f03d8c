//! 格式版本注册表
//!
//! 维护"版本标识 → 编解码器"的映射：
//! - 编码侧默认使用 [`CURRENT_VERSION`]
//! - 解码侧必须永久接受所有历史版本产生过的数据，从注册表中移除任何版本
//!   都等于破坏已持久化/在途数据，绝不允许
//!
//! 按设计，`unversioned` 与 `1` 使用自描述包装对象编码，`2` 对大整数和
//! 时间戳改用内联 sigil 字符串编码以压缩体积。三个版本共享同一个解码器
//! （见 [`decode`]），它无条件识别两种编码形态。

mod decode;

pub mod compact;
pub mod wrapper;

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;

use crate::error::{Result, RunwatchSDKError};
use crate::value::SnapshotValue;

/// 格式版本标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    /// 早期未带版本号的部署
    Unversioned,
    /// 版本 1：自描述包装对象编码
    V1,
    /// 版本 2：对大整数/时间戳使用内联 sigil 编码
    V2,
}

/// 当前编码版本（编码侧未指定版本时的默认值）
pub const CURRENT_VERSION: FormatVersion = FormatVersion::V2;

impl FormatVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVersion::Unversioned => "unversioned",
            FormatVersion::V1 => "1",
            FormatVersion::V2 => "2",
        }
    }

    /// 全部注册版本
    pub fn all() -> [FormatVersion; 3] {
        [
            FormatVersion::Unversioned,
            FormatVersion::V1,
            FormatVersion::V2,
        ]
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatVersion {
    type Err = RunwatchSDKError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unversioned" => Ok(FormatVersion::Unversioned),
            "1" => Ok(FormatVersion::V1),
            "2" => Ok(FormatVersion::V2),
            other => Err(RunwatchSDKError::Configuration(format!(
                "unknown format version `{}`",
                other
            ))),
        }
    }
}

/// 快照编解码器
///
/// `encode` 按版本各异；`decode` 是所有版本共享的同一套逻辑，对任何
/// 历史版本产生过的 JSON 树都是全函数。
pub trait SnapshotCodec: Send + Sync {
    /// 将快照值编码为 JSON 树
    fn encode(&self, value: &SnapshotValue) -> JsonValue;

    /// 从 JSON 树还原快照值（识别包装对象与 sigil 两种形态）
    fn decode(&self, value: &JsonValue) -> Result<SnapshotValue> {
        decode::decode_value(value)
    }
}

static WRAPPER_CODEC: wrapper::WrapperCodec = wrapper::WrapperCodec;
static COMPACT_CODEC: compact::CompactCodec = compact::CompactCodec;

/// 解析版本对应的编解码器
///
/// 对枚举内的所有版本永远可解析；字符串形式的版本号经
/// [`FormatVersion::from_str`] 解析，未注册的标识立即报配置错误。
pub fn resolve(version: FormatVersion) -> &'static dyn SnapshotCodec {
    match version {
        FormatVersion::Unversioned | FormatVersion::V1 => &WRAPPER_CODEC,
        FormatVersion::V2 => &COMPACT_CODEC,
    }
}

/// 按字符串版本号解析编解码器
pub fn resolve_str(version: &str) -> Result<&'static dyn SnapshotCodec> {
    Ok(resolve(version.parse()?))
}

/// 构造包装对象 `{ "___type": tag, "value": ... }`
pub(crate) fn tagged(tag: &str, value: JsonValue) -> JsonValue {
    let mut object = serde_json::Map::with_capacity(2);
    object.insert("___type".to_string(), JsonValue::String(tag.to_string()));
    object.insert("value".to_string(), value);
    JsonValue::Object(object)
}

/// 将 f64 转为 JSON 数字（NaN/无穷大编码为 null，与 JSON 序列化惯例一致）
pub(crate) fn json_number(n: f64) -> JsonValue {
    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
