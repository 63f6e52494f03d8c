//! 快照值模型
//!
//! 将"原生值 / 扩展值"的边界做成显式的和类型：每种没有原生 JSON 表示的
//! 逻辑值（大整数、时间戳、有序映射、唯一集合、不透明标识符）各占一个变体，
//! 由生产方显式构造，而不是在运行时探测对象形状。
//!
//! 相等性一律按深度相等（结构相等）处理，有序映射的键和唯一集合的元素
//! 都以此去重。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Result, RunwatchSDKError};

/// 任意精度有符号整数，规范化十进制字符串表示
///
/// 只承载数值的序列化形态（可选负号 + 数字，无前导零），不提供算术运算。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInt(String);

impl BigInt {
    /// 解析并规范化一个十进制整数字符串
    ///
    /// 接受可选负号与任意多位数字；去除前导零，`-0` 规范化为 `0`。
    pub fn parse(input: &str) -> Result<Self> {
        let (negative, digits) = match input.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, input),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RunwatchSDKError::Decode(format!(
                "invalid bigint literal `{}`",
                input
            )));
        }
        let trimmed = digits.trim_start_matches('0');
        let canonical = if trimmed.is_empty() {
            "0".to_string()
        } else if negative {
            format!("-{}", trimmed)
        } else {
            trimmed.to_string()
        };
        Ok(BigInt(canonical))
    }

    /// 十进制字符串表示
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 是否为负数
    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }
}

impl From<i64> for BigInt {
    fn from(value: i64) -> Self {
        BigInt(value.to_string())
    }
}

impl From<u64> for BigInt {
    fn from(value: u64) -> Self {
        BigInt(value.to_string())
    }
}

impl From<i128> for BigInt {
    fn from(value: i128) -> Self {
        BigInt(value.to_string())
    }
}

impl FromStr for BigInt {
    type Err = RunwatchSDKError;

    fn from_str(s: &str) -> Result<Self> {
        BigInt::parse(s)
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 不透明标识符
///
/// 定长字节标识符的 base58 风格渲染结果。核心从不解释其字节内容，
/// 只做原样透传与相等比较。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpaqueKey(String);

impl OpaqueKey {
    pub fn new(rendered: impl Into<String>) -> Self {
        OpaqueKey(rendered.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 有序映射：按插入顺序保存 (键, 值) 对，键按深度相等去重
///
/// 重复键插入时替换值但保留首次插入的位置。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderedMap {
    entries: Vec<(SnapshotValue, SnapshotValue)>,
}

impl OrderedMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一个键值对，返回被替换的旧值（如有）
    pub fn insert(&mut self, key: SnapshotValue, value: SnapshotValue) -> Option<SnapshotValue> {
        for (existing, slot) in self.entries.iter_mut() {
            if *existing == key {
                return Some(std::mem::replace(slot, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    /// 按深度相等查找键对应的值
    pub fn get(&self, key: &SnapshotValue) -> Option<&SnapshotValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(SnapshotValue, SnapshotValue)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(SnapshotValue, SnapshotValue)> {
        self.entries.iter()
    }
}

impl FromIterator<(SnapshotValue, SnapshotValue)> for OrderedMap {
    fn from_iter<I: IntoIterator<Item = (SnapshotValue, SnapshotValue)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// 唯一集合：按插入顺序保存元素，按深度相等去重
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UniqueSet {
    items: Vec<SnapshotValue>,
}

impl UniqueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一个元素；已存在（深度相等）时返回 false
    pub fn insert(&mut self, value: SnapshotValue) -> bool {
        if self.items.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &SnapshotValue) -> bool {
        self.items.contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SnapshotValue] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotValue> {
        self.items.iter()
    }
}

impl FromIterator<SnapshotValue> for UniqueSet {
    fn from_iter<I: IntoIterator<Item = SnapshotValue>>(iter: I) -> Self {
        let mut set = UniqueSet::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

/// 快照值：普通 JSON 值与扩展值的和类型
///
/// 一棵快照树就是远端状态在某一时刻的完整（非增量）表示，产生后不可变。
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<SnapshotValue>),
    /// 普通 JSON 对象（字符串键，插入顺序无关）
    Object(BTreeMap<String, SnapshotValue>),
    /// 任意精度整数
    BigInt(BigInt),
    /// 毫秒精度时间戳
    Timestamp(DateTime<Utc>),
    /// 有序键值映射
    Map(OrderedMap),
    /// 唯一元素集合
    Set(UniqueSet),
    /// 不透明标识符
    Pubkey(OpaqueKey),
}

impl SnapshotValue {
    /// 顶层 Object 字段查找（消费者便捷访问）
    pub fn get(&self, key: &str) -> Option<&SnapshotValue> {
        match self {
            SnapshotValue::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SnapshotValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SnapshotValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SnapshotValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SnapshotValue::Null)
    }
}

impl From<bool> for SnapshotValue {
    fn from(value: bool) -> Self {
        SnapshotValue::Bool(value)
    }
}

impl From<f64> for SnapshotValue {
    fn from(value: f64) -> Self {
        SnapshotValue::Number(value)
    }
}

impl From<&str> for SnapshotValue {
    fn from(value: &str) -> Self {
        SnapshotValue::String(value.to_string())
    }
}

impl From<String> for SnapshotValue {
    fn from(value: String) -> Self {
        SnapshotValue::String(value)
    }
}

impl From<BigInt> for SnapshotValue {
    fn from(value: BigInt) -> Self {
        SnapshotValue::BigInt(value)
    }
}

impl From<DateTime<Utc>> for SnapshotValue {
    fn from(value: DateTime<Utc>) -> Self {
        SnapshotValue::Timestamp(value)
    }
}
