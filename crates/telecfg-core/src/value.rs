use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::RequestCodecError;

/// 运营商配置值的类型化表示。
///
/// ### 设计目标（Why）
/// - 运营商配置包（`PersistableBundle`）只承载少数几种类型：布尔、32 位整数、64 位整数、字符串
///   及它们的数组形式；用强类型枚举表达可避免字符串配置带来的解析歧义。
///
/// ### 契约定义（What）
/// - `Int` 对应 `*_int` 键，`Long` 对应 `*_long` 键，二者不会相互隐式转换；
/// - JSON 表示采用 `{"type": "bool", "value": true}` 的邻接标签形式，供设备镜像持久化；
/// - 跨进程线格式见 [`ConfigValue::to_wire`]。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConfigValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    String(String),
    BoolArray(Vec<bool>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    StringArray(Vec<String>),
}

impl ConfigValue {
    /// 线格式中的类型标签。
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::String(_) => "string",
            Self::BoolArray(_) => "bool[]",
            Self::IntArray(_) => "int[]",
            Self::LongArray(_) => "long[]",
            Self::StringArray(_) => "string[]",
        }
    }

    /// 编码为 `<类型标签>:<值>` 形式的单个字符串。
    ///
    /// ### 契约（What）
    /// - 标量直接写出：`bool:true`、`int:5`、`long:7`、`string:任意文本`（冒号之后原样保留）；
    /// - 数组写为 JSON 列表：`int[]:[1,2]`、`string[]:["a","b"]`；
    /// - 与 [`ConfigValue::from_wire`] 互逆。
    pub fn to_wire(&self) -> String {
        let body = match self {
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Long(value) => value.to_string(),
            Self::String(value) => value.clone(),
            Self::BoolArray(values) => json_list(values),
            Self::IntArray(values) => json_list(values),
            Self::LongArray(values) => json_list(values),
            Self::StringArray(values) => json_list(values),
        };
        format!("{}:{}", self.type_tag(), body)
    }

    /// 解析 [`ConfigValue::to_wire`] 产生的字符串。
    pub fn from_wire(raw: &str) -> Result<Self, RequestCodecError> {
        let (tag, body) = raw
            .split_once(':')
            .ok_or_else(|| RequestCodecError::MissingTypeTag {
                raw: raw.to_owned(),
            })?;
        let invalid = |detail: String| RequestCodecError::InvalidValue {
            tag: tag.to_owned(),
            raw: body.to_owned(),
            detail,
        };
        let value = match tag {
            "bool" => Self::Bool(body.parse().map_err(|e| invalid(format!("{e}")))?),
            "int" => Self::Int(body.parse().map_err(|e| invalid(format!("{e}")))?),
            "long" => Self::Long(body.parse().map_err(|e| invalid(format!("{e}")))?),
            "string" => Self::String(body.to_owned()),
            "bool[]" => {
                Self::BoolArray(serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?)
            }
            "int[]" => {
                Self::IntArray(serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?)
            }
            "long[]" => {
                Self::LongArray(serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?)
            }
            "string[]" => Self::StringArray(
                serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?,
            ),
            other => {
                return Err(RequestCodecError::UnknownTypeTag {
                    tag: other.to_owned(),
                });
            }
        };
        Ok(value)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool_array(&self) -> Option<&[bool]> {
        match self {
            Self::BoolArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Self::IntArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Self::LongArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Self::StringArray(values) => Some(values),
            _ => None,
        }
    }
}

fn json_list<T: Serialize>(values: &[T]) -> String {
    // 基础类型与字符串的序列化不会失败。
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_owned())
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Long(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::BoolArray(values) => write!(f, "{values:?}"),
            Self::IntArray(values) => write!(f, "{values:?}"),
            Self::LongArray(values) => write!(f, "{values:?}"),
            Self::StringArray(values) => write!(f, "{values:?}"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<Vec<bool>> for ConfigValue {
    fn from(values: Vec<bool>) -> Self {
        Self::BoolArray(values)
    }
}

impl From<Vec<i32>> for ConfigValue {
    fn from(values: Vec<i32>) -> Self {
        Self::IntArray(values)
    }
}

impl From<Vec<i64>> for ConfigValue {
    fn from(values: Vec<i64>) -> Self {
        Self::LongArray(values)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(values: Vec<String>) -> Self {
        Self::StringArray(values)
    }
}

/// 一次原子提交的覆写集合。
///
/// ### 设计目标（Why）
/// - 对应一次 `overrideConfig` 请求携带的配置包：逐步构建，整体提交；
/// - 以 `BTreeMap` 存储保证键唯一且迭代顺序稳定，线格式与日志因此可复现。
///
/// ### 契约说明（What）
/// - 同一键重复写入时后写覆盖先写；
/// - “清除全部覆写”不由空集合表达，而是由调用方传入 `None`（见 [`crate::bridge`]）。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideSet {
    entries: BTreeMap<String, ConfigValue>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅包含一个条目的覆写集合。
    pub fn single(key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Self::new().with(key, value)
    }

    /// 链式追加条目。
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// 写入条目，返回被覆盖的旧值。
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Option<ConfigValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for OverrideSet
where
    K: Into<String>,
    V: Into<ConfigValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

/// 某个订阅当前生效（可能已被覆写）的配置快照。
///
/// 类型化读取在键缺失或类型不符时返回 `None`，默认值的选择留给门面层。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigBundle {
    entries: BTreeMap<String, ConfigValue>,
}

impl ConfigBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以覆写集合中的条目替换同名键。
    pub fn apply(&mut self, overrides: &OverrideSet) {
        for (key, value) in overrides.iter() {
            self.entries.insert(key.to_owned(), value.clone());
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ConfigValue::as_bool)
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(ConfigValue::as_int)
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_long)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    pub fn get_bool_array(&self, key: &str) -> Option<&[bool]> {
        self.get(key).and_then(ConfigValue::as_bool_array)
    }

    pub fn get_int_array(&self, key: &str) -> Option<&[i32]> {
        self.get(key).and_then(ConfigValue::as_int_array)
    }

    pub fn get_long_array(&self, key: &str) -> Option<&[i64]> {
        self.get(key).and_then(ConfigValue::as_long_array)
    }

    pub fn get_string_array(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(ConfigValue::as_string_array)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigBundle
where
    K: Into<String>,
    V: Into<ConfigValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bundle = Self::new();
        for (key, value) in iter {
            bundle.insert(key, value);
        }
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_keeps_colons_inside_strings() {
        let value = ConfigValue::from("VoLTE:UA/1.0");
        assert_eq!(value.to_wire(), "string:VoLTE:UA/1.0");
        assert_eq!(ConfigValue::from_wire("string:VoLTE:UA/1.0").unwrap(), value);
    }

    #[test]
    fn wire_form_rejects_unknown_tags_and_bad_scalars() {
        assert!(matches!(
            ConfigValue::from_wire("float:1.5"),
            Err(RequestCodecError::UnknownTypeTag { .. })
        ));
        assert!(matches!(
            ConfigValue::from_wire("int:five"),
            Err(RequestCodecError::InvalidValue { .. })
        ));
        assert!(matches!(
            ConfigValue::from_wire("true"),
            Err(RequestCodecError::MissingTypeTag { .. })
        ));
    }

    #[test]
    fn override_set_is_last_write_wins() {
        let mut set = OverrideSet::single("carrier_volte_available_bool", true);
        let previous = set.insert("carrier_volte_available_bool", false);
        assert_eq!(previous, Some(ConfigValue::Bool(true)));
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get("carrier_volte_available_bool"),
            Some(&ConfigValue::Bool(false))
        );
    }

    #[test]
    fn bundle_getters_ignore_mismatched_types() {
        let bundle: ConfigBundle = [("wfc_spn_format_idx_int", ConfigValue::Int(2))]
            .into_iter()
            .collect();
        assert_eq!(bundle.get_int("wfc_spn_format_idx_int"), Some(2));
        assert_eq!(bundle.get_long("wfc_spn_format_idx_int"), None);
        assert_eq!(bundle.get_bool("missing_bool"), None);
    }

    #[test]
    fn bundle_json_uses_adjacent_tags() {
        let bundle: ConfigBundle = [("carrier_nr_availabilities_int_array", vec![1, 2])]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(
            json,
            r#"{"carrier_nr_availabilities_int_array":{"type":"int_array","value":[1,2]}}"#
        );
    }
}
