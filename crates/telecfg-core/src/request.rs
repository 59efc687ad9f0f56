//! # request 模块说明
//!
//! ## 角色定位（Why）
//! - 委托路径需要把一次覆写请求跨越进程边界交给二级进程，并取回类型化的完成记录；
//! - 本模块定义请求的线格式（扁平的字符串键值包）与完成记录的 JSON 行格式。
//!
//! ## 线格式（What）
//! - `telecfg.clear=<true|false>`、`telecfg.sub_id=<整数>`；
//! - 非清除请求额外为每个覆写条目写一个 `cfg:<键>=<类型化值>`，值格式见 [`ConfigValue::to_wire`]；
//! - 命令行上每个条目展开为 `-e <名> <值>` 三个参数；
//! - 完成记录是一行 JSON：`{"status":"applied","shape":"persistent"}` 或
//!   `{"status":"failed","kind":"permission_denied","message":"..."}`。
//!
//! ## 约束（Constraints）
//! - 请求由桥接层创建，被二级进程恰好消费一次后丢弃；
//! - 清除请求不得携带 `cfg:` 条目，解码时视为格式错误。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BridgeError;
use crate::value::{ConfigValue, OverrideSet};

pub const CLEAR_ENTRY: &str = "telecfg.clear";
pub const SUBSCRIPTION_ENTRY: &str = "telecfg.sub_id";
pub const CONFIG_PREFIX: &str = "cfg:";
pub const EXTRA_FLAG: &str = "-e";

/// 请求编解码失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestCodecError {
    #[error("typed value `{raw}` has no type tag")]
    MissingTypeTag { raw: String },
    #[error("unknown value type tag `{tag}`")]
    UnknownTypeTag { tag: String },
    #[error("invalid `{tag}` value `{raw}`: {detail}")]
    InvalidValue {
        tag: String,
        raw: String,
        detail: String,
    },
    #[error("argument bag has no `{name}` entry")]
    MissingEntry { name: &'static str },
    #[error("argument bag entry `{name}` has invalid value `{raw}`")]
    InvalidEntry { name: String, raw: String },
    #[error("argument bag entry `{name}` is not recognised")]
    UnknownEntry { name: String },
    #[error("clear request carries {count} override entries")]
    ConflictingClear { count: usize },
    #[error("launch argument `{name}` appears more than once")]
    DuplicateEntry { name: String },
    #[error("unexpected launch argument `{token}`")]
    UnexpectedToken { token: String },
    #[error("launch argument list ends inside an `-e` triple")]
    Truncated,
}

/// 跨进程传递的扁平键值包，保持插入顺序。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArgumentBag {
    entries: Vec<(String, String)>,
}

impl ArgumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入条目；同名条目已存在时替换其值。
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 展开为 `-e <名> <值>` 形式的命令行参数。
    pub fn to_command_args(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(name, value)| [EXTRA_FLAG.to_owned(), name.clone(), value.clone()])
            .collect()
    }

    /// 解析 [`ArgumentBag::to_command_args`] 的输出；同名条目重复出现即拒绝。
    pub fn from_command_args<I, S>(args: I) -> Result<Self, RequestCodecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut bag = Self::new();
        let mut args = args.into_iter().map(Into::into);
        while let Some(token) = args.next() {
            if token != EXTRA_FLAG {
                return Err(RequestCodecError::UnexpectedToken { token });
            }
            let name = args.next().ok_or(RequestCodecError::Truncated)?;
            let value = args.next().ok_or(RequestCodecError::Truncated)?;
            if bag.get(&name).is_some() {
                return Err(RequestCodecError::DuplicateEntry { name });
            }
            bag.insert(name, value);
        }
        Ok(bag)
    }
}

/// 委托给二级进程的一次覆写请求。
///
/// `overrides == None` 即清除该订阅的全部覆写。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegatedRequest {
    pub subscription_id: i32,
    pub overrides: Option<OverrideSet>,
}

impl DelegatedRequest {
    pub fn new(subscription_id: i32, overrides: Option<OverrideSet>) -> Self {
        Self {
            subscription_id,
            overrides,
        }
    }

    pub fn is_clear(&self) -> bool {
        self.overrides.is_none()
    }

    pub fn to_bag(&self) -> ArgumentBag {
        let mut bag = ArgumentBag::new();
        bag.insert(CLEAR_ENTRY, self.is_clear().to_string());
        bag.insert(SUBSCRIPTION_ENTRY, self.subscription_id.to_string());
        if let Some(overrides) = &self.overrides {
            for (key, value) in overrides.iter() {
                bag.insert(format!("{CONFIG_PREFIX}{key}"), value.to_wire());
            }
        }
        bag
    }

    pub fn from_bag(bag: &ArgumentBag) -> Result<Self, RequestCodecError> {
        let clear = parse_entry::<bool>(bag, CLEAR_ENTRY)?;
        let subscription_id = parse_entry::<i32>(bag, SUBSCRIPTION_ENTRY)?;
        let mut overrides = OverrideSet::new();
        for (name, raw) in bag.iter() {
            if name == CLEAR_ENTRY || name == SUBSCRIPTION_ENTRY {
                continue;
            }
            let key = name
                .strip_prefix(CONFIG_PREFIX)
                .filter(|key| !key.is_empty())
                .ok_or_else(|| RequestCodecError::UnknownEntry {
                    name: name.to_owned(),
                })?;
            overrides.insert(key, ConfigValue::from_wire(raw)?);
        }
        if clear {
            if !overrides.is_empty() {
                return Err(RequestCodecError::ConflictingClear {
                    count: overrides.len(),
                });
            }
            return Ok(Self::new(subscription_id, None));
        }
        Ok(Self::new(subscription_id, Some(overrides)))
    }

    pub fn to_command_args(&self) -> Vec<String> {
        self.to_bag().to_command_args()
    }

    /// 解析二级进程收到的启动参数；参数为空时返回 `None`。
    pub fn from_command_args<I, S>(args: I) -> Result<Option<Self>, RequestCodecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bag = ArgumentBag::from_command_args(args)?;
        if bag.is_empty() {
            return Ok(None);
        }
        Self::from_bag(&bag).map(Some)
    }
}

fn parse_entry<T: std::str::FromStr>(
    bag: &ArgumentBag,
    name: &'static str,
) -> Result<T, RequestCodecError> {
    let raw = bag
        .get(name)
        .ok_or(RequestCodecError::MissingEntry { name })?;
    raw.parse().map_err(|_| RequestCodecError::InvalidEntry {
        name: name.to_owned(),
        raw: raw.to_owned(),
    })
}

/// 二级进程内失败的分类，与直接路径的错误粒度一一对应。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionFailure {
    NotFound,
    PermissionDenied,
    /// 无法获取 shell 身份。
    Identity,
    ServiceUnavailable,
    Malformed,
    Remote,
}

impl CompletionFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Identity => "identity",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Malformed => "malformed",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for CompletionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 二级进程回报的完成记录。
///
/// # 教案式说明
/// - **意图 (Why)**：仅凭“进程结束”无法区分成功与失败，类型化记录让委托路径与直接路径的
///   错误粒度一致；
/// - **契约 (What)**：以单行 JSON 写到二级进程的标准输出；`Applied` 对应退出码 0，
///   `Failed` 对应非零退出码；[`Completion::into_result`] 把 `Failed` 还原为
///   [`BridgeError::DelegatedFailure`]。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completion {
    Applied {
        shape: String,
    },
    Failed {
        kind: CompletionFailure,
        message: String,
    },
}

impl Completion {
    pub fn applied(shape: impl Into<String>) -> Self {
        Self::Applied {
            shape: shape.into(),
        }
    }

    pub fn failed(kind: CompletionFailure, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
        }
    }

    /// 把二级进程内的错误折叠为 `Failed` 记录。
    pub fn from_error(error: &BridgeError) -> Self {
        let kind = match error {
            BridgeError::ServiceUnavailable { .. } => CompletionFailure::ServiceUnavailable,
            BridgeError::NotFound { .. } | BridgeError::UnsupportedFeature { .. } => {
                CompletionFailure::NotFound
            }
            BridgeError::PermissionDenied { .. } => CompletionFailure::PermissionDenied,
            BridgeError::Remote { .. } | BridgeError::Delegation { .. } => {
                CompletionFailure::Remote
            }
            BridgeError::DelegatedFailure { kind, .. } => *kind,
            BridgeError::MalformedRequest(_) | BridgeError::Config(_) => {
                CompletionFailure::Malformed
            }
        };
        Self::failed(kind, error.to_string())
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Applied { .. } => 0,
            Self::Failed { .. } => 1,
        }
    }

    pub fn to_json_line(&self) -> String {
        // 仅含字符串与单元枚举，序列化不会失败。
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"failed","kind":"malformed","message":"completion encoding failed"}"#
                .to_owned()
        })
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// 成功时返回落地的调用形态标签。
    pub fn into_result(self) -> Result<String, BridgeError> {
        match self {
            Self::Applied { shape } => Ok(shape),
            Self::Failed { kind, message } => Err(BridgeError::DelegatedFailure { kind, message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_layout_matches_launch_contract() {
        let request = DelegatedRequest::new(
            5,
            Some(OverrideSet::single("carrier_volte_available_bool", true)),
        );
        assert_eq!(
            request.to_command_args(),
            [
                "-e",
                "telecfg.clear",
                "false",
                "-e",
                "telecfg.sub_id",
                "5",
                "-e",
                "cfg:carrier_volte_available_bool",
                "bool:true",
            ]
        );
    }

    #[test]
    fn clear_request_has_no_config_entries() {
        let bag = DelegatedRequest::new(3, None).to_bag();
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get(CLEAR_ENTRY), Some("true"));
    }

    #[test]
    fn clear_with_overrides_is_rejected() {
        let mut bag = DelegatedRequest::new(3, None).to_bag();
        bag.insert("cfg:vonr_enabled_bool", "bool:true");
        assert_eq!(
            DelegatedRequest::from_bag(&bag),
            Err(RequestCodecError::ConflictingClear { count: 1 })
        );
    }

    #[test]
    fn empty_argument_list_is_a_no_op() {
        assert_eq!(
            DelegatedRequest::from_command_args(Vec::<String>::new()),
            Ok(None)
        );
    }

    #[test]
    fn completion_json_is_tagged_by_status() {
        assert_eq!(
            Completion::applied("persistent").to_json_line(),
            r#"{"status":"applied","shape":"persistent"}"#
        );
        let failed = Completion::failed(CompletionFailure::PermissionDenied, "refused");
        assert_eq!(
            failed.to_json_line(),
            r#"{"status":"failed","kind":"permission_denied","message":"refused"}"#
        );
        assert_eq!(failed.exit_code(), 1);
    }
}
