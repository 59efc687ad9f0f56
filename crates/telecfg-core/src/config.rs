//! # config 模块说明
//!
//! ## 意图（Why）
//! - 命令行工具与二级进程共享同一份 TOML 配置：日志过滤器、二级进程的启动方式、仿真设备镜像位置；
//! - 使用 `serde` 解析为强类型结构，缺省字段一律回落到默认值。
//!
//! ## 契约（What）
//! - 文件不存在时 [`BridgeConfig::load`] 返回默认配置；其他读取失败与解析失败返回 [`ConfigError`]；
//! - 未知字段视为错误，避免拼写错误被静默忽略。

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::context::SHELL_UID;

/// 配置加载失败。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// 顶层配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub logging: LoggingConfig,
    pub launcher: LauncherConfig,
    pub device: DeviceConfig,
}

/// `[logging]`：`RUST_LOG` 未设置时使用的过滤表达式。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: Option<String>,
}

/// `[launcher]`：二级进程的程序路径与提升身份用的 argv 前缀。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    /// 缺省为当前可执行文件。
    pub program: Option<PathBuf>,
    pub elevate: Vec<String>,
}

/// `[device]`：设备镜像位置与委托身份的目标 uid。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub image: Option<PathBuf>,
    pub caller_uid: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            image: None,
            caller_uid: SHELL_UID,
        }
    }
}

impl BridgeConfig {
    /// 解析 TOML 文本；`origin` 仅用于错误信息。
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw, path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}
