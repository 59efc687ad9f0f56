//! 设备镜像：仿真“服务进程”的全部可观察状态。
//!
//! 镜像可以只存在于内存，也可以落盘为 JSON 文件。文件模式下每次事务都重新读取并在修改后写回，
//! 因此两个进程（命令行与二级进程）看到的是同一份状态。

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use telecfg_core::features::keys;
use telecfg_core::{ConfigBundle, ConfigValue, OsRelease, SubscriptionInfo};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("failed to access device image `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("device image `{}` is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 远端调用记录。`shell` 表示调用时本进程是否持有 shell 身份。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub family: String,
    pub method: String,
    pub arity: usize,
    pub privileged: bool,
    pub shell: bool,
}

/// 设备镜像。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceImage {
    pub release: OsRelease,
    pub subscriptions: Vec<SubscriptionInfo>,
    #[serde(default)]
    pub default_subscription_id: i32,
    /// 运营商默认配置，按订阅号。
    #[serde(default)]
    pub defaults: BTreeMap<i32, ConfigBundle>,
    /// 活动覆写，服务进程重启即丢失。
    #[serde(default)]
    pub overrides: BTreeMap<i32, ConfigBundle>,
    #[serde(default)]
    pub ims_registered: BTreeMap<i32, bool>,
    /// 被重置 IMS 的卡槽，按发生顺序。
    #[serde(default)]
    pub ims_resets: Vec<i32>,
    #[serde(default)]
    pub call_log: Vec<CallRecord>,
    /// 平台系统资源中的布尔项，例如 `config_device_volte_available`。
    #[serde(default)]
    pub system_bools: BTreeMap<String, bool>,
}

impl DeviceImage {
    pub fn new(release: OsRelease) -> Self {
        Self {
            release,
            subscriptions: Vec::new(),
            default_subscription_id: telecfg_core::INVALID_SUBSCRIPTION_ID,
            defaults: BTreeMap::new(),
            overrides: BTreeMap::new(),
            ims_registered: BTreeMap::new(),
            ims_resets: Vec::new(),
            call_log: Vec::new(),
            system_bools: BTreeMap::new(),
        }
    }

    pub fn with_system_bool(mut self, name: impl Into<String>, value: bool) -> Self {
        self.system_bools.insert(name.into(), value);
        self
    }

    /// 追加一个订阅及其运营商默认配置；第一个订阅成为默认订阅。
    pub fn with_subscription(mut self, info: SubscriptionInfo, defaults: ConfigBundle) -> Self {
        if self.subscriptions.is_empty() {
            self.default_subscription_id = info.subscription_id;
        }
        self.defaults.insert(info.subscription_id, defaults);
        self.subscriptions.push(info);
        self
    }

    /// 双卡示例设备：订阅 1 位于卡槽 0，订阅 2 位于卡槽 1，设备具备 VoLTE 能力。
    pub fn sample(release: OsRelease) -> Self {
        let sim = |subscription_id: i32, slot_index: i32, carrier: &str| SubscriptionInfo {
            subscription_id,
            slot_index,
            display_name: format!("SIM {}", slot_index + 1),
            carrier_name: carrier.to_owned(),
        };
        Self::new(release)
            .with_subscription(sim(1, 0, "Example Mobile"), carrier_defaults())
            .with_subscription(sim(2, 1, "Sample Telecom"), carrier_defaults())
            .with_system_bool(telecfg_core::DEVICE_VOLTE_AVAILABLE, true)
    }

    /// 默认配置叠加活动覆写后的生效配置。
    pub fn effective_config(&self, subscription_id: i32) -> ConfigBundle {
        let mut bundle = self
            .defaults
            .get(&subscription_id)
            .cloned()
            .unwrap_or_default();
        if let Some(live) = self.overrides.get(&subscription_id) {
            for (key, value) in live.iter() {
                bundle.insert(key, value.clone());
            }
        }
        bundle
    }

    pub fn subscription(&self, subscription_id: i32) -> Option<&SubscriptionInfo> {
        self.subscriptions
            .iter()
            .find(|info| info.subscription_id == subscription_id)
    }

    pub fn subscription_in_slot(&self, slot_index: i32) -> Option<&SubscriptionInfo> {
        self.subscriptions
            .iter()
            .find(|info| info.slot_index == slot_index)
    }
}

/// 典型的保守运营商默认配置：多数 IMS 特性关闭。
pub fn carrier_defaults() -> ConfigBundle {
    [
        (keys::CARRIER_VOLTE_AVAILABLE, ConfigValue::Bool(false)),
        (keys::VONR_ENABLED, ConfigValue::Bool(false)),
        (keys::VONR_SETTING_VISIBILITY, ConfigValue::Bool(false)),
        (keys::CARRIER_WFC_IMS_AVAILABLE, ConfigValue::Bool(false)),
        (keys::CARRIER_VT_AVAILABLE, ConfigValue::Bool(false)),
        (keys::EDITABLE_ENHANCED_4G_LTE, ConfigValue::Bool(true)),
        (keys::ENHANCED_4G_LTE_ON_BY_DEFAULT, ConfigValue::Bool(true)),
        (keys::HIDE_ENHANCED_4G_LTE, ConfigValue::Bool(false)),
        (keys::CARRIER_NR_AVAILABILITIES, ConfigValue::IntArray(vec![1])),
        (keys::WFC_SPN_FORMAT_IDX, ConfigValue::Int(0)),
        (keys::IMS_USER_AGENT, ConfigValue::String(String::new())),
    ]
    .into_iter()
    .collect()
}

/// 镜像存储。
pub(crate) enum ImageStore {
    Memory(Mutex<DeviceImage>),
    File { path: PathBuf, guard: Mutex<()> },
}

impl ImageStore {
    pub(crate) fn memory(image: DeviceImage) -> Self {
        Self::Memory(Mutex::new(image))
    }

    pub(crate) fn file(path: &Path) -> Self {
        Self::File {
            path: path.to_path_buf(),
            guard: Mutex::new(()),
        }
    }

    pub(crate) fn read(&self) -> Result<DeviceImage, EmulatorError> {
        match self {
            Self::Memory(image) => Ok(image.lock().clone()),
            Self::File { path, guard } => {
                let _held = guard.lock();
                read_file(path)
            }
        }
    }

    /// 以读-改-写方式更新镜像。
    pub(crate) fn update<R>(
        &self,
        change: impl FnOnce(&mut DeviceImage) -> R,
    ) -> Result<R, EmulatorError> {
        match self {
            Self::Memory(image) => Ok(change(&mut image.lock())),
            Self::File { path, guard } => {
                let _held = guard.lock();
                let mut image = read_file(path)?;
                let result = change(&mut image);
                write_file(path, &image)?;
                Ok(result)
            }
        }
    }
}

pub(crate) fn read_file(path: &Path) -> Result<DeviceImage, EmulatorError> {
    let raw = std::fs::read_to_string(path).map_err(|source| EmulatorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| EmulatorError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_file(path: &Path, image: &DeviceImage) -> Result<(), EmulatorError> {
    let raw = serde_json::to_string_pretty(image).map_err(|source| EmulatorError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, raw).map_err(|source| EmulatorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_config_layers_overrides_on_defaults() {
        let mut image = DeviceImage::sample(OsRelease::new(34, "2024-01-01"));
        image.overrides.insert(
            1,
            [(keys::CARRIER_VOLTE_AVAILABLE, true)].into_iter().collect(),
        );
        let effective = image.effective_config(1);
        assert_eq!(effective.get_bool(keys::CARRIER_VOLTE_AVAILABLE), Some(true));
        assert_eq!(effective.get_int(keys::WFC_SPN_FORMAT_IDX), Some(0));
        assert_eq!(
            image.effective_config(2).get_bool(keys::CARRIER_VOLTE_AVAILABLE),
            Some(false)
        );
    }

    #[test]
    fn image_survives_json() {
        let image = DeviceImage::sample(OsRelease::new(33, "2025-09-05"));
        let raw = serde_json::to_string(&image).unwrap();
        let back: DeviceImage = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, image);
        assert_eq!(back.default_subscription_id, 1);
    }
}
