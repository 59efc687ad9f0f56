//! # facade 模块说明
//!
//! ## 角色定位（Why）
//! - 面向调用方的类型化配置门面：一个实例绑定一个 [`SubscriptionContext`]；
//! - 读取经由配置查找回退链取得生效快照，写入经由 [`crate::PrivilegeBridge`] 提交。
//!
//! ## 契约（What）
//! - 每次 `set_*` 都是一次独立的完整提交，不会自动合并；需要批量提交时使用 [`SubscriptionConfig::apply`]；
//! - 订阅号为负时读取直接返回类型默认值，不发出任何远端调用：
//!   `bool → false`、`int/long → -1`、`string → ""`、数组 → 空；
//! - 读取失败降级为默认值并记录 `warn!`；写入、清除与重启注册的失败原样上抛；
//! - 低于最低版本的特性标志读为 `false`，写入与翻转返回 [`BridgeError::UnsupportedFeature`]，不发出任何调用。

use tracing::{info, warn};

use crate::bridge::OverrideReceipt;
use crate::catalog;
use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::features::{FeatureFlag, keys};
use crate::resolver::InterfaceFamily;
use crate::subscription::SubscriptionContext;
use crate::value::{ConfigBundle, ConfigValue, OverrideSet};

/// 单个订阅的配置门面。
#[derive(Clone, Copy, Debug)]
pub struct SubscriptionConfig<'a> {
    ctx: &'a BridgeContext,
    subscription: SubscriptionContext,
}

impl<'a> SubscriptionConfig<'a> {
    pub fn new(ctx: &'a BridgeContext, subscription: SubscriptionContext) -> Self {
        Self { ctx, subscription }
    }

    pub fn subscription(&self) -> SubscriptionContext {
        self.subscription
    }

    pub fn subscription_id(&self) -> i32 {
        self.subscription.subscription_id()
    }

    // ---- 写入 ----

    pub fn set(&self, key: &str, value: impl Into<ConfigValue>) -> Result<OverrideReceipt> {
        self.apply(&OverrideSet::single(key, value))
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<OverrideReceipt> {
        self.set(key, value)
    }

    pub fn set_int(&self, key: &str, value: i32) -> Result<OverrideReceipt> {
        self.set(key, value)
    }

    pub fn set_long(&self, key: &str, value: i64) -> Result<OverrideReceipt> {
        self.set(key, value)
    }

    pub fn set_string(&self, key: &str, value: impl Into<String>) -> Result<OverrideReceipt> {
        self.set(key, value.into())
    }

    pub fn set_bool_array(&self, key: &str, values: Vec<bool>) -> Result<OverrideReceipt> {
        self.set(key, values)
    }

    pub fn set_int_array(&self, key: &str, values: Vec<i32>) -> Result<OverrideReceipt> {
        self.set(key, values)
    }

    pub fn set_long_array(&self, key: &str, values: Vec<i64>) -> Result<OverrideReceipt> {
        self.set(key, values)
    }

    pub fn set_string_array(&self, key: &str, values: Vec<String>) -> Result<OverrideReceipt> {
        self.set(key, values)
    }

    /// 一次提交整个覆写集合。
    pub fn apply(&self, overrides: &OverrideSet) -> Result<OverrideReceipt> {
        self.ctx
            .bridge()
            .apply_override(self.subscription_id(), Some(overrides))
    }

    /// 清除该订阅的全部覆写，回到运营商默认值。
    pub fn clear(&self) -> Result<OverrideReceipt> {
        self.ctx.bridge().apply_override(self.subscription_id(), None)
    }

    // ---- 读取 ----

    /// 生效配置快照；订阅号无效时返回 `Ok(None)` 且不触达服务。
    pub fn try_snapshot(&self) -> Result<Option<ConfigBundle>> {
        if !self.subscription.is_valid() {
            return Ok(None);
        }
        let handle = self.ctx.resolve(InterfaceFamily::CarrierConfigLoader)?;
        let package = catalog::default_carrier_package().invoke(&handle)?.value;
        let landed =
            catalog::get_config(self.subscription_id(), package.as_deref()).invoke(&handle)?;
        Ok(landed.value)
    }

    /// [`SubscriptionConfig::try_snapshot`] 的降级版本。
    pub fn snapshot(&self) -> Option<ConfigBundle> {
        self.try_snapshot().unwrap_or_else(|err| {
            warn!(
                subscription_id = self.subscription_id(),
                code = err.code(),
                error = %err,
                "config lookup failed, using defaults"
            );
            None
        })
    }

    fn read<T>(&self, key: &str, pick: impl FnOnce(&ConfigBundle, &str) -> Option<T>, default: T) -> T {
        self.snapshot()
            .and_then(|bundle| pick(&bundle, key))
            .unwrap_or(default)
    }

    pub fn get_value(&self, key: &str) -> Option<ConfigValue> {
        self.snapshot().and_then(|bundle| bundle.get(key).cloned())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.read(key, ConfigBundle::get_bool, false)
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.read(key, ConfigBundle::get_int, -1)
    }

    pub fn get_long(&self, key: &str) -> i64 {
        self.read(key, ConfigBundle::get_long, -1)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.read(key, |bundle, key| bundle.get_string(key).map(str::to_owned), String::new())
    }

    pub fn get_bool_array(&self, key: &str) -> Vec<bool> {
        self.read(key, |bundle, key| bundle.get_bool_array(key).map(<[bool]>::to_vec), Vec::new())
    }

    pub fn get_int_array(&self, key: &str) -> Vec<i32> {
        self.read(key, |bundle, key| bundle.get_int_array(key).map(<[i32]>::to_vec), Vec::new())
    }

    pub fn get_long_array(&self, key: &str) -> Vec<i64> {
        self.read(key, |bundle, key| bundle.get_long_array(key).map(<[i64]>::to_vec), Vec::new())
    }

    pub fn get_string_array(&self, key: &str) -> Vec<String> {
        self.read(
            key,
            |bundle, key| bundle.get_string_array(key).map(<[String]>::to_vec),
            Vec::new(),
        )
    }

    pub fn user_agent(&self) -> String {
        self.get_string(keys::IMS_USER_AGENT)
    }

    pub fn wfc_spn_format_index(&self) -> i32 {
        self.get_int(keys::WFC_SPN_FORMAT_IDX)
    }

    /// 订阅所在卡槽；查询失败或订阅无效时为 `-1`。
    pub fn slot_index(&self) -> i32 {
        if !self.subscription.is_valid() {
            return -1;
        }
        self.resolve_slot().unwrap_or_else(|err| {
            warn!(subscription_id = self.subscription_id(), error = %err, "slot lookup failed");
            -1
        })
    }

    /// 上下文携带卡槽时直接使用，否则查询订阅注册表。
    fn resolve_slot(&self) -> Result<i32> {
        match self.subscription.slot_index() {
            Some(slot_index) => Ok(slot_index),
            None => self.ctx.directory().slot_index(self.subscription_id()),
        }
    }

    pub fn carrier_name(&self) -> String {
        if !self.subscription.is_valid() {
            return String::new();
        }
        let lookup = self
            .ctx
            .resolve(InterfaceFamily::TelephonyControl)
            .and_then(|handle| catalog::carrier_name(self.subscription_id()).invoke(&handle));
        match lookup {
            Ok(landed) => landed.value.unwrap_or_default(),
            Err(err) => {
                warn!(subscription_id = self.subscription_id(), error = %err, "carrier name lookup failed");
                String::new()
            }
        }
    }

    pub fn is_ims_registered(&self) -> bool {
        if !self.subscription.is_valid() {
            return false;
        }
        let lookup = self
            .ctx
            .resolve(InterfaceFamily::TelephonyControl)
            .and_then(|handle| catalog::ims_registered(self.subscription_id()).invoke(&handle));
        match lookup {
            Ok(landed) => landed.value,
            Err(err) => {
                warn!(subscription_id = self.subscription_id(), error = %err, "IMS registration lookup failed");
                false
            }
        }
    }

    // ---- 派生特性标志 ----

    /// 派生特性标志；低于最低版本时恒为 `false`，不发出查询。
    pub fn flag(&self, flag: FeatureFlag) -> bool {
        let release = self.ctx.release();
        if !flag.is_supported(release) {
            return false;
        }
        let bundle = self.snapshot().unwrap_or_default();
        flag.evaluate(&bundle, release)
    }

    /// 全部派生标志，共用一次快照。
    pub fn flags(&self) -> Vec<(FeatureFlag, bool)> {
        let release = self.ctx.release();
        let needs_lookup = FeatureFlag::ALL.iter().any(|flag| flag.is_supported(release));
        let bundle = if needs_lookup {
            self.snapshot().unwrap_or_default()
        } else {
            ConfigBundle::new()
        };
        FeatureFlag::ALL
            .into_iter()
            .map(|flag| (flag, flag.evaluate(&bundle, release)))
            .collect()
    }

    /// 一次性写入开启或关闭该特性所需的全部键。
    pub fn set_flag(&self, flag: FeatureFlag, enabled: bool) -> Result<OverrideReceipt> {
        self.ensure_supported(flag)?;
        self.apply(&flag.write_set(enabled))
    }

    /// 翻转特性并重启注册使之生效，返回新状态。
    pub fn toggle_flag(&self, flag: FeatureFlag) -> Result<bool> {
        self.ensure_supported(flag)?;
        let enabled = !self.flag(flag);
        self.set_flag(flag, enabled)?;
        self.restart_registration()?;
        Ok(enabled)
    }

    fn ensure_supported(&self, flag: FeatureFlag) -> Result<()> {
        let release = self.ctx.release();
        match flag.min_release() {
            Some(required) if !flag.is_supported(release) => Err(BridgeError::UnsupportedFeature {
                flag,
                required,
                actual: release.sdk_int,
            }),
            _ => Ok(()),
        }
    }

    /// 写入单个布尔键后重启注册。
    pub fn set_bool_and_restart(&self, key: &str, value: bool) -> Result<OverrideReceipt> {
        let receipt = self.set_bool(key, value)?;
        self.restart_registration()?;
        Ok(receipt)
    }

    /// 解析卡槽（优先使用上下文携带的值），再请求电话控制重置该卡槽的 IMS。
    pub fn restart_registration(&self) -> Result<()> {
        let slot_index = self.resolve_slot()?;
        let handle = self.ctx.resolve(InterfaceFamily::TelephonyControl)?;
        catalog::reset_ims(slot_index).invoke(&handle)?;
        info!(
            subscription_id = self.subscription_id(),
            slot_index,
            "IMS registration restarted"
        );
        Ok(())
    }
}
