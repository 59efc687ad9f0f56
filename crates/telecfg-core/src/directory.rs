use tracing::debug;

use crate::catalog;
use crate::context::BridgeContext;
use crate::error::Result;
use crate::resolver::InterfaceFamily;
use crate::subscription::SubscriptionInfo;

/// 设备是否具备 VoLTE 能力的系统资源名。
pub const DEVICE_VOLTE_AVAILABLE: &str = "config_device_volte_available";

/// 不绑定具体订阅的设备级查询：订阅信息经由订阅注册表，设备能力经由系统资源。
#[derive(Clone, Copy, Debug)]
pub struct CarrierDirectory<'a> {
    ctx: &'a BridgeContext,
}

impl<'a> CarrierDirectory<'a> {
    pub fn new(ctx: &'a BridgeContext) -> Self {
        Self { ctx }
    }

    /// 当前活动的全部订阅。
    pub fn subscriptions(&self) -> Result<Vec<SubscriptionInfo>> {
        let handle = self.ctx.resolve(InterfaceFamily::SubscriptionRegistry)?;
        Ok(catalog::active_subscriptions(self.ctx.calling_package())
            .invoke(&handle)?
            .value)
    }

    /// 某个卡槽上的活动订阅；卡槽为空时返回 `None`。
    pub fn subscription_for_slot(&self, slot_index: i32) -> Result<Option<SubscriptionInfo>> {
        let handle = self.ctx.resolve(InterfaceFamily::SubscriptionRegistry)?;
        Ok(
            catalog::subscription_for_slot(slot_index, self.ctx.calling_package())
                .invoke(&handle)?
                .value,
        )
    }

    pub fn default_subscription_id(&self) -> Result<i32> {
        let handle = self.ctx.resolve(InterfaceFamily::SubscriptionRegistry)?;
        Ok(catalog::default_subscription_id().invoke(&handle)?.value)
    }

    pub fn slot_index(&self, subscription_id: i32) -> Result<i32> {
        let handle = self.ctx.resolve(InterfaceFamily::SubscriptionRegistry)?;
        Ok(catalog::slot_index(subscription_id).invoke(&handle)?.value)
    }

    /// 设备本身是否支持 IMS（VoLTE）；资源缺失时为 `false`。
    pub fn device_supports_ims(&self) -> bool {
        let supported = self
            .ctx
            .resources()
            .and_then(|resources| resources.system_bool(DEVICE_VOLTE_AVAILABLE));
        if supported.is_none() {
            debug!(resource = DEVICE_VOLTE_AVAILABLE, "system resource unavailable");
        }
        supported.unwrap_or(false)
    }
}
