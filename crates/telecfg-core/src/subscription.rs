use serde::{Deserialize, Serialize};

/// 无效订阅号。系统在卡槽为空或订阅未激活时返回该值。
pub const INVALID_SUBSCRIPTION_ID: i32 = -1;

/// 一个活动的网络订阅（订阅号 + 卡槽索引）。
///
/// # 教案式说明
/// - **意图 (Why)**：门面实例与订阅一一绑定，构造后不可变，避免“换卡后仍用旧订阅号写配置”；
/// - **契约 (What)**：负的订阅号视为无效，门面的读取在此情况下直接返回类型默认值；
///   `slot_index` 可能为 `None`，此时重启注册前需要向订阅注册表查询卡槽。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionContext {
    subscription_id: i32,
    slot_index: Option<i32>,
}

impl SubscriptionContext {
    pub fn new(subscription_id: i32, slot_index: Option<i32>) -> Self {
        Self {
            subscription_id,
            slot_index,
        }
    }

    /// 仅知道订阅号的上下文，卡槽在需要时再查询。
    pub fn for_subscription(subscription_id: i32) -> Self {
        Self::new(subscription_id, None)
    }

    pub fn subscription_id(&self) -> i32 {
        self.subscription_id
    }

    pub fn slot_index(&self) -> Option<i32> {
        self.slot_index
    }

    pub fn is_valid(&self) -> bool {
        self.subscription_id >= 0
    }
}

impl From<&SubscriptionInfo> for SubscriptionContext {
    fn from(info: &SubscriptionInfo) -> Self {
        Self::new(info.subscription_id, Some(info.slot_index))
    }
}

/// 订阅注册表返回的订阅描述。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub subscription_id: i32,
    pub slot_index: i32,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub carrier_name: String,
}
