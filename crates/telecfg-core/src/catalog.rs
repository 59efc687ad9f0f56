//! 各逻辑操作的调用形态目录。
//!
//! 每个函数返回一条从新到旧排列的 [`ShapeChain`]；同一链内各形态接收相同的逻辑参数，
//! 只在签名上有差异（追加的特性标签、持久化标志、全用户标志等）。

use crate::remote::{RemoteCall, methods};
use crate::shape::ShapeChain;
use crate::subscription::SubscriptionInfo;
use crate::value::{ConfigBundle, OverrideSet};

pub const GET_CONFIG: &str = "get-config";
pub const OVERRIDE_CONFIG: &str = "override-config";
pub const DEFAULT_CARRIER_PACKAGE: &str = "default-carrier-package";
pub const ACTIVE_SUBSCRIPTIONS: &str = "active-subscriptions";
pub const SUBSCRIPTION_FOR_SLOT: &str = "subscription-for-slot";
pub const SLOT_INDEX: &str = "slot-index";
pub const DEFAULT_SUBSCRIPTION_ID: &str = "default-subscription-id";
pub const RESET_IMS: &str = "reset-ims";
pub const CARRIER_NAME: &str = "carrier-name";
pub const IMS_REGISTERED: &str = "ims-registered";

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_owned)
}

/// 读取订阅的生效配置。
///
/// `caller_package` 取自配置加载器的 `getDefaultCarrierServicePackageName()`，特性标签固定为空串。
pub fn get_config<'a>(
    subscription_id: i32,
    caller_package: Option<&'a str>,
) -> ShapeChain<'a, Option<ConfigBundle>> {
    let with_feature = move |handle: &crate::ServiceHandle| {
        let method = methods::GET_CONFIG_FOR_SUB_ID_WITH_FEATURE;
        handle
            .transact(
                &RemoteCall::new(method)
                    .arg(subscription_id)
                    .arg(owned(caller_package))
                    .arg(Some(String::new())),
            )?
            .into_bundle(method)
    };
    let with_package = move |handle: &crate::ServiceHandle| {
        let method = methods::GET_CONFIG_FOR_SUB_ID;
        handle
            .transact(
                &RemoteCall::new(method)
                    .arg(subscription_id)
                    .arg(owned(caller_package)),
            )?
            .into_bundle(method)
    };
    let legacy = move |handle: &crate::ServiceHandle| {
        let method = methods::GET_CONFIG_FOR_SUB_ID;
        handle
            .transact(&RemoteCall::new(method).arg(subscription_id))?
            .into_bundle(method)
    };
    ShapeChain::new(GET_CONFIG, "with-feature", with_feature)
        .then("with-package", with_package)
        .then("legacy", legacy)
}

fn override_call(
    subscription_id: i32,
    overrides: Option<&OverrideSet>,
    persistent: Option<bool>,
) -> RemoteCall {
    let call = RemoteCall::new(methods::OVERRIDE_CONFIG)
        .arg(subscription_id)
        .arg(overrides.cloned());
    match persistent {
        Some(flag) => call.arg(flag),
        None => call,
    }
}

/// 直接路径的覆写：只有带持久化标志的一种形态。
pub fn override_direct<'a>(
    subscription_id: i32,
    overrides: Option<&'a OverrideSet>,
) -> ShapeChain<'a, ()> {
    ShapeChain::new(OVERRIDE_CONFIG, "persistent", move |handle| {
        handle
            .transact(&override_call(subscription_id, overrides, Some(true)))?
            .into_unit(methods::OVERRIDE_CONFIG)
    })
}

/// 二级进程内的覆写：持久化、非持久化、无标志三种递减参数个数的形态。
pub fn override_broker<'a>(
    subscription_id: i32,
    overrides: Option<&'a OverrideSet>,
) -> ShapeChain<'a, ()> {
    let shape = move |persistent: Option<bool>| {
        move |handle: &crate::ServiceHandle| {
            handle
                .transact(&override_call(subscription_id, overrides, persistent))?
                .into_unit(methods::OVERRIDE_CONFIG)
        }
    };
    ShapeChain::new(OVERRIDE_CONFIG, "persistent", shape(Some(true)))
        .then("transient", shape(Some(false)))
        .then("legacy", shape(None))
}

pub fn default_carrier_package() -> ShapeChain<'static, Option<String>> {
    ShapeChain::new(DEFAULT_CARRIER_PACKAGE, "plain", |handle| {
        let method = methods::GET_DEFAULT_CARRIER_SERVICE_PACKAGE_NAME;
        handle.transact(&RemoteCall::new(method))?.into_str(method)
    })
}

pub fn active_subscriptions<'a>(
    calling_package: Option<&'a str>,
) -> ShapeChain<'a, Vec<SubscriptionInfo>> {
    let method = methods::GET_ACTIVE_SUBSCRIPTION_INFO_LIST;
    ShapeChain::new(ACTIVE_SUBSCRIPTIONS, "all-users", move |handle| {
        handle
            .transact(
                &RemoteCall::new(method)
                    .arg(owned(calling_package))
                    .arg(None::<String>)
                    .arg(true),
            )?
            .into_subscriptions(method)
    })
    .then("with-feature", move |handle| {
        handle
            .transact(
                &RemoteCall::new(method)
                    .arg(owned(calling_package))
                    .arg(None::<String>),
            )?
            .into_subscriptions(method)
    })
    .then("legacy", move |handle| {
        handle
            .transact(&RemoteCall::new(method).arg(owned(calling_package)))?
            .into_subscriptions(method)
    })
}

pub fn subscription_for_slot<'a>(
    slot_index: i32,
    calling_package: Option<&'a str>,
) -> ShapeChain<'a, Option<SubscriptionInfo>> {
    let method = methods::GET_ACTIVE_SUBSCRIPTION_INFO_FOR_SIM_SLOT_INDEX;
    ShapeChain::new(SUBSCRIPTION_FOR_SLOT, "with-feature", move |handle| {
        handle
            .transact(
                &RemoteCall::new(method)
                    .arg(slot_index)
                    .arg(owned(calling_package))
                    .arg(None::<String>),
            )?
            .into_subscription(method)
    })
    .then("legacy", move |handle| {
        handle
            .transact(
                &RemoteCall::new(method)
                    .arg(slot_index)
                    .arg(owned(calling_package)),
            )?
            .into_subscription(method)
    })
}

pub fn slot_index(subscription_id: i32) -> ShapeChain<'static, i32> {
    ShapeChain::new(SLOT_INDEX, "plain", move |handle| {
        let method = methods::GET_SLOT_INDEX;
        handle
            .transact(&RemoteCall::new(method).arg(subscription_id))?
            .into_int(method)
    })
}

pub fn default_subscription_id() -> ShapeChain<'static, i32> {
    ShapeChain::new(DEFAULT_SUBSCRIPTION_ID, "plain", |handle| {
        let method = methods::GET_DEFAULT_SUB_ID;
        handle.transact(&RemoteCall::new(method))?.into_int(method)
    })
}

pub fn reset_ims(slot_index: i32) -> ShapeChain<'static, ()> {
    ShapeChain::new(RESET_IMS, "plain", move |handle| {
        let method = methods::RESET_IMS;
        handle
            .transact(&RemoteCall::new(method).arg(slot_index))?
            .into_unit(method)
    })
}

pub fn carrier_name(subscription_id: i32) -> ShapeChain<'static, Option<String>> {
    ShapeChain::new(CARRIER_NAME, "plain", move |handle| {
        let method = methods::GET_SUBSCRIPTION_CARRIER_NAME;
        handle
            .transact(&RemoteCall::new(method).arg(subscription_id))?
            .into_str(method)
    })
}

pub fn ims_registered(subscription_id: i32) -> ShapeChain<'static, bool> {
    ShapeChain::new(IMS_REGISTERED, "plain", move |handle| {
        let method = methods::IS_IMS_REGISTERED;
        handle
            .transact(&RemoteCall::new(method).arg(subscription_id))?
            .into_bool(method)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_are_ordered_newest_first() {
        assert_eq!(
            get_config(1, None).tags(),
            ["with-feature", "with-package", "legacy"]
        );
        assert_eq!(
            override_broker(1, None).tags(),
            ["persistent", "transient", "legacy"]
        );
        assert_eq!(override_direct(1, None).tags(), ["persistent"]);
        assert_eq!(
            active_subscriptions(None).tags(),
            ["all-users", "with-feature", "legacy"]
        );
        assert_eq!(
            subscription_for_slot(0, None).tags(),
            ["with-feature", "legacy"]
        );
    }
}
