//! # remote 模块说明
//!
//! ## 意图（Why）
//! - 以值类型描述一次远端调用（方法名 + 位置参数）与其返回值，替代运行时的方法查找；
//! - 调用形态（[`crate::shape::CallShape`]）据此在编译期即可枚举，且能脱离真实系统服务单独测试。
//!
//! ## 契约（What）
//! - [`RemoteCall`] 的参数个数就是签名的一部分：同名方法不同参数个数视为不同签名，
//!   服务端若不认识该签名须返回 [`CallFailure::NoSuchMethod`]；
//! - [`Reply`] 的提取方法在类型不符时返回 [`CallFailure::Remote`]，表示真实的协议错误而非签名漂移。

use crate::error::CallFailure;
use crate::subscription::SubscriptionInfo;
use crate::value::{ConfigBundle, OverrideSet};

/// 远端方法名。
pub mod methods {
    pub const GET_CONFIG_FOR_SUB_ID_WITH_FEATURE: &str = "getConfigForSubIdWithFeature";
    pub const GET_CONFIG_FOR_SUB_ID: &str = "getConfigForSubId";
    pub const OVERRIDE_CONFIG: &str = "overrideConfig";
    pub const GET_DEFAULT_CARRIER_SERVICE_PACKAGE_NAME: &str =
        "getDefaultCarrierServicePackageName";
    pub const GET_ACTIVE_SUBSCRIPTION_INFO_LIST: &str = "getActiveSubscriptionInfoList";
    pub const GET_ACTIVE_SUBSCRIPTION_INFO_FOR_SIM_SLOT_INDEX: &str =
        "getActiveSubscriptionInfoForSimSlotIndex";
    pub const GET_SLOT_INDEX: &str = "getSlotIndex";
    pub const GET_DEFAULT_SUB_ID: &str = "getDefaultSubId";
    pub const RESET_IMS: &str = "resetIms";
    pub const GET_SUBSCRIPTION_CARRIER_NAME: &str = "getSubscriptionCarrierName";
    pub const IS_IMS_REGISTERED: &str = "isImsRegistered";
}

/// 单个位置参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg {
    Int(i32),
    Bool(bool),
    /// 可空字符串，对应调用方包名、特性标签等。
    Str(Option<String>),
    /// 可空配置包，`None` 表示清除全部覆写。
    Bundle(Option<OverrideSet>),
}

impl Arg {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<Option<&str>> {
        match self {
            Self::Str(value) => Some(value.as_deref()),
            _ => None,
        }
    }

    pub fn as_bundle(&self) -> Option<Option<&OverrideSet>> {
        match self {
            Self::Bundle(value) => Some(value.as_ref()),
            _ => None,
        }
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Option<String>> for Arg {
    fn from(value: Option<String>) -> Self {
        Self::Str(value)
    }
}

impl From<Option<OverrideSet>> for Arg {
    fn from(value: Option<OverrideSet>) -> Self {
        Self::Bundle(value)
    }
}

/// 一次远端调用：方法名与按位置排列的参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCall {
    pub method: &'static str,
    pub args: Vec<Arg>,
}

impl RemoteCall {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            args: Vec::new(),
        }
    }

    /// 追加一个位置参数。
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

/// 远端调用的返回值。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Unit,
    Bool(bool),
    Int(i32),
    Str(Option<String>),
    Bundle(Option<ConfigBundle>),
    Subscription(Option<SubscriptionInfo>),
    Subscriptions(Vec<SubscriptionInfo>),
}

impl Reply {
    fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::Bundle(_) => "bundle",
            Self::Subscription(_) => "subscription",
            Self::Subscriptions(_) => "subscription list",
        }
    }

    fn mismatch(&self, method: &str, wanted: &str) -> CallFailure {
        CallFailure::remote(
            method,
            format!("expected {wanted} reply, got {}", self.kind()),
        )
    }

    pub fn into_unit(self, method: &str) -> Result<(), CallFailure> {
        match self {
            Self::Unit => Ok(()),
            other => Err(other.mismatch(method, "unit")),
        }
    }

    pub fn into_bool(self, method: &str) -> Result<bool, CallFailure> {
        match self {
            Self::Bool(value) => Ok(value),
            other => Err(other.mismatch(method, "bool")),
        }
    }

    pub fn into_int(self, method: &str) -> Result<i32, CallFailure> {
        match self {
            Self::Int(value) => Ok(value),
            other => Err(other.mismatch(method, "int")),
        }
    }

    pub fn into_str(self, method: &str) -> Result<Option<String>, CallFailure> {
        match self {
            Self::Str(value) => Ok(value),
            other => Err(other.mismatch(method, "string")),
        }
    }

    pub fn into_bundle(self, method: &str) -> Result<Option<ConfigBundle>, CallFailure> {
        match self {
            Self::Bundle(value) => Ok(value),
            other => Err(other.mismatch(method, "bundle")),
        }
    }

    pub fn into_subscription(self, method: &str) -> Result<Option<SubscriptionInfo>, CallFailure> {
        match self {
            Self::Subscription(value) => Ok(value),
            other => Err(other.mismatch(method, "subscription")),
        }
    }

    pub fn into_subscriptions(self, method: &str) -> Result<Vec<SubscriptionInfo>, CallFailure> {
        match self {
            Self::Subscriptions(value) => Ok(value),
            other => Err(other.mismatch(method, "subscription list")),
        }
    }
}
