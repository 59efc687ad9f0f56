//! # resolver 模块说明
//!
//! ## 角色定位（Why）
//! - 为四类电话相关的系统内部服务定位句柄：运营商配置加载器、电话控制、话机用户信息、订阅注册表；
//! - 新版本系统通过服务注册表查找，旧版本缺少该注册表类型，只能按众所周知的服务名全局查找。
//!
//! ## 契约（What）
//! - 先走现代路径；仅当注册表报告 [`RegistryError::Unavailable`] 时才查旧式路径，绝不反向；
//! - 现代路径的其他失败直接传播，不查旧式路径；旧式路径返回空同样视为解析失败；
//! - 解析得到的原始 binder 一律经 [`PrivilegedChannel::wrap`] 包装后才进入缓存；
//! - 缓存由 [`crate::BridgeContext`] 持有，按接口族记忆，无淘汰。
//!
//! ## 并发（Concurrency）
//! - [`InterfaceCache`] 以 `parking_lot::Mutex` 保护，但查找远端服务期间不持锁；
//!   并发首次解析时以先写入者为准，后到者丢弃自己的结果并复用已缓存句柄。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::service::{
    PrivilegedChannel, RawBinder, RegistryError, ServiceHandle, ServiceManager, ServiceRegistry,
};

/// 四类服务接口族。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InterfaceFamily {
    CarrierConfigLoader,
    TelephonyControl,
    PhoneSubscriberInfo,
    SubscriptionRegistry,
}

impl InterfaceFamily {
    pub const ALL: [InterfaceFamily; 4] = [
        Self::CarrierConfigLoader,
        Self::TelephonyControl,
        Self::PhoneSubscriberInfo,
        Self::SubscriptionRegistry,
    ];

    /// 旧式全局查找使用的服务名。
    pub fn legacy_service_name(self) -> &'static str {
        match self {
            Self::CarrierConfigLoader => "carrier_config",
            Self::TelephonyControl => "phone",
            Self::PhoneSubscriberInfo => "iphonesubinfo",
            Self::SubscriptionRegistry => "isub",
        }
    }

    /// 远端接口描述符。
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::CarrierConfigLoader => "com.android.internal.telephony.ICarrierConfigLoader",
            Self::TelephonyControl => "com.android.internal.telephony.ITelephony",
            Self::PhoneSubscriberInfo => "com.android.internal.telephony.IPhoneSubInfo",
            Self::SubscriptionRegistry => "com.android.internal.telephony.ISub",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::CarrierConfigLoader => "carrier-config",
            Self::TelephonyControl => "telephony",
            Self::PhoneSubscriberInfo => "phone-subscriber-info",
            Self::SubscriptionRegistry => "subscription",
        }
    }
}

impl fmt::Display for InterfaceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 按接口族记忆的服务句柄缓存。
#[derive(Default)]
pub struct InterfaceCache {
    handles: Mutex<HashMap<InterfaceFamily, ServiceHandle>>,
}

impl InterfaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, family: InterfaceFamily) -> Option<ServiceHandle> {
        self.handles.lock().get(&family).cloned()
    }

    /// 写入句柄；若该接口族已有句柄则保留旧值并返回旧值。
    pub fn get_or_insert(&self, handle: ServiceHandle) -> ServiceHandle {
        self.handles
            .lock()
            .entry(handle.family())
            .or_insert(handle)
            .clone()
    }

    pub fn contains(&self, family: InterfaceFamily) -> bool {
        self.handles.lock().contains_key(&family)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl fmt::Debug for InterfaceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cached: Vec<_> = self.handles.lock().keys().copied().collect();
        cached.sort();
        f.debug_struct("InterfaceCache")
            .field("cached", &cached)
            .finish()
    }
}

/// 服务接口解析器。
///
/// # 教案式说明
/// - **意图 (Why)**：把“现代查找 → 旧式查找 → 特权包装 → 缓存”这条固定流程集中在一处，
///   其余组件只面对 [`ServiceHandle`]；
/// - **契约 (What)**：[`ServiceResolver::resolve`] 命中缓存时不触达任何服务边界；
///   未命中时按模块文档描述的顺序解析，失败返回 [`BridgeError::ServiceUnavailable`]；
/// - **风险 (Trade-offs)**：解析失败不重试，也不缓存失败结果，下次调用会重新尝试。
pub struct ServiceResolver {
    registry: Arc<dyn ServiceRegistry>,
    manager: Arc<dyn ServiceManager>,
    channel: Arc<dyn PrivilegedChannel>,
}

impl ServiceResolver {
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        manager: Arc<dyn ServiceManager>,
        channel: Arc<dyn PrivilegedChannel>,
    ) -> Self {
        Self {
            registry,
            manager,
            channel,
        }
    }

    pub fn resolve(&self, cache: &InterfaceCache, family: InterfaceFamily) -> Result<ServiceHandle> {
        if let Some(handle) = cache.get(family) {
            return Ok(handle);
        }
        let raw = self.lookup(family)?;
        let handle = ServiceHandle::new(family, self.channel.wrap(raw));
        debug!(%family, descriptor = handle.descriptor(), "service handle cached");
        Ok(cache.get_or_insert(handle))
    }

    fn lookup(&self, family: InterfaceFamily) -> Result<RawBinder> {
        match self.registry.lookup(family) {
            Ok(binder) => {
                debug!(%family, path = "registry", "service resolved");
                Ok(binder)
            }
            Err(RegistryError::Unavailable { detail }) => {
                let name = family.legacy_service_name();
                debug!(%family, %detail, name, "registry unavailable, using legacy lookup");
                self.manager.get_service(name).ok_or_else(|| {
                    warn!(%family, name, "legacy service lookup returned nothing");
                    BridgeError::ServiceUnavailable {
                        family,
                        detail: format!("no service registered under `{name}`"),
                    }
                })
            }
            Err(RegistryError::Failed { detail }) => {
                Err(BridgeError::ServiceUnavailable { family, detail })
            }
        }
    }
}

impl fmt::Debug for ServiceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceResolver").finish_non_exhaustive()
    }
}
