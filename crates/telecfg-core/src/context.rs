//! # context 模块说明
//!
//! ## 角色定位（Why）
//! - [`BridgeContext`] 是桥接层的根对象：持有接口缓存、服务边界实现、系统版本描述与进程启动器，
//!   并向调用方分发配置门面、运营商目录、特权桥与二级进程入口；
//! - 接口缓存的生命周期因此显式绑定到上下文，测试可以为每个用例构造独立上下文。
//!
//! ## 契约（What）
//! - 同一上下文内，每个接口族最多解析一次；
//! - 未配置 [`ProcessLauncher`] 时委托路径返回 [`crate::BridgeError::Delegation`]；
//!   未配置 [`ShellIdentity`] 时二级进程入口回报 `identity` 类失败；
//! - 未配置 [`SystemResources`] 时设备级能力查询一律为 `false`。

use std::fmt;
use std::sync::Arc;

use crate::bridge::PrivilegeBridge;
use crate::broker::BrokerEntry;
use crate::directory::CarrierDirectory;
use crate::error::Result;
use crate::facade::SubscriptionConfig;
use crate::release::OsRelease;
use crate::resolver::{InterfaceCache, InterfaceFamily, ServiceResolver};
use crate::service::{
    PrivilegedChannel, ProcessLauncher, ServiceHandle, ServiceManager, ServiceRegistry,
    ShellIdentity, SystemResources,
};
use crate::subscription::SubscriptionContext;

/// shell 用户的 uid，未显式配置时作为委托身份的目标。
pub const SHELL_UID: u32 = 2000;

/// 桥接层根上下文。
pub struct BridgeContext {
    cache: InterfaceCache,
    resolver: ServiceResolver,
    release: OsRelease,
    identity: Option<Arc<dyn ShellIdentity>>,
    launcher: Option<Arc<dyn ProcessLauncher>>,
    resources: Option<Arc<dyn SystemResources>>,
    caller_uid: u32,
    calling_package: Option<String>,
}

impl BridgeContext {
    /// 以三类必需的服务边界开始构建上下文。
    pub fn builder(
        registry: Arc<dyn ServiceRegistry>,
        manager: Arc<dyn ServiceManager>,
        channel: Arc<dyn PrivilegedChannel>,
    ) -> BridgeContextBuilder {
        BridgeContextBuilder {
            resolver: ServiceResolver::new(registry, manager, channel),
            release: OsRelease::new(0, String::new()),
            identity: None,
            launcher: None,
            resources: None,
            caller_uid: SHELL_UID,
            calling_package: None,
        }
    }

    /// 解析（或从缓存取出）某个接口族的服务句柄。
    pub fn resolve(&self, family: InterfaceFamily) -> Result<ServiceHandle> {
        self.resolver.resolve(&self.cache, family)
    }

    pub fn cache(&self) -> &InterfaceCache {
        &self.cache
    }

    pub fn release(&self) -> &OsRelease {
        &self.release
    }

    pub fn caller_uid(&self) -> u32 {
        self.caller_uid
    }

    pub fn calling_package(&self) -> Option<&str> {
        self.calling_package.as_deref()
    }

    pub fn identity(&self) -> Option<&dyn ShellIdentity> {
        self.identity.as_deref()
    }

    pub fn launcher(&self) -> Option<&dyn ProcessLauncher> {
        self.launcher.as_deref()
    }

    pub fn resources(&self) -> Option<&dyn SystemResources> {
        self.resources.as_deref()
    }

    pub fn bridge(&self) -> PrivilegeBridge<'_> {
        PrivilegeBridge::new(self)
    }

    pub fn directory(&self) -> CarrierDirectory<'_> {
        CarrierDirectory::new(self)
    }

    pub fn broker(&self) -> BrokerEntry<'_> {
        BrokerEntry::new(self)
    }

    /// 绑定到某个订阅的配置门面。
    pub fn subscription(&self, subscription: SubscriptionContext) -> SubscriptionConfig<'_> {
        SubscriptionConfig::new(self, subscription)
    }

    /// 按卡槽查找活动订阅并返回其门面；卡槽为空时返回 `None`。
    pub fn subscription_for_slot(&self, slot_index: i32) -> Result<Option<SubscriptionConfig<'_>>> {
        let info = self.directory().subscription_for_slot(slot_index)?;
        Ok(info.map(|info| self.subscription(SubscriptionContext::from(&info))))
    }
}

impl fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeContext")
            .field("cache", &self.cache)
            .field("release", &self.release)
            .field("caller_uid", &self.caller_uid)
            .field("has_identity", &self.identity.is_some())
            .field("has_launcher", &self.launcher.is_some())
            .field("has_resources", &self.resources.is_some())
            .finish()
    }
}

/// [`BridgeContext`] 的构建器。
pub struct BridgeContextBuilder {
    resolver: ServiceResolver,
    release: OsRelease,
    identity: Option<Arc<dyn ShellIdentity>>,
    launcher: Option<Arc<dyn ProcessLauncher>>,
    resources: Option<Arc<dyn SystemResources>>,
    caller_uid: u32,
    calling_package: Option<String>,
}

impl BridgeContextBuilder {
    pub fn release(mut self, release: OsRelease) -> Self {
        self.release = release;
        self
    }

    pub fn identity(mut self, identity: Arc<dyn ShellIdentity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn resources(mut self, resources: Arc<dyn SystemResources>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn caller_uid(mut self, uid: u32) -> Self {
        self.caller_uid = uid;
        self
    }

    pub fn calling_package(mut self, package: impl Into<String>) -> Self {
        self.calling_package = Some(package.into());
        self
    }

    pub fn build(self) -> BridgeContext {
        BridgeContext {
            cache: InterfaceCache::new(),
            resolver: self.resolver,
            release: self.release,
            identity: self.identity,
            launcher: self.launcher,
            resources: self.resources,
            caller_uid: self.caller_uid,
            calling_package: self.calling_package,
        }
    }
}
