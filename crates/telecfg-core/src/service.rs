//! # service 模块说明
//!
//! ## 角色定位（Why）
//! - 定义桥接层与操作系统服务之间的全部边界契约：服务注册表（现代查找）、服务管理器（旧式按名查找）、
//!   特权通道包装、远端对象、shell 身份与二级进程启动器；
//! - 真实设备实现或仿真设备（`telecfg-emulator`）在此接入，核心逻辑只依赖这些 trait。
//!
//! ## 设计要求（What）
//! - 所有 trait 均要求 `Send + Sync`，以便 [`crate::BridgeContext`] 在线程间共享；
//! - 调用全部同步阻塞，超时与取消不在契约范围内。

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::{BridgeError, CallFailure};
use crate::remote::{RemoteCall, Reply};
use crate::request::{Completion, DelegatedRequest};
use crate::resolver::InterfaceFamily;

/// 系统服务暴露的远端对象。
pub trait RemoteObject: Send + Sync {
    /// 接口描述符，例如 `com.android.internal.telephony.ICarrierConfigLoader`。
    fn descriptor(&self) -> &str;

    /// 同步执行一次远端调用。
    ///
    /// # 契约
    /// - 方法名或参数个数不被识别时返回 [`CallFailure::NoSuchMethod`]；
    /// - 调用方身份不足时返回 [`CallFailure::SecurityDenied`]；
    /// - 其他失败返回 [`CallFailure::Remote`]。
    fn transact(&self, call: &RemoteCall) -> Result<Reply, CallFailure>;
}

/// 未经包装的原始 binder。
pub type RawBinder = Arc<dyn RemoteObject>;

/// 已解析、已经特权通道包装的服务句柄。
///
/// 克隆只复制引用计数；同一上下文内每个接口族至多存在一个句柄。
#[derive(Clone)]
pub struct ServiceHandle {
    family: InterfaceFamily,
    object: RawBinder,
}

impl ServiceHandle {
    pub fn new(family: InterfaceFamily, object: RawBinder) -> Self {
        Self { family, object }
    }

    pub fn family(&self) -> InterfaceFamily {
        self.family
    }

    pub fn descriptor(&self) -> &str {
        self.object.descriptor()
    }

    pub fn transact(&self, call: &RemoteCall) -> Result<Reply, CallFailure> {
        self.object.transact(call)
    }

    /// 两个句柄是否指向同一远端对象。
    pub fn same_object(&self, other: &ServiceHandle) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("family", &self.family)
            .field("descriptor", &self.object.descriptor())
            .finish()
    }
}

/// 现代服务注册表的查找失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// 注册表类型本身不存在（旧版本系统），应回退到旧式查找。
    #[error("service registry is not available on this release: {detail}")]
    Unavailable { detail: String },
    /// 注册表存在但查找失败，直接向上传播。
    #[error("service registry lookup failed: {detail}")]
    Failed { detail: String },
}

impl RegistryError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable {
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed {
            detail: detail.into(),
        }
    }
}

/// 现代（基于注册表）的服务查找路径。
pub trait ServiceRegistry: Send + Sync {
    fn lookup(&self, family: InterfaceFamily) -> Result<RawBinder, RegistryError>;
}

/// 旧式全局服务查找，按众所周知的服务名。
pub trait ServiceManager: Send + Sync {
    /// 服务不存在时返回 `None`。
    fn get_service(&self, name: &str) -> Option<RawBinder>;
}

/// 特权通道：把原始 binder 包装为经由特权身份转发调用的对象。
pub trait PrivilegedChannel: Send + Sync {
    fn wrap(&self, binder: RawBinder) -> RawBinder;
}

/// 进程级 shell 身份的获取与释放。
pub trait ShellIdentity: Send + Sync {
    /// 以 `uid` 为目标开始委托 shell 身份，权限集合为全部权限。
    fn start_delegate_shell_permission_identity(&self, uid: u32) -> Result<(), CallFailure>;

    /// 结束委托 shell 身份。
    fn stop_delegate_shell_permission_identity(&self) -> Result<(), CallFailure>;
}

/// 平台系统资源中的布尔配置，例如设备是否具备 VoLTE 能力。
pub trait SystemResources: Send + Sync {
    /// 资源不存在时返回 `None`。
    fn system_bool(&self, name: &str) -> Option<bool>;
}

/// 二级进程启动器。
///
/// # 教案式说明
/// - **意图 (Why)**：把“以提升身份启动二级进程并等待完成”抽象为可替换的边界，
///   生产环境使用 [`crate::CommandLauncher`]，测试使用记录型替身；
/// - **契约 (What)**：阻塞直到二级进程结束；进程无法启动或未回报完成记录时返回
///   [`BridgeError::Delegation`]，否则返回进程回报的 [`Completion`]（可能是 `Failed`）；
/// - **风险 (Trade-offs)**：无超时，二级进程挂起会使调用方一并挂起。
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, request: &DelegatedRequest) -> Result<Completion, BridgeError>;
}
