//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为桥接层对外暴露的错误语义提供集中定义：解析失败、签名不匹配、权限拒绝、远端失败、
//!   委托传输失败与委托执行失败；
//! - 区分“可回退”与“致命”两类调用失败，是版本漂移适配器（[`crate::shape`]）的判定依据。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，兼容 `std::error::Error`；
//! - 每个变体映射到稳定错误码（[`BridgeError::code`]）与 [`ErrorCategory`]，调用方无需解析字符串；
//! - 权限拒绝与“未找到”必须保持可区分：前者意味着“需要提升身份”，后者意味着“此版本不支持”。

use thiserror::Error;

use crate::config::ConfigError;
use crate::features::FeatureFlag;
use crate::request::{CompletionFailure, RequestCodecError};
use crate::resolver::InterfaceFamily;

/// 桥接层统一返回值别名。
pub type Result<T, E = BridgeError> = core::result::Result<T, E>;

/// 单次远端调用（一个调用形态）的失败。
///
/// # 教案式说明
/// - **意图 (Why)**：系统服务在不同版本上会以“方法不存在”或“权限拒绝”的方式暴露签名漂移，
///   这两类失败需要与真正的远端异常区分开，才能驱动回退链；
/// - **契约 (What)**：由 [`crate::service::RemoteObject::transact`] 产生；
///   [`CallFailure::kind`] 给出分类，`NoSuchMethod`/`SecurityDenied` 触发回退，其余立即终止；
/// - **风险 (Trade-offs)**：字段使用 `String` 保存，便于跨进程回传诊断，代价是少量分配。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CallFailure {
    /// 目标对象上不存在该方法（或参数个数不匹配）。
    #[error("method `{method}` is not implemented by `{interface}`")]
    NoSuchMethod { interface: String, method: String },
    /// 调用方身份不足以通过远端的权限检查。
    #[error("permission denied for `{method}`: {reason}")]
    SecurityDenied { method: String, reason: String },
    /// 其他远端失败，表示真实错误而非签名差异。
    #[error("remote failure in `{method}`: {message}")]
    Remote { method: String, message: String },
}

impl CallFailure {
    pub fn no_such_method(interface: impl Into<String>, method: impl Into<String>) -> Self {
        Self::NoSuchMethod {
            interface: interface.into(),
            method: method.into(),
        }
    }

    pub fn security_denied(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SecurityDenied {
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub fn remote(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            method: method.into(),
            message: message.into(),
        }
    }

    /// 返回失败分类。
    pub fn kind(&self) -> CallFailureKind {
        match self {
            Self::NoSuchMethod { .. } => CallFailureKind::MissingMethod,
            Self::SecurityDenied { .. } => CallFailureKind::PermissionDenied,
            Self::Remote { .. } => CallFailureKind::Remote,
        }
    }
}

/// [`CallFailure`] 的分类标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallFailureKind {
    MissingMethod,
    PermissionDenied,
    Remote,
}

impl CallFailureKind {
    /// 是否允许回退到下一个调用形态。
    ///
    /// 旧版本有时需要不同的参数个数才能通过同一权限检查，因此权限拒绝与方法缺失同等对待。
    pub fn falls_back(self) -> bool {
        matches!(self, Self::MissingMethod | Self::PermissionDenied)
    }
}

/// 错误分类，驱动调用方的处置策略。
///
/// - `Resolution`：拿不到服务句柄，后续任何调用都不可能成功；
/// - `Unsupported`：所有调用形态都不存在，或派生特性低于最低版本，当前版本不支持此操作；
/// - `Permission`：最后一次尝试被权限拒绝，调用方需要提升身份；
/// - `Remote`：远端真实失败；
/// - `Delegation`：二级进程无法启动或未回报完成；
/// - `Input`：请求或配置文件本身不合法。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Resolution,
    Unsupported,
    Permission,
    Remote,
    Delegation,
    Input,
}

/// 桥接层错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合解析、回退链、委托三条关键路径的失败，并保留足够上下文
///   （逻辑操作名、最后尝试的调用形态、底层 [`CallFailure`]）帮助定位是哪一代签名出了问题；
/// - **契约 (What)**：
///   - `NotFound` 与 `PermissionDenied` 只在回退链耗尽时产生，携带最后一次尝试的失败；
///   - `Remote` 表示链路被非回退类失败中断，携带中断时的调用形态；
///   - `DelegatedFailure` 由二级进程的类型化完成记录转换而来，粒度与直接路径一致；
/// - **风险 (Trade-offs)**：`operation`/`shape` 采用 `&'static str`，要求调用形态目录在编译期可枚举，
///   这正是放弃运行时反射探测后的收益。
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("service `{family}` is unavailable: {detail}")]
    ServiceUnavailable {
        family: InterfaceFamily,
        detail: String,
    },

    #[error("`{operation}` is not supported by this release (last shape `{shape}`): {source}")]
    NotFound {
        operation: &'static str,
        shape: &'static str,
        #[source]
        source: CallFailure,
    },

    #[error("`{operation}` was refused (last shape `{shape}`): {source}")]
    PermissionDenied {
        operation: &'static str,
        shape: &'static str,
        #[source]
        source: CallFailure,
    },

    #[error("`{operation}` failed at shape `{shape}`: {source}")]
    Remote {
        operation: &'static str,
        shape: &'static str,
        #[source]
        source: CallFailure,
    },

    #[error("feature `{flag}` requires SDK {required}, running SDK {actual}")]
    UnsupportedFeature {
        flag: FeatureFlag,
        required: u32,
        actual: u32,
    },

    #[error("delegation to the secondary process failed: {detail}")]
    Delegation { detail: String },

    #[error("secondary process reported {kind} failure: {message}")]
    DelegatedFailure {
        kind: CompletionFailure,
        message: String,
    },

    #[error(transparent)]
    MalformedRequest(#[from] RequestCodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// 将回退链中的最后一次失败转换为链路耗尽错误。
    pub(crate) fn exhausted(
        operation: &'static str,
        shape: &'static str,
        source: CallFailure,
    ) -> Self {
        match source.kind() {
            CallFailureKind::PermissionDenied => Self::PermissionDenied {
                operation,
                shape,
                source,
            },
            CallFailureKind::MissingMethod => Self::NotFound {
                operation,
                shape,
                source,
            },
            CallFailureKind::Remote => Self::Remote {
                operation,
                shape,
                source,
            },
        }
    }

    pub fn delegation(detail: impl Into<String>) -> Self {
        Self::Delegation {
            detail: detail.into(),
        }
    }

    /// 稳定错误码，采用 `telecfg.<域>.<语义>` 命名。
    pub fn code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => "telecfg.resolve.unavailable",
            Self::NotFound { .. } => "telecfg.call.not_found",
            Self::PermissionDenied { .. } => "telecfg.call.permission_denied",
            Self::Remote { .. } => "telecfg.call.remote",
            Self::UnsupportedFeature { .. } => "telecfg.feature.unsupported",
            Self::Delegation { .. } => "telecfg.delegate.transport",
            Self::DelegatedFailure { .. } => "telecfg.delegate.failed",
            Self::MalformedRequest(_) => "telecfg.request.malformed",
            Self::Config(_) => "telecfg.config.invalid",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ServiceUnavailable { .. } => ErrorCategory::Resolution,
            Self::NotFound { .. } | Self::UnsupportedFeature { .. } => ErrorCategory::Unsupported,
            Self::PermissionDenied { .. } => ErrorCategory::Permission,
            Self::Remote { .. } => ErrorCategory::Remote,
            Self::Delegation { .. } => ErrorCategory::Delegation,
            Self::DelegatedFailure { kind, .. } => match kind {
                CompletionFailure::NotFound => ErrorCategory::Unsupported,
                CompletionFailure::PermissionDenied | CompletionFailure::Identity => {
                    ErrorCategory::Permission
                }
                CompletionFailure::ServiceUnavailable => ErrorCategory::Resolution,
                CompletionFailure::Malformed => ErrorCategory::Input,
                CompletionFailure::Remote => ErrorCategory::Remote,
            },
            Self::MalformedRequest(_) | Self::Config(_) => ErrorCategory::Input,
        }
    }

    /// 调用方是否应尝试提升身份后重试。
    pub fn needs_elevation(&self) -> bool {
        self.category() == ErrorCategory::Permission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied() -> CallFailure {
        CallFailure::security_denied("overrideConfig", "uid 10234 lacks MODIFY_PHONE_STATE")
    }

    #[test]
    fn exhausted_keeps_permission_distinct_from_not_found() {
        let refused = BridgeError::exhausted("override-config", "persistent", denied());
        assert_eq!(refused.code(), "telecfg.call.permission_denied");
        assert!(refused.needs_elevation());

        let missing = BridgeError::exhausted(
            "override-config",
            "legacy",
            CallFailure::no_such_method("ICarrierConfigLoader", "overrideConfig"),
        );
        assert_eq!(missing.category(), ErrorCategory::Unsupported);
        assert!(!missing.needs_elevation());
    }

    #[test]
    fn only_missing_method_and_denial_fall_back() {
        assert!(CallFailureKind::MissingMethod.falls_back());
        assert!(CallFailureKind::PermissionDenied.falls_back());
        assert!(!CallFailureKind::Remote.falls_back());
    }

    #[test]
    fn delegated_failure_inherits_remote_granularity() {
        let err = BridgeError::DelegatedFailure {
            kind: CompletionFailure::PermissionDenied,
            message: "refused".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert_eq!(err.code(), "telecfg.delegate.failed");
    }
}
