#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

//! # telecfg-core
//!
//! ## 定位与职责（Why）
//! - 通过系统内部（非公开契约）的电话服务接口读取并覆写运营商配置（carrier config），
//!   这些接口的查找路径与方法签名会随系统版本漂移；
//! - 核心难点是“特权配置桥”：解析服务句柄、在签名/权限不匹配时按既定顺序回退，
//!   以及在直接特权不足时把变更委托给提升身份后的二级进程执行。
//!
//! ## 架构嵌入（Where）
//! - [`resolver`]：四类服务接口的解析与进程级缓存（由 [`BridgeContext`] 持有）；
//! - [`shape`] 与 [`catalog`]：版本漂移调用适配器，及每个逻辑操作的调用形态目录；
//! - [`bridge`]、[`request`] 与 [`launcher`]：特权委托桥、跨进程请求编解码与进程启动；
//! - [`broker`]：运行在二级进程内的入口逻辑；
//! - [`facade`]、[`features`] 与 [`directory`]：面向调用方的类型化配置门面；
//! - [`service`]、[`remote`]：系统服务边界契约，真实实现或仿真设备在此接入。
//!
//! ## 约束（What）
//! - 全部调用同步阻塞，无内部并行；委托路径阻塞等待子进程完成，无超时；
//! - 覆写不持久化，服务进程重启后需重新下发。

pub mod bridge;
pub mod broker;
pub mod catalog;
pub mod config;
pub mod context;
pub mod directory;
pub mod elevation;
pub mod error;
pub mod facade;
pub mod features;
pub mod identity;
pub mod launcher;
pub mod release;
pub mod remote;
pub mod request;
pub mod resolver;
pub mod service;
pub mod shape;
pub mod subscription;
pub mod value;

pub use bridge::{OverrideReceipt, PrivilegeBridge};
pub use broker::BrokerEntry;
pub use config::{BridgeConfig, ConfigError, DeviceConfig, LauncherConfig, LoggingConfig};
pub use context::{BridgeContext, BridgeContextBuilder};
pub use directory::{CarrierDirectory, DEVICE_VOLTE_AVAILABLE};
pub use elevation::{ElevationDecision, classify};
pub use error::{BridgeError, CallFailure, CallFailureKind, ErrorCategory, Result};
pub use facade::SubscriptionConfig;
pub use features::{ConfigReader, FeatureFlag};
pub use identity::IdentityGuard;
pub use launcher::CommandLauncher;
pub use release::{OsRelease, sdk};
pub use remote::{Arg, RemoteCall, Reply};
pub use request::{
    ArgumentBag, Completion, CompletionFailure, DelegatedRequest, RequestCodecError,
};
pub use resolver::{InterfaceCache, InterfaceFamily, ServiceResolver};
pub use service::{
    PrivilegedChannel, ProcessLauncher, RawBinder, RegistryError, RemoteObject, ServiceHandle,
    ServiceManager, ServiceRegistry, ShellIdentity, SystemResources,
};
pub use shape::{CallShape, Landed, ShapeChain};
pub use subscription::{INVALID_SUBSCRIPTION_ID, SubscriptionContext, SubscriptionInfo};
pub use value::{ConfigBundle, ConfigValue, OverrideSet};
