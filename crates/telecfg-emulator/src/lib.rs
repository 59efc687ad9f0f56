#![deny(unsafe_code)]

//! # telecfg-emulator
//!
//! ## 定位（Why）
//! - 以纯用户态方式仿真一台设备上的电话相关系统服务，使桥接层的解析、回退与委托路径
//!   可以在没有真实设备的情况下端到端运行；
//! - 设备状态（运营商默认配置、活动覆写、IMS 重置记录）可以落盘为 JSON 镜像，
//!   命令行进程与二级进程借此共享同一个“服务进程”。
//!
//! ## 结构（Where）
//! - [`profile`]：按 SDK 级别与安全补丁推导的版本画像（存在哪些注册表与签名、采用哪版权限策略）；
//! - [`image`]：设备镜像与其存储（内存或文件）；
//! - [`device`]：[`EmulatedDevice`]，实现 `telecfg-core` 的全部服务边界 trait；
//! - [`launcher`]：在同一进程内跑完二级进程逻辑的 [`InProcessLauncher`]。

pub mod device;
pub mod image;
pub mod launcher;
pub mod profile;

pub use device::EmulatedDevice;
pub use image::{CallRecord, DeviceImage, EmulatorError, carrier_defaults};
pub use launcher::InProcessLauncher;
pub use profile::ReleaseProfile;
