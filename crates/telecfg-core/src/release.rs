//! 运行中系统版本的描述与版本门控。
//!
//! 派生特性标志依赖的配置键只在特定版本之后才有定义，门控以显式分支
//! [`OsRelease::release_at_least`] 表达。

use serde::{Deserialize, Serialize};

/// 常用系统版本的 SDK 级别。
pub mod sdk {
    /// Android 10。
    pub const Q: u32 = 29;
    /// Android 11。
    pub const R: u32 = 30;
    /// Android 12。
    pub const S: u32 = 31;
    /// Android 13。
    pub const TIRAMISU: u32 = 33;
    /// Android 14。
    pub const UPSIDE_DOWN_CAKE: u32 = 34;
}

/// 运行中的系统版本。
///
/// - `sdk_int` 驱动派生特性标志的版本门控；
/// - `security_patch` 为原样保留的安全补丁日期字符串，由 [`crate::elevation::classify`] 解释。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsRelease {
    pub sdk_int: u32,
    pub security_patch: String,
}

impl OsRelease {
    pub fn new(sdk_int: u32, security_patch: impl Into<String>) -> Self {
        Self {
            sdk_int,
            security_patch: security_patch.into(),
        }
    }

    /// 当前版本是否不低于 `required`。
    pub fn release_at_least(&self, required: u32) -> bool {
        self.sdk_int >= required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_gate_is_inclusive() {
        let release = OsRelease::new(sdk::TIRAMISU, "2024-01-01");
        assert!(release.release_at_least(sdk::TIRAMISU));
        assert!(release.release_at_least(sdk::R));
        assert!(!release.release_at_least(sdk::UPSIDE_DOWN_CAKE));
    }
}
