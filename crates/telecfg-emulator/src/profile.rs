use telecfg_core::release::sdk;
use telecfg_core::{ElevationDecision, OsRelease, classify};

/// 某个系统版本暴露的服务形态与权限策略。
///
/// # 教案式说明
/// - **意图 (Why)**：签名漂移与权限策略变化是桥接层要应对的全部“版本差异”，
///   仿真设备需要按版本真实地拒绝不存在的签名；
/// - **契约 (What)**：
///   - 服务注册表自 R(30) 起存在，此前只能按服务名查找；
///   - 配置查找的三种签名按版本累加：单参数始终存在，带包名自 Q(29)，带特性标签自 R(30)；
///   - 覆写签名自 R(30) 起为三参数（含持久化标志），此前为两参数；
///   - 活动订阅列表：U(34) 起三参数，R(30) 起两参数，此前单参数；
///   - 安全补丁不早于 2025-09 时，覆写必须由持有 shell 身份的进程发出。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseProfile {
    pub sdk_int: u32,
    pub has_registry: bool,
    pub config_with_package: bool,
    pub config_with_feature: bool,
    pub override_with_flag: bool,
    pub override_needs_shell: bool,
}

impl ReleaseProfile {
    pub fn for_release(release: &OsRelease) -> Self {
        let sdk_int = release.sdk_int;
        Self {
            sdk_int,
            has_registry: sdk_int >= sdk::R,
            config_with_package: sdk_int >= sdk::Q,
            config_with_feature: sdk_int >= sdk::R,
            override_with_flag: sdk_int >= sdk::R,
            override_needs_shell: classify(&release.security_patch) == ElevationDecision::Delegated,
        }
    }

    /// `getActiveSubscriptionInfoList` 在该版本上的参数个数。
    pub fn active_list_arity(&self) -> usize {
        if self.sdk_int >= sdk::UPSIDE_DOWN_CAKE {
            3
        } else if self.sdk_int >= sdk::R {
            2
        } else {
            1
        }
    }

    /// `getActiveSubscriptionInfoForSimSlotIndex` 在该版本上的参数个数。
    pub fn slot_lookup_arity(&self) -> usize {
        if self.sdk_int >= sdk::R { 3 } else { 2 }
    }

    pub fn override_arity(&self) -> usize {
        if self.override_with_flag { 3 } else { 2 }
    }

    /// 配置查找是否接受该参数个数。
    pub fn accepts_config_arity(&self, arity: usize, with_feature: bool) -> bool {
        match (with_feature, arity) {
            (true, 3) => self.config_with_feature,
            (false, 2) => self.config_with_package,
            (false, 1) => true,
            _ => false,
        }
    }
}
