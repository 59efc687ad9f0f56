//! # features 模块说明
//!
//! ## 角色定位（Why）
//! - 面向用户的特性（VoLTE、VoNR、VoWiFi 等）并不直接对应某一个配置键，而是若干键的组合；
//! - 键只在特定系统版本之后才有定义，低于最低版本时派生标志恒为 `false`，不做任何查询。
//!
//! ## 契约（What）
//! - [`FeatureFlag::evaluate`] 是 [`ConfigReader`] 读取结果的纯函数；版本门控通过
//!   [`OsRelease::release_at_least`] 显式判断；
//! - [`FeatureFlag::write_set`] 给出开启或关闭该特性时应一次性写入的覆写集合。

use std::fmt;
use std::str::FromStr;

use crate::release::{OsRelease, sdk};
use crate::value::{ConfigBundle, OverrideSet};

pub mod keys {
    pub const CARRIER_VOLTE_AVAILABLE: &str = "carrier_volte_available_bool";
    pub const VONR_ENABLED: &str = "vonr_enabled_bool";
    pub const VONR_SETTING_VISIBILITY: &str = "vonr_setting_visibility_bool";
    pub const CARRIER_CROSS_SIM_IMS_AVAILABLE: &str = "carrier_cross_sim_ims_available_bool";
    pub const ENABLE_CROSS_SIM_CALLING_ON_OPPORTUNISTIC_DATA: &str =
        "enable_cross_sim_calling_on_opportunistic_data_bool";
    pub const CARRIER_WFC_IMS_AVAILABLE: &str = "carrier_wfc_ims_available_bool";
    pub const CARRIER_DEFAULT_WFC_IMS_ROAMING_ENABLED: &str =
        "carrier_default_wfc_ims_roaming_enabled_bool";
    pub const SHOW_IMS_REGISTRATION_STATUS: &str = "show_ims_registration_status_bool";
    pub const ALLOW_ADDING_APNS: &str = "allow_adding_apns_bool";
    pub const EDITABLE_WFC_MODE: &str = "editable_wfc_mode_bool";
    pub const EDITABLE_WFC_ROAMING_MODE: &str = "editable_wfc_roaming_mode_bool";
    pub const SHOW_WIFI_CALLING_ICON_IN_STATUS_BAR: &str =
        "show_wifi_calling_icon_in_status_bar_bool";
    pub const ALWAYS_SHOW_DATA_RAT_ICON: &str = "always_show_data_rat_icon_bool";
    pub const CARRIER_WFC_SUPPORTS_WIFI_ONLY: &str = "carrier_wfc_supports_wifi_only_bool";
    pub const CARRIER_VT_AVAILABLE: &str = "carrier_vt_available_bool";
    pub const CARRIER_SUPPORTS_SS_OVER_UT: &str = "carrier_supports_ss_over_ut_bool";
    pub const SUPPORT_SS_OVER_CDMA: &str = "support_ss_over_cdma_bool";
    pub const SHOW_4G_FOR_LTE_DATA_ICON: &str = "show_4g_for_lte_data_icon_bool";
    pub const HIDE_LTE_PLUS_DATA_ICON: &str = "hide_lte_plus_data_icon_bool";
    pub const EDITABLE_ENHANCED_4G_LTE: &str = "editable_enhanced_4g_lte_bool";
    pub const ENHANCED_4G_LTE_ON_BY_DEFAULT: &str = "enhanced_4g_lte_on_by_default_bool";
    pub const HIDE_ENHANCED_4G_LTE: &str = "hide_enhanced_4g_lte_bool";
    pub const CARRIER_NR_AVAILABILITIES: &str = "carrier_nr_availabilities_int_array";
    pub const IMS_USER_AGENT: &str = "ims.ims_user_agent_string";
    pub const WFC_SPN_FORMAT_IDX: &str = "wfc_spn_format_idx_int";
}

/// NR 同时支持 NSA(1) 与 SA(2)。
const NR_NSA_AND_SA: [i32; 2] = [1, 2];
const NR_NSA_ONLY: [i32; 1] = [1];

/// 派生标志求值所需的最小读取能力。缺失或类型不符的键读作 `false` / 空数组。
pub trait ConfigReader {
    fn read_bool(&self, key: &str) -> bool;
    fn read_int_array(&self, key: &str) -> Vec<i32>;
}

impl ConfigReader for ConfigBundle {
    fn read_bool(&self, key: &str) -> bool {
        self.get_bool(key).unwrap_or(false)
    }

    fn read_int_array(&self, key: &str) -> Vec<i32> {
        self.get_int_array(key).map(<[i32]>::to_vec).unwrap_or_default()
    }
}

/// 按订阅派生的特性标志。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureFlag {
    Volte,
    Vonr,
    CrossSim,
    Vowifi,
    VowifiRoaming,
    ImsStatusInSimInfo,
    AllowAddingApns,
    VowifiModeEditable,
    VowifiRoamingModeEditable,
    VowifiIcon,
    AlwaysDataRatIcon,
    WfcWifiOnly,
    VideoCalling,
    SsOverUt,
    SsOverCdma,
    Show4gForLte,
    HideEnhancedDataIcon,
    Enhanced4gLte,
    NrAvailability,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 19] = [
        Self::Volte,
        Self::Vonr,
        Self::CrossSim,
        Self::Vowifi,
        Self::VowifiRoaming,
        Self::ImsStatusInSimInfo,
        Self::AllowAddingApns,
        Self::VowifiModeEditable,
        Self::VowifiRoamingModeEditable,
        Self::VowifiIcon,
        Self::AlwaysDataRatIcon,
        Self::WfcWifiOnly,
        Self::VideoCalling,
        Self::SsOverUt,
        Self::SsOverCdma,
        Self::Show4gForLte,
        Self::HideEnhancedDataIcon,
        Self::Enhanced4gLte,
        Self::NrAvailability,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Volte => "volte",
            Self::Vonr => "vonr",
            Self::CrossSim => "cross_sim",
            Self::Vowifi => "vowifi",
            Self::VowifiRoaming => "vowifi_roaming",
            Self::ImsStatusInSimInfo => "ims_status_in_sim_info",
            Self::AllowAddingApns => "allow_adding_apns",
            Self::VowifiModeEditable => "vowifi_mode_editable",
            Self::VowifiRoamingModeEditable => "vowifi_roaming_mode_editable",
            Self::VowifiIcon => "vowifi_icon",
            Self::AlwaysDataRatIcon => "always_data_rat_icon",
            Self::WfcWifiOnly => "wfc_wifi_only",
            Self::VideoCalling => "video_calling",
            Self::SsOverUt => "ss_over_ut",
            Self::SsOverCdma => "ss_over_cdma",
            Self::Show4gForLte => "show_4g_for_lte",
            Self::HideEnhancedDataIcon => "hide_enhanced_data_icon",
            Self::Enhanced4gLte => "enhanced_4g_lte",
            Self::NrAvailability => "nr_availability",
        }
    }

    /// 定义底层配置键的最低 SDK 级别；`None` 表示所有受支持版本均可用。
    pub fn min_release(self) -> Option<u32> {
        match self {
            Self::Vonr => Some(sdk::UPSIDE_DOWN_CAKE),
            Self::CrossSim => Some(sdk::TIRAMISU),
            Self::NrAvailability => Some(sdk::S),
            Self::ImsStatusInSimInfo
            | Self::VowifiModeEditable
            | Self::VowifiRoamingModeEditable
            | Self::AlwaysDataRatIcon
            | Self::Show4gForLte
            | Self::HideEnhancedDataIcon => Some(sdk::R),
            Self::SsOverUt => Some(sdk::Q),
            _ => None,
        }
    }

    /// 当前版本是否定义了该标志的底层键。
    pub fn is_supported(self, release: &OsRelease) -> bool {
        self.min_release()
            .is_none_or(|required| release.release_at_least(required))
    }

    /// 参与求值的配置键。
    pub fn keys(self) -> &'static [&'static str] {
        use keys::*;
        match self {
            Self::Volte => &[CARRIER_VOLTE_AVAILABLE],
            Self::Vonr => &[VONR_ENABLED, VONR_SETTING_VISIBILITY],
            Self::CrossSim => &[
                CARRIER_CROSS_SIM_IMS_AVAILABLE,
                ENABLE_CROSS_SIM_CALLING_ON_OPPORTUNISTIC_DATA,
            ],
            Self::Vowifi => &[CARRIER_WFC_IMS_AVAILABLE],
            Self::VowifiRoaming => &[CARRIER_DEFAULT_WFC_IMS_ROAMING_ENABLED],
            Self::ImsStatusInSimInfo => &[SHOW_IMS_REGISTRATION_STATUS],
            Self::AllowAddingApns => &[ALLOW_ADDING_APNS],
            Self::VowifiModeEditable => &[EDITABLE_WFC_MODE],
            Self::VowifiRoamingModeEditable => &[EDITABLE_WFC_ROAMING_MODE],
            Self::VowifiIcon => &[SHOW_WIFI_CALLING_ICON_IN_STATUS_BAR],
            Self::AlwaysDataRatIcon => &[ALWAYS_SHOW_DATA_RAT_ICON],
            Self::WfcWifiOnly => &[CARRIER_WFC_SUPPORTS_WIFI_ONLY],
            Self::VideoCalling => &[CARRIER_VT_AVAILABLE],
            Self::SsOverUt => &[CARRIER_SUPPORTS_SS_OVER_UT],
            Self::SsOverCdma => &[SUPPORT_SS_OVER_CDMA],
            Self::Show4gForLte => &[SHOW_4G_FOR_LTE_DATA_ICON],
            Self::HideEnhancedDataIcon => &[HIDE_LTE_PLUS_DATA_ICON],
            Self::Enhanced4gLte => &[
                EDITABLE_ENHANCED_4G_LTE,
                ENHANCED_4G_LTE_ON_BY_DEFAULT,
                HIDE_ENHANCED_4G_LTE,
            ],
            Self::NrAvailability => &[CARRIER_NR_AVAILABILITIES],
        }
    }

    /// 求值派生标志；低于最低版本时恒为 `false` 且不读取任何键。
    pub fn evaluate(self, reader: &dyn ConfigReader, release: &OsRelease) -> bool {
        if !self.is_supported(release) {
            return false;
        }
        use keys::*;
        match self {
            Self::Vonr | Self::CrossSim => self.keys().iter().all(|key| reader.read_bool(key)),
            Self::Enhanced4gLte => {
                let on_by_default = !release.release_at_least(sdk::Q)
                    || reader.read_bool(ENHANCED_4G_LTE_ON_BY_DEFAULT);
                reader.read_bool(EDITABLE_ENHANCED_4G_LTE)
                    && on_by_default
                    && !reader.read_bool(HIDE_ENHANCED_4G_LTE)
            }
            Self::NrAvailability => reader.read_int_array(CARRIER_NR_AVAILABILITIES) == NR_NSA_AND_SA,
            _ => reader.read_bool(self.keys()[0]),
        }
    }

    /// 开启或关闭该特性时一次性写入的覆写集合。
    pub fn write_set(self, enabled: bool) -> OverrideSet {
        use keys::*;
        match self {
            Self::Enhanced4gLte => OverrideSet::new()
                .with(EDITABLE_ENHANCED_4G_LTE, enabled)
                .with(ENHANCED_4G_LTE_ON_BY_DEFAULT, enabled)
                .with(HIDE_ENHANCED_4G_LTE, !enabled),
            Self::NrAvailability => {
                let modes = if enabled {
                    NR_NSA_AND_SA.to_vec()
                } else {
                    NR_NSA_ONLY.to_vec()
                };
                OverrideSet::single(CARRIER_NR_AVAILABILITIES, modes)
            }
            _ => self.keys().iter().map(|key| (*key, enabled)).collect(),
        }
    }
}

impl fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 未知的特性名。
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature flag `{0}`")]
pub struct UnknownFeature(pub String);

impl FromStr for FeatureFlag {
    type Err = UnknownFeature;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().replace('-', "_").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|flag| flag.name() == wanted)
            .ok_or_else(|| UnknownFeature(raw.to_owned()))
    }
}
