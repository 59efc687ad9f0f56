//! # elevation 模块说明
//!
//! ## 意图（Why）
//! - 自 2025 年 9 月的安全补丁起，即使经由特权通道，非特权调用方直接发出的配置覆写也会被拒绝；
//!   安全补丁日期因此被用作“当前生效的是哪一版权限策略”的代理信号。
//!
//! ## 契约（What）
//! - [`classify`] 是 (年, 月) 的纯函数：`年 > 2025` 或 `年 == 2025 且 月 >= 9`（月份从 1 开始）时
//!   返回 [`ElevationDecision::Delegated`]，其余情况返回 [`ElevationDecision::Direct`]；
//! - 无法解析的日期同样返回 `Direct`，每次覆写请求重新计算，不做缓存。

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

const THRESHOLD_YEAR: i32 = 2025;
const THRESHOLD_MONTH: u32 = 9;

/// 一次覆写请求采用的路径。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationDecision {
    /// 由调用方进程经特权通道直接覆写。
    Direct,
    /// 交给提升身份后的二级进程执行。
    Delegated,
}

/// 根据安全补丁日期（`YYYY-MM-DD`）判定覆写路径。
pub fn classify(security_patch: &str) -> ElevationDecision {
    match NaiveDate::parse_from_str(security_patch.trim(), "%Y-%m-%d") {
        Ok(date) if requires_delegation(date.year(), date.month()) => ElevationDecision::Delegated,
        Ok(_) => ElevationDecision::Direct,
        Err(_) => ElevationDecision::Direct,
    }
}

fn requires_delegation(year: i32, month: u32) -> bool {
    year > THRESHOLD_YEAR || (year == THRESHOLD_YEAR && month >= THRESHOLD_MONTH)
}
