//! # bridge 模块说明
//!
//! ## 角色定位（Why）
//! - 特权委托桥决定一次覆写能否由调用方直接发出，还是必须交给提升身份后的二级进程；
//! - 判定依据是安全补丁日期（见 [`crate::elevation`]），每次请求重新计算。
//!
//! ## 执行路径（How）
//! 1. `Direct`：在配置加载器句柄上执行 [`catalog::override_direct`]，持久化标志为真；
//! 2. `Delegated`：构造 [`DelegatedRequest`]，经 [`crate::ProcessLauncher`] 启动二级进程并阻塞等待
//!    完成记录；`Failed` 记录以与直接路径同粒度的 [`BridgeError::DelegatedFailure`] 上抛。
//!
//! ## 约束（Constraints）
//! - 无部分结果：要么收到完成记录，要么报告委托传输失败；
//! - 等待二级进程无超时。

use serde::Serialize;
use tracing::info;

use crate::catalog;
use crate::context::BridgeContext;
use crate::elevation::{ElevationDecision, classify};
use crate::error::{BridgeError, Result};
use crate::request::DelegatedRequest;
use crate::resolver::InterfaceFamily;
use crate::value::OverrideSet;

/// 一次覆写提交的回执：实际走的路径与落地的调用形态。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverrideReceipt {
    pub decision: ElevationDecision,
    pub shape: String,
}

/// 特权委托桥。
#[derive(Clone, Copy, Debug)]
pub struct PrivilegeBridge<'a> {
    ctx: &'a BridgeContext,
}

impl<'a> PrivilegeBridge<'a> {
    pub fn new(ctx: &'a BridgeContext) -> Self {
        Self { ctx }
    }

    /// 当前版本下覆写会采用的路径。
    pub fn decision(&self) -> ElevationDecision {
        classify(&self.ctx.release().security_patch)
    }

    /// 提交覆写；`overrides == None` 清除该订阅的全部覆写。
    pub fn apply_override(
        &self,
        subscription_id: i32,
        overrides: Option<&OverrideSet>,
    ) -> Result<OverrideReceipt> {
        let decision = self.decision();
        info!(
            subscription_id,
            ?decision,
            clear = overrides.is_none(),
            entries = overrides.map_or(0, OverrideSet::len),
            "submitting config override"
        );
        let shape = match decision {
            ElevationDecision::Direct => self.apply_direct(subscription_id, overrides)?,
            ElevationDecision::Delegated => self.apply_delegated(subscription_id, overrides)?,
        };
        info!(subscription_id, ?decision, shape = %shape, "config override applied");
        Ok(OverrideReceipt { decision, shape })
    }

    fn apply_direct(&self, subscription_id: i32, overrides: Option<&OverrideSet>) -> Result<String> {
        let handle = self.ctx.resolve(InterfaceFamily::CarrierConfigLoader)?;
        let landed = catalog::override_direct(subscription_id, overrides).invoke(&handle)?;
        Ok(landed.shape.to_owned())
    }

    fn apply_delegated(
        &self,
        subscription_id: i32,
        overrides: Option<&OverrideSet>,
    ) -> Result<String> {
        let launcher = self
            .ctx
            .launcher()
            .ok_or_else(|| BridgeError::delegation("no process launcher is configured"))?;
        let request = DelegatedRequest::new(subscription_id, overrides.cloned());
        launcher.launch(&request)?.into_result()
    }
}
