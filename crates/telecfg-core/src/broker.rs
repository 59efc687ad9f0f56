//! # broker 模块说明
//!
//! ## 角色定位（Why）
//! - 运行在提升身份后的二级进程内：解码委托请求，在临时 shell 身份下执行覆写，然后结束；
//! - 与直接路径面对同一签名漂移问题，因此同样走从新到旧的回退链（三种递减参数个数的形态）。
//!
//! ## 契约（What）
//! - 无启动参数即为空操作（防止在桥接层之外被误调用），[`BrokerEntry::run`] 返回 `None`；
//! - shell 身份在每条退出路径上都会释放，包括覆写失败与 panic；
//! - 结果折叠为类型化的 [`Completion`]，不吞掉失败。

use tracing::{info, warn};

use crate::catalog;
use crate::context::BridgeContext;
use crate::identity::IdentityGuard;
use crate::request::{Completion, CompletionFailure, DelegatedRequest};
use crate::resolver::InterfaceFamily;

/// 二级进程入口。
#[derive(Clone, Copy, Debug)]
pub struct BrokerEntry<'a> {
    ctx: &'a BridgeContext,
}

impl<'a> BrokerEntry<'a> {
    pub fn new(ctx: &'a BridgeContext) -> Self {
        Self { ctx }
    }

    /// 处理二级进程收到的启动参数。
    pub fn run<I, S>(&self, args: I) -> Option<Completion>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match DelegatedRequest::from_command_args(args) {
            Ok(None) => {
                info!("broker started without a request, nothing to do");
                None
            }
            Ok(Some(request)) => Some(self.execute(&request)),
            Err(err) => {
                warn!(error = %err, "broker received a malformed request");
                Some(Completion::failed(CompletionFailure::Malformed, err.to_string()))
            }
        }
    }

    /// 在 shell 身份下执行一次覆写。
    pub fn execute(&self, request: &DelegatedRequest) -> Completion {
        let subscription_id = request.subscription_id;
        info!(
            subscription_id,
            clear = request.is_clear(),
            "broker executing delegated override"
        );
        let Some(identity) = self.ctx.identity() else {
            return Completion::failed(
                CompletionFailure::Identity,
                "no shell identity is available in this process",
            );
        };
        let guard = match IdentityGuard::acquire(identity, self.ctx.caller_uid()) {
            Ok(guard) => guard,
            Err(failure) => {
                warn!(%failure, "could not assume shell identity");
                return Completion::failed(CompletionFailure::Identity, failure.to_string());
            }
        };

        let outcome = self
            .ctx
            .resolve(InterfaceFamily::CarrierConfigLoader)
            .and_then(|handle| {
                catalog::override_broker(subscription_id, request.overrides.as_ref())
                    .invoke(&handle)
            });

        if let Err(failure) = guard.release() {
            warn!(%failure, "failed to release shell identity");
        }

        match outcome {
            Ok(landed) => {
                info!(subscription_id, shape = landed.shape, "broker override applied");
                Completion::applied(landed.shape)
            }
            Err(err) => {
                warn!(subscription_id, code = err.code(), error = %err, "broker override failed");
                Completion::from_error(&err)
            }
        }
    }
}
