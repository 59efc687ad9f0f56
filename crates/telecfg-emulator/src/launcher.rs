use parking_lot::Mutex;
use telecfg_core::{BridgeError, Completion, DelegatedRequest, ProcessLauncher};
use tracing::info;

use crate::device::EmulatedDevice;

/// 在当前进程内跑完二级进程逻辑的启动器。
///
/// # 教案式说明
/// - **意图 (Why)**：端到端测试需要覆盖“编码 → 跨边界 → 解码 → 提升身份 → 覆写 → 完成记录”整条链路，
///   又不希望真的派生子进程；
/// - **契约 (What)**：每次启动记录一次完整 argv；在设备的提升身份视图上构造独立上下文
///   （独立的接口缓存与 shell 身份），用 argv 驱动 [`telecfg_core::BrokerEntry::run`]，
///   并让完成记录经过一次 JSON 行编解码；
/// - **风险 (Trade-offs)**：与真实子进程不同，panic 会直接传播到调用方。
pub struct InProcessLauncher {
    device: EmulatedDevice,
    caller_uid: u32,
    launches: Mutex<Vec<Vec<String>>>,
}

impl InProcessLauncher {
    pub fn new(device: EmulatedDevice, caller_uid: u32) -> Self {
        Self {
            device,
            caller_uid,
            launches: Mutex::new(Vec::new()),
        }
    }

    /// 每次启动收到的 argv。
    pub fn launches(&self) -> Vec<Vec<String>> {
        self.launches.lock().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }
}

impl ProcessLauncher for InProcessLauncher {
    fn launch(&self, request: &DelegatedRequest) -> Result<Completion, BridgeError> {
        let args = request.to_command_args();
        self.launches.lock().push(args.clone());

        let child = self.device.spawn_elevated_process();
        let ctx = child
            .context_builder()
            .map_err(|err| BridgeError::delegation(format!("secondary process failed to start: {err}")))?
            .caller_uid(self.caller_uid)
            .build();
        let completion = ctx.broker().run(args).ok_or_else(|| {
            BridgeError::delegation("secondary process exited without a completion record")
        })?;
        info!(applied = completion.is_applied(), "in-process broker finished");

        Completion::from_json_line(&completion.to_json_line())
            .map_err(|err| BridgeError::delegation(format!("unreadable completion record: {err}")))
    }
}
