//! 以子进程方式启动二级进程的 [`ProcessLauncher`] 实现。

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::BridgeError;
use crate::request::{Completion, DelegatedRequest};
use crate::service::ProcessLauncher;

/// 通过命令行启动二级进程。
///
/// # 教案式说明
/// - **意图 (Why)**：提升身份的方式因部署而异（`su`、特权 shell 包装器等），
///   因此以一段 argv 前缀表达，启动器本身只负责拼接参数与读取完成记录；
/// - **契约 (What)**：
///   - 命令行为 `<elevate...> <program> <base_args...> -e <名> <值> ...`；
///   - 标准输出的最后一个非空行必须是 [`Completion`] 的 JSON 行，标准错误直接继承给父进程；
///   - 无法启动、输出中没有完成记录、记录无法解析，都返回 [`BridgeError::Delegation`]；
/// - **风险 (Trade-offs)**：阻塞等待子进程退出，没有超时。
#[derive(Clone, Debug)]
pub struct CommandLauncher {
    program: PathBuf,
    elevate: Vec<String>,
    base_args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            elevate: Vec::new(),
            base_args: Vec::new(),
        }
    }

    /// 设置提升身份用的 argv 前缀，例如 `["su", "2000"]`。
    pub fn with_elevation(mut self, prefix: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.elevate = prefix.into_iter().map(Into::into).collect();
        self
    }

    /// 设置请求参数之前的固定参数，例如子命令名。
    pub fn with_base_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// 完整 argv，首元素为实际执行的程序。
    pub fn command_line(&self, request: &DelegatedRequest) -> Vec<String> {
        self.elevate
            .iter()
            .cloned()
            .chain(std::iter::once(self.program.display().to_string()))
            .chain(self.base_args.iter().cloned())
            .chain(request.to_command_args())
            .collect()
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, request: &DelegatedRequest) -> Result<Completion, BridgeError> {
        let argv = self.command_line(request);
        let Some((program, args)) = argv.split_first() else {
            return Err(BridgeError::delegation("empty command line"));
        };
        debug!(program = %program, args = ?args, "launching secondary process");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|err| BridgeError::delegation(format!("failed to launch `{program}`: {err}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| {
                BridgeError::delegation(format!(
                    "secondary process exited with {} without a completion record",
                    output.status
                ))
            })?;
        let completion = Completion::from_json_line(line).map_err(|err| {
            BridgeError::delegation(format!("unreadable completion record `{line}`: {err}"))
        })?;
        if completion.is_applied() && !output.status.success() {
            return Err(BridgeError::delegation(format!(
                "secondary process reported success but exited with {}",
                output.status
            )));
        }
        info!(status = %output.status, applied = completion.is_applied(), "secondary process finished");
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OverrideSet;

    #[test]
    fn command_line_puts_elevation_prefix_first() {
        let launcher = CommandLauncher::new("/data/local/tmp/telecfg")
            .with_elevation(["su", "2000"])
            .with_base_args(["broker"]);
        let request = DelegatedRequest::new(5, Some(OverrideSet::single("vonr_enabled_bool", true)));
        let argv = launcher.command_line(&request);
        assert_eq!(&argv[..4], ["su", "2000", "/data/local/tmp/telecfg", "broker"]);
        assert_eq!(argv.len(), 4 + 9);
    }

    #[test]
    fn missing_program_is_a_delegation_failure() {
        let launcher = CommandLauncher::new("/nonexistent/telecfg-broker");
        let err = launcher
            .launch(&DelegatedRequest::new(1, None))
            .unwrap_err();
        assert_eq!(err.code(), "telecfg.delegate.transport");
    }
}
