use tracing::{debug, warn};

use crate::error::CallFailure;
use crate::service::ShellIdentity;

/// 进程级 shell 身份的作用域守卫。
///
/// # 教案式说明
/// - **意图 (Why)**：提升后的身份只能存在于一次覆写调用期间，且不得泄漏回父进程；
///   在所有退出路径（包括覆写失败与 panic 展开）上都必须释放；
/// - **契约 (What)**：[`IdentityGuard::acquire`] 成功即表示身份已生效；
///   显式调用 [`IdentityGuard::release`] 可取得释放结果，否则在 `Drop` 中释放并以 `warn!` 记录失败；
/// - **风险 (Trade-offs)**：`Drop` 无法上抛错误，释放失败只能记录日志。
#[must_use = "dropping the guard immediately releases the shell identity"]
pub struct IdentityGuard<'a> {
    identity: &'a dyn ShellIdentity,
    uid: u32,
    released: bool,
}

impl<'a> IdentityGuard<'a> {
    pub fn acquire(identity: &'a dyn ShellIdentity, uid: u32) -> Result<Self, CallFailure> {
        identity.start_delegate_shell_permission_identity(uid)?;
        debug!(uid, "shell identity acquired");
        Ok(Self {
            identity,
            uid,
            released: false,
        })
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn release(mut self) -> Result<(), CallFailure> {
        self.released = true;
        self.identity.stop_delegate_shell_permission_identity()?;
        debug!(uid = self.uid, "shell identity released");
        Ok(())
    }
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.identity.stop_delegate_shell_permission_identity() {
            Ok(()) => debug!(uid = self.uid, "shell identity released on drop"),
            Err(failure) => warn!(uid = self.uid, %failure, "failed to release shell identity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<&'static str>>,
    }

    impl ShellIdentity for Recorder {
        fn start_delegate_shell_permission_identity(&self, _uid: u32) -> Result<(), CallFailure> {
            self.events.lock().push("start");
            Ok(())
        }

        fn stop_delegate_shell_permission_identity(&self) -> Result<(), CallFailure> {
            self.events.lock().push("stop");
            Ok(())
        }
    }

    #[test]
    fn explicit_release_stops_exactly_once() {
        let recorder = Recorder::default();
        let guard = IdentityGuard::acquire(&recorder, 2000).unwrap();
        guard.release().unwrap();
        assert_eq!(*recorder.events.lock(), ["start", "stop"]);
    }

    #[test]
    fn panic_while_held_still_releases() {
        let recorder = Recorder::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = IdentityGuard::acquire(&recorder, 2000).unwrap();
            panic!("override blew up");
        }));
        assert!(outcome.is_err());
        assert_eq!(*recorder.events.lock(), ["start", "stop"]);
    }
}
