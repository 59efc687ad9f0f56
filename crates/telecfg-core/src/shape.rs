//! # shape 模块说明
//!
//! ## 角色定位（Why）
//! - 系统服务的方法签名随版本追加尾部参数，而调用方无法在编译期得知运行中的是哪一版；
//! - 版本漂移调用适配器为每个逻辑操作维护一条“从新到旧”的调用形态链，逐个尝试直到落地。
//!
//! ## 契约（What）
//! - 每个 [`CallShape`] 是一等值：标签 + 调用函数，链在构造时即完全枚举，不做运行时方法发现；
//! - 第 *i* 个形态以 [`CallFailure::NoSuchMethod`] 或 [`CallFailure::SecurityDenied`] 失败时，
//!   以相同的逻辑参数尝试第 *i+1* 个形态；其他失败立即终止整条链；
//! - 全部形态均以可回退失败告终时，最后一次失败按类型上抛为 `PermissionDenied` 或 `NotFound`。
//!
//! ## 风险（Trade-offs）
//! - 从新到旧是强制顺序：若从最旧签名开始探测，新版本上会静默使用降级行为。

use std::fmt;

use tracing::{debug, warn};

use crate::error::{BridgeError, CallFailure, Result};
use crate::service::ServiceHandle;

type ShapeFn<'f, T> = Box<dyn Fn(&ServiceHandle) -> core::result::Result<T, CallFailure> + 'f>;

/// 逻辑操作的一个具体调用形态。
pub struct CallShape<'f, T> {
    tag: &'static str,
    call: ShapeFn<'f, T>,
}

impl<'f, T> CallShape<'f, T> {
    pub fn new<F>(tag: &'static str, call: F) -> Self
    where
        F: Fn(&ServiceHandle) -> core::result::Result<T, CallFailure> + 'f,
    {
        Self {
            tag,
            call: Box::new(call),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }
}

impl<T> fmt::Debug for CallShape<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallShape").field(&self.tag).finish()
    }
}

/// 调用成功落地的结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Landed<T> {
    pub value: T,
    /// 落地的调用形态标签。
    pub shape: &'static str,
    /// 含落地那一次在内的尝试次数。
    pub attempts: usize,
}

impl<T> Landed<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Landed<U> {
        Landed {
            value: f(self.value),
            shape: self.shape,
            attempts: self.attempts,
        }
    }
}

enum Step<T> {
    Landed(Landed<T>),
    FellBack(CallFailure),
}

/// 从新到旧排列的调用形态链。
///
/// # 教案式说明
/// - **意图 (Why)**：把回退规则从具体操作中剥离，使每条链都能脱离真实服务单独测试；
/// - **契约 (What)**：
///   - [`ShapeChain::new`] 要求至少一个形态，链因此永不为空；
///   - [`ShapeChain::invoke`] 每次尝试输出一条 `debug!`，每次回退输出一条 `warn!`；
/// - **风险 (Trade-offs)**：形态以装箱闭包保存，每条链构造一次就有少量分配，
///   相对一次跨进程调用的开销可以忽略。
pub struct ShapeChain<'f, T> {
    operation: &'static str,
    first: CallShape<'f, T>,
    rest: Vec<CallShape<'f, T>>,
}

impl<'f, T> ShapeChain<'f, T> {
    pub fn new<F>(operation: &'static str, tag: &'static str, call: F) -> Self
    where
        F: Fn(&ServiceHandle) -> core::result::Result<T, CallFailure> + 'f,
    {
        Self {
            operation,
            first: CallShape::new(tag, call),
            rest: Vec::new(),
        }
    }

    /// 追加一个更旧的调用形态。
    pub fn then<F>(mut self, tag: &'static str, call: F) -> Self
    where
        F: Fn(&ServiceHandle) -> core::result::Result<T, CallFailure> + 'f,
    {
        self.rest.push(CallShape::new(tag, call));
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// 按尝试顺序排列的形态标签。
    pub fn tags(&self) -> Vec<&'static str> {
        self.shapes().map(CallShape::tag).collect()
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn shapes(&self) -> impl Iterator<Item = &CallShape<'f, T>> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    /// 在给定句柄上依次尝试各调用形态。
    pub fn invoke(&self, handle: &ServiceHandle) -> Result<Landed<T>> {
        let mut last = match self.attempt(&self.first, 1, handle)? {
            Step::Landed(landed) => return Ok(landed),
            Step::FellBack(failure) => (self.first.tag, failure),
        };
        for (offset, shape) in self.rest.iter().enumerate() {
            match self.attempt(shape, offset + 2, handle)? {
                Step::Landed(landed) => return Ok(landed),
                Step::FellBack(failure) => last = (shape.tag, failure),
            }
        }
        let (shape, failure) = last;
        warn!(
            operation = self.operation,
            shape,
            %failure,
            "all call shapes exhausted"
        );
        Err(BridgeError::exhausted(self.operation, shape, failure))
    }

    fn attempt(
        &self,
        shape: &CallShape<'f, T>,
        attempt: usize,
        handle: &ServiceHandle,
    ) -> Result<Step<T>> {
        debug!(
            operation = self.operation,
            shape = shape.tag,
            attempt,
            family = %handle.family(),
            "attempting call shape"
        );
        match (shape.call)(handle) {
            Ok(value) => Ok(Step::Landed(Landed {
                value,
                shape: shape.tag,
                attempts: attempt,
            })),
            Err(failure) if failure.kind().falls_back() => {
                warn!(
                    operation = self.operation,
                    shape = shape.tag,
                    %failure,
                    "call shape rejected, falling back"
                );
                Ok(Step::FellBack(failure))
            }
            Err(failure) => Err(BridgeError::Remote {
                operation: self.operation,
                shape: shape.tag,
                source: failure,
            }),
        }
    }
}

impl<T> fmt::Debug for ShapeChain<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeChain")
            .field("operation", &self.operation)
            .field("shapes", &self.tags())
            .finish()
    }
}
