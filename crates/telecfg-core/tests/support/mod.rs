//! 集成测试共用的记录型替身。
//!
//! # 模块定位（Why）
//! - 解析顺序、回退链与委托路径的断言都需要观察“谁在什么时候被调用”，因此所有替身都把调用写入日志；
//! - 远端对象以闭包脚本化，每个用例只描述自己关心的方法。
//!
//! # 契约说明（What）
//! - [`Journal`] 按时间顺序记录注册表、服务管理器、身份与启动器上的事件；
//! - [`ScriptedObject`] 记录收到的每一次 [`RemoteCall`]，未脚本化的方法一律返回 `NoSuchMethod`。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use telecfg_core::{
    BridgeContext, BridgeError, CallFailure, Completion, DelegatedRequest, InterfaceFamily,
    OsRelease, PrivilegedChannel, ProcessLauncher, RawBinder, RegistryError, RemoteCall,
    RemoteObject, Reply, ServiceManager, ServiceRegistry, ShellIdentity,
};

#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

type Handler = dyn Fn(&RemoteCall) -> Result<Reply, CallFailure> + Send + Sync;

pub struct ScriptedObject {
    descriptor: String,
    handler: Box<Handler>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl ScriptedObject {
    pub fn new<F>(descriptor: impl Into<String>, handler: F) -> Arc<Self>
    where
        F: Fn(&RemoteCall) -> Result<Reply, CallFailure> + Send + Sync + 'static,
    {
        Arc::new(Self {
            descriptor: descriptor.into(),
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// 对所有调用都返回 `NoSuchMethod` 的对象。
    pub fn inert(family: InterfaceFamily) -> Arc<Self> {
        let descriptor = family.descriptor();
        Self::new(descriptor, move |call| {
            Err(CallFailure::no_such_method(descriptor, call.method))
        })
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    pub fn methods(&self) -> Vec<(&'static str, usize)> {
        self.calls
            .lock()
            .iter()
            .map(|call| (call.method, call.arity()))
            .collect()
    }
}

impl RemoteObject for ScriptedObject {
    fn descriptor(&self) -> &str {
        &self.descriptor
    }

    fn transact(&self, call: &RemoteCall) -> Result<Reply, CallFailure> {
        self.calls.lock().push(call.clone());
        (self.handler)(call)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryMode {
    Serves,
    Unavailable,
    Broken,
}

pub struct FakeRegistry {
    mode: RegistryMode,
    objects: HashMap<InterfaceFamily, RawBinder>,
    journal: Arc<Journal>,
}

impl ServiceRegistry for FakeRegistry {
    fn lookup(&self, family: InterfaceFamily) -> Result<RawBinder, RegistryError> {
        self.journal.record(format!("registry:{family}"));
        match self.mode {
            RegistryMode::Serves => self
                .objects
                .get(&family)
                .cloned()
                .ok_or_else(|| RegistryError::failed(format!("{family} not registered"))),
            RegistryMode::Unavailable => Err(RegistryError::unavailable(
                "TelephonyFrameworkInitializer not found",
            )),
            RegistryMode::Broken => Err(RegistryError::failed("binder died")),
        }
    }
}

pub struct FakeManager {
    objects: HashMap<String, RawBinder>,
    journal: Arc<Journal>,
}

impl ServiceManager for FakeManager {
    fn get_service(&self, name: &str) -> Option<RawBinder> {
        self.journal.record(format!("manager:{name}"));
        self.objects.get(name).cloned()
    }
}

#[derive(Default)]
pub struct CountingChannel {
    wraps: AtomicUsize,
}

impl CountingChannel {
    pub fn wraps(&self) -> usize {
        self.wraps.load(Ordering::SeqCst)
    }
}

impl PrivilegedChannel for CountingChannel {
    fn wrap(&self, binder: RawBinder) -> RawBinder {
        self.wraps.fetch_add(1, Ordering::SeqCst);
        binder
    }
}

pub struct RecordingIdentity {
    journal: Arc<Journal>,
    refuse_start: bool,
}

impl ShellIdentity for RecordingIdentity {
    fn start_delegate_shell_permission_identity(&self, uid: u32) -> Result<(), CallFailure> {
        self.journal.record(format!("identity:start:{uid}"));
        if self.refuse_start {
            return Err(CallFailure::security_denied(
                "startDelegateShellPermissionIdentity",
                "caller is not the shell",
            ));
        }
        Ok(())
    }

    fn stop_delegate_shell_permission_identity(&self) -> Result<(), CallFailure> {
        self.journal.record("identity:stop");
        Ok(())
    }
}

pub struct RecordingLauncher {
    requests: Mutex<Vec<DelegatedRequest>>,
    outcome: Mutex<Option<Completion>>,
    journal: Arc<Journal>,
}

impl RecordingLauncher {
    pub fn requests(&self) -> Vec<DelegatedRequest> {
        self.requests.lock().clone()
    }

    /// 后续启动回报的完成记录；`None` 表示没有完成记录。
    pub fn respond_with(&self, completion: Option<Completion>) {
        *self.outcome.lock() = completion;
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, request: &DelegatedRequest) -> Result<Completion, BridgeError> {
        self.journal.record("launcher:launch");
        self.requests.lock().push(request.clone());
        self.outcome
            .lock()
            .clone()
            .ok_or_else(|| BridgeError::delegation("secondary process exited without a completion record"))
    }
}

/// 组装好的测试上下文及其全部替身。
pub struct Fixture {
    pub ctx: BridgeContext,
    pub journal: Arc<Journal>,
    pub channel: Arc<CountingChannel>,
    pub launcher: Arc<RecordingLauncher>,
}

pub struct FixtureBuilder {
    mode: RegistryMode,
    objects: HashMap<InterfaceFamily, RawBinder>,
    legacy_missing: bool,
    release: OsRelease,
    refuse_identity: bool,
    with_launcher: bool,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self {
            mode: RegistryMode::Serves,
            objects: HashMap::new(),
            legacy_missing: false,
            release: OsRelease::new(34, "2024-01-01"),
            refuse_identity: false,
            with_launcher: true,
        }
    }

    pub fn registry(mut self, mode: RegistryMode) -> Self {
        self.mode = mode;
        self
    }

    /// 旧式服务管理器中不注册任何服务。
    pub fn without_legacy_services(mut self) -> Self {
        self.legacy_missing = true;
        self
    }

    pub fn object(mut self, family: InterfaceFamily, object: RawBinder) -> Self {
        self.objects.insert(family, object);
        self
    }

    pub fn release(mut self, sdk_int: u32, security_patch: &str) -> Self {
        self.release = OsRelease::new(sdk_int, security_patch);
        self
    }

    pub fn refuse_identity(mut self) -> Self {
        self.refuse_identity = true;
        self
    }

    pub fn without_launcher(mut self) -> Self {
        self.with_launcher = false;
        self
    }

    pub fn build(self) -> Fixture {
        let journal = Arc::new(Journal::default());
        let mut objects = self.objects;
        for family in InterfaceFamily::ALL {
            objects
                .entry(family)
                .or_insert_with(|| ScriptedObject::inert(family) as RawBinder);
        }
        let legacy = if self.legacy_missing {
            HashMap::new()
        } else {
            objects
                .iter()
                .map(|(family, object)| (family.legacy_service_name().to_owned(), object.clone()))
                .collect()
        };
        let registry = Arc::new(FakeRegistry {
            mode: self.mode,
            objects,
            journal: journal.clone(),
        });
        let manager = Arc::new(FakeManager {
            objects: legacy,
            journal: journal.clone(),
        });
        let channel = Arc::new(CountingChannel::default());
        let launcher = Arc::new(RecordingLauncher {
            requests: Mutex::new(Vec::new()),
            outcome: Mutex::new(Some(Completion::applied("persistent"))),
            journal: journal.clone(),
        });
        let identity = Arc::new(RecordingIdentity {
            journal: journal.clone(),
            refuse_start: self.refuse_identity,
        });
        let mut builder = BridgeContext::builder(registry, manager, channel.clone())
            .release(self.release)
            .identity(identity)
            .caller_uid(2000);
        if self.with_launcher {
            builder = builder.launcher(launcher.clone());
        }
        Fixture {
            ctx: builder.build(),
            journal,
            channel,
            launcher,
        }
    }
}

/// 在内存中维护覆写的运营商配置加载器：认识最新的查找签名与带持久化标志的覆写签名。
pub fn memory_loader(defaults: telecfg_core::ConfigBundle) -> Arc<ScriptedObject> {
    use telecfg_core::remote::methods;

    let live: Mutex<HashMap<i32, telecfg_core::ConfigBundle>> = Mutex::new(HashMap::new());
    let descriptor = InterfaceFamily::CarrierConfigLoader.descriptor();
    ScriptedObject::new(descriptor, move |call| match (call.method, call.arity()) {
        (methods::GET_DEFAULT_CARRIER_SERVICE_PACKAGE_NAME, 0) => {
            Ok(Reply::Str(Some("com.android.carrierconfig".into())))
        }
        (methods::GET_CONFIG_FOR_SUB_ID_WITH_FEATURE, 3) => {
            let sub = call.args[0].as_int().unwrap_or(-1);
            let bundle = live
                .lock()
                .get(&sub)
                .cloned()
                .unwrap_or_else(|| defaults.clone());
            Ok(Reply::Bundle(Some(bundle)))
        }
        (methods::OVERRIDE_CONFIG, 3) => {
            let sub = call.args[0].as_int().unwrap_or(-1);
            let mut live = live.lock();
            match call.args[1].as_bundle().flatten() {
                Some(overrides) => live
                    .entry(sub)
                    .or_insert_with(|| defaults.clone())
                    .apply(overrides),
                None => {
                    live.remove(&sub);
                }
            }
            Ok(Reply::Unit)
        }
        (method, _) => Err(CallFailure::no_such_method(descriptor, method)),
    })
}

/// 认识单参数 `getSlotIndex` 的订阅注册表：订阅 `n` 位于卡槽 `n % 2`。
pub fn slot_registry() -> Arc<ScriptedObject> {
    use telecfg_core::remote::methods;

    let descriptor = InterfaceFamily::SubscriptionRegistry.descriptor();
    ScriptedObject::new(descriptor, move |call| match (call.method, call.arity()) {
        (methods::GET_SLOT_INDEX, 1) => Ok(Reply::Int(call.args[0].as_int().unwrap_or(0) % 2)),
        (method, _) => Err(CallFailure::no_such_method(descriptor, method)),
    })
}

/// 记录 `resetIms` 的电话控制服务。
pub fn telephony() -> Arc<ScriptedObject> {
    use telecfg_core::remote::methods;

    let descriptor = InterfaceFamily::TelephonyControl.descriptor();
    ScriptedObject::new(descriptor, move |call| match (call.method, call.arity()) {
        (methods::RESET_IMS, 1) => Ok(Reply::Unit),
        (method, _) => Err(CallFailure::no_such_method(descriptor, method)),
    })
}
