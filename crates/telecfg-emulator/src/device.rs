//! # device 模块说明
//!
//! ## 角色定位（Why）
//! - [`EmulatedDevice`] 代表“一个进程眼中的设备”：它实现服务注册表、服务管理器、特权通道与
//!   shell 身份四个边界，并把远端调用分派到共享的设备镜像上；
//! - 同一镜像可以被多个进程视图共享，[`EmulatedDevice::spawn_elevated_process`] 得到的视图
//!   对应以提升身份启动的二级进程。
//!
//! ## 权限策略（What）
//! - 未经特权通道包装的调用一律被拒绝；
//! - 版本画像要求 shell 身份时，`overrideConfig` 只接受持有 shell 身份的进程；
//! - 只有提升身份的进程视图能获取 shell 身份，且身份不跨视图共享。

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use telecfg_core::remote::methods;
use telecfg_core::{
    BridgeContext, BridgeContextBuilder, CallFailure, InterfaceFamily, OsRelease,
    PrivilegedChannel, RawBinder, RegistryError, RemoteCall, RemoteObject, Reply, ServiceManager,
    ServiceRegistry, ShellIdentity, SystemResources,
};
use tracing::debug;

use crate::image::{self, CallRecord, DeviceImage, EmulatorError, ImageStore};
use crate::profile::ReleaseProfile;

struct ProcessView {
    store: Arc<ImageStore>,
    elevated: bool,
    shell: Mutex<Option<u32>>,
}

/// 仿真设备的一个进程视图。克隆共享同一视图（包括 shell 身份）。
#[derive(Clone)]
pub struct EmulatedDevice {
    view: Arc<ProcessView>,
}

impl EmulatedDevice {
    fn from_store(store: Arc<ImageStore>, elevated: bool) -> Self {
        Self {
            view: Arc::new(ProcessView {
                store,
                elevated,
                shell: Mutex::new(None),
            }),
        }
    }

    /// 仅存在于内存中的设备。
    pub fn new(image: DeviceImage) -> Self {
        Self::from_store(Arc::new(ImageStore::memory(image)), false)
    }

    /// 写出镜像文件并打开它。
    pub fn create(path: &Path, image: &DeviceImage) -> Result<Self, EmulatorError> {
        image::write_file(path, image)?;
        Self::open(path)
    }

    /// 打开已有的镜像文件。
    pub fn open(path: &Path) -> Result<Self, EmulatorError> {
        image::read_file(path)?;
        Ok(Self::from_store(Arc::new(ImageStore::file(path)), false))
    }

    /// 同一设备上、以提升身份运行的另一个进程视图。
    pub fn spawn_elevated_process(&self) -> Self {
        Self::from_store(self.view.store.clone(), true)
    }

    /// 以进程视图的身份打开镜像文件。
    pub fn open_elevated(path: &Path) -> Result<Self, EmulatorError> {
        Ok(Self::open(path)?.spawn_elevated_process())
    }

    pub fn is_elevated(&self) -> bool {
        self.view.elevated
    }

    pub fn holds_shell_identity(&self) -> bool {
        self.view.shell.lock().is_some()
    }

    pub fn image(&self) -> Result<DeviceImage, EmulatorError> {
        self.view.store.read()
    }

    pub fn release(&self) -> Result<OsRelease, EmulatorError> {
        Ok(self.image()?.release)
    }

    /// 修改设备镜像，例如调整默认配置或系统版本。
    pub fn update<R>(&self, change: impl FnOnce(&mut DeviceImage) -> R) -> Result<R, EmulatorError> {
        self.view.store.update(change)
    }

    /// 重启服务进程：全部活动覆写丢失。
    pub fn restart_service(&self) -> Result<(), EmulatorError> {
        self.update(|image| image.overrides.clear())
    }

    /// 已接好全部服务边界的上下文构建器。
    pub fn context_builder(&self) -> Result<BridgeContextBuilder, EmulatorError> {
        let release = self.release()?;
        Ok(BridgeContext::builder(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
        .release(release)
        .identity(Arc::new(self.clone()))
        .resources(Arc::new(self.clone())))
    }

    fn binder(&self, family: InterfaceFamily, privileged: bool) -> RawBinder {
        Arc::new(ServiceBinder {
            family,
            device: self.clone(),
            privileged,
        })
    }

    fn dispatch(
        &self,
        family: InterfaceFamily,
        call: &RemoteCall,
        privileged: bool,
    ) -> Result<Reply, CallFailure> {
        let shell = self.holds_shell_identity();
        debug!(
            %family,
            method = call.method,
            arity = call.arity(),
            privileged,
            shell,
            "emulated transaction"
        );
        self.view
            .store
            .update(|image| {
                image.call_log.push(CallRecord {
                    family: family.to_string(),
                    method: call.method.to_owned(),
                    arity: call.arity(),
                    privileged,
                    shell,
                });
                if !privileged {
                    return Err(CallFailure::security_denied(
                        call.method,
                        "caller lacks READ_PRIVILEGED_PHONE_STATE",
                    ));
                }
                let profile = ReleaseProfile::for_release(&image.release);
                match family {
                    InterfaceFamily::CarrierConfigLoader => {
                        carrier_config(image, &profile, call, shell)
                    }
                    InterfaceFamily::SubscriptionRegistry => subscriptions(image, &profile, call),
                    InterfaceFamily::TelephonyControl => telephony(image, call),
                    InterfaceFamily::PhoneSubscriberInfo => {
                        Err(missing(InterfaceFamily::PhoneSubscriberInfo, call))
                    }
                }
            })
            .map_err(|err| CallFailure::remote(call.method, err.to_string()))?
    }
}

fn missing(family: InterfaceFamily, call: &RemoteCall) -> CallFailure {
    CallFailure::no_such_method(family.descriptor(), call.method)
}

fn int_arg(call: &RemoteCall, index: usize) -> Result<i32, CallFailure> {
    call.args
        .get(index)
        .and_then(telecfg_core::Arg::as_int)
        .ok_or_else(|| CallFailure::remote(call.method, format!("argument {index} must be an int")))
}

fn carrier_config(
    image: &mut DeviceImage,
    profile: &ReleaseProfile,
    call: &RemoteCall,
    shell: bool,
) -> Result<Reply, CallFailure> {
    let family = InterfaceFamily::CarrierConfigLoader;
    match call.method {
        methods::GET_DEFAULT_CARRIER_SERVICE_PACKAGE_NAME if call.arity() == 0 => {
            Ok(Reply::Str(Some("com.android.carrierconfig".to_owned())))
        }
        methods::GET_CONFIG_FOR_SUB_ID_WITH_FEATURE
            if profile.accepts_config_arity(call.arity(), true) =>
        {
            Ok(Reply::Bundle(Some(image.effective_config(int_arg(call, 0)?))))
        }
        methods::GET_CONFIG_FOR_SUB_ID if profile.accepts_config_arity(call.arity(), false) => {
            Ok(Reply::Bundle(Some(image.effective_config(int_arg(call, 0)?))))
        }
        methods::OVERRIDE_CONFIG if call.arity() == profile.override_arity() => {
            if profile.override_needs_shell && !shell {
                return Err(CallFailure::security_denied(
                    call.method,
                    "overrideConfig requires the shell identity on this security patch",
                ));
            }
            let subscription_id = int_arg(call, 0)?;
            match call.args.get(1).and_then(telecfg_core::Arg::as_bundle) {
                Some(Some(overrides)) => image
                    .overrides
                    .entry(subscription_id)
                    .or_default()
                    .apply(overrides),
                Some(None) => {
                    image.overrides.remove(&subscription_id);
                }
                None => {
                    return Err(CallFailure::remote(
                        call.method,
                        "argument 1 must be a bundle",
                    ));
                }
            }
            Ok(Reply::Unit)
        }
        _ => Err(missing(family, call)),
    }
}

fn subscriptions(
    image: &mut DeviceImage,
    profile: &ReleaseProfile,
    call: &RemoteCall,
) -> Result<Reply, CallFailure> {
    let family = InterfaceFamily::SubscriptionRegistry;
    match call.method {
        methods::GET_ACTIVE_SUBSCRIPTION_INFO_LIST if call.arity() == profile.active_list_arity() => {
            Ok(Reply::Subscriptions(image.subscriptions.clone()))
        }
        methods::GET_ACTIVE_SUBSCRIPTION_INFO_FOR_SIM_SLOT_INDEX
            if call.arity() == profile.slot_lookup_arity() =>
        {
            let slot_index = int_arg(call, 0)?;
            Ok(Reply::Subscription(
                image.subscription_in_slot(slot_index).cloned(),
            ))
        }
        methods::GET_SLOT_INDEX if call.arity() == 1 => {
            let subscription_id = int_arg(call, 0)?;
            Ok(Reply::Int(
                image
                    .subscription(subscription_id)
                    .map_or(-1, |info| info.slot_index),
            ))
        }
        methods::GET_DEFAULT_SUB_ID if call.arity() == 0 => {
            Ok(Reply::Int(image.default_subscription_id))
        }
        _ => Err(missing(family, call)),
    }
}

fn telephony(image: &mut DeviceImage, call: &RemoteCall) -> Result<Reply, CallFailure> {
    let family = InterfaceFamily::TelephonyControl;
    match call.method {
        methods::RESET_IMS if call.arity() == 1 => {
            image.ims_resets.push(int_arg(call, 0)?);
            Ok(Reply::Unit)
        }
        methods::GET_SUBSCRIPTION_CARRIER_NAME if call.arity() == 1 => {
            let subscription_id = int_arg(call, 0)?;
            Ok(Reply::Str(
                image
                    .subscription(subscription_id)
                    .map(|info| info.carrier_name.clone()),
            ))
        }
        methods::IS_IMS_REGISTERED if call.arity() == 1 => {
            let subscription_id = int_arg(call, 0)?;
            Ok(Reply::Bool(
                image
                    .ims_registered
                    .get(&subscription_id)
                    .copied()
                    .unwrap_or(false),
            ))
        }
        _ => Err(missing(family, call)),
    }
}

struct ServiceBinder {
    family: InterfaceFamily,
    device: EmulatedDevice,
    privileged: bool,
}

impl RemoteObject for ServiceBinder {
    fn descriptor(&self) -> &str {
        self.family.descriptor()
    }

    fn transact(&self, call: &RemoteCall) -> Result<Reply, CallFailure> {
        self.device.dispatch(self.family, call, self.privileged)
    }
}

impl ServiceRegistry for EmulatedDevice {
    fn lookup(&self, family: InterfaceFamily) -> Result<RawBinder, RegistryError> {
        let image = self
            .image()
            .map_err(|err| RegistryError::failed(err.to_string()))?;
        if !ReleaseProfile::for_release(&image.release).has_registry {
            return Err(RegistryError::unavailable(
                "android.telephony.TelephonyFrameworkInitializer",
            ));
        }
        Ok(self.binder(family, false))
    }
}

impl ServiceManager for EmulatedDevice {
    fn get_service(&self, name: &str) -> Option<RawBinder> {
        InterfaceFamily::ALL
            .into_iter()
            .find(|family| family.legacy_service_name() == name)
            .map(|family| self.binder(family, false))
    }
}

impl PrivilegedChannel for EmulatedDevice {
    fn wrap(&self, binder: RawBinder) -> RawBinder {
        let family = InterfaceFamily::ALL
            .into_iter()
            .find(|family| family.descriptor() == binder.descriptor());
        match family {
            Some(family) => self.binder(family, true),
            None => binder,
        }
    }
}

impl ShellIdentity for EmulatedDevice {
    fn start_delegate_shell_permission_identity(&self, uid: u32) -> Result<(), CallFailure> {
        if !self.view.elevated {
            return Err(CallFailure::security_denied(
                "startDelegateShellPermissionIdentity",
                "process is not running with an elevated identity",
            ));
        }
        *self.view.shell.lock() = Some(uid);
        Ok(())
    }

    fn stop_delegate_shell_permission_identity(&self) -> Result<(), CallFailure> {
        *self.view.shell.lock() = None;
        Ok(())
    }
}

impl SystemResources for EmulatedDevice {
    fn system_bool(&self, name: &str) -> Option<bool> {
        match self.image() {
            Ok(image) => image.system_bools.get(name).copied(),
            Err(err) => {
                debug!(resource = name, error = %err, "device image unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(sdk_int: u32, patch: &str) -> EmulatedDevice {
        EmulatedDevice::new(DeviceImage::sample(OsRelease::new(sdk_int, patch)))
    }

    #[test]
    fn unwrapped_binders_are_refused() {
        let device = device(34, "2024-01-01");
        let raw = device.lookup(InterfaceFamily::SubscriptionRegistry).unwrap();
        let err = raw
            .transact(&RemoteCall::new(methods::GET_DEFAULT_SUB_ID))
            .unwrap_err();
        assert!(matches!(err, CallFailure::SecurityDenied { .. }));

        let wrapped = device.wrap(raw);
        assert_eq!(
            wrapped.transact(&RemoteCall::new(methods::GET_DEFAULT_SUB_ID)),
            Ok(Reply::Int(1))
        );
    }

    #[test]
    fn old_releases_have_no_registry() {
        let device = device(29, "2021-05-01");
        assert!(matches!(
            device.lookup(InterfaceFamily::CarrierConfigLoader),
            Err(RegistryError::Unavailable { .. })
        ));
        assert!(device.get_service("carrier_config").is_some());
        assert!(device.get_service("unknown").is_none());
    }

    #[test]
    fn only_elevated_views_assume_shell_identity() {
        let caller = device(34, "2025-10-01");
        assert!(caller.start_delegate_shell_permission_identity(2000).is_err());

        let broker = caller.spawn_elevated_process();
        broker.start_delegate_shell_permission_identity(2000).unwrap();
        assert!(broker.holds_shell_identity());
        assert!(!caller.holds_shell_identity());
        broker.stop_delegate_shell_permission_identity().unwrap();
        assert!(!broker.holds_shell_identity());
    }

    #[test]
    fn system_bools_come_from_the_image() {
        let device = device(34, "2024-01-01");
        assert_eq!(
            device.system_bool(telecfg_core::DEVICE_VOLTE_AVAILABLE),
            Some(true)
        );
        assert_eq!(device.system_bool("config_unknown_resource"), None);
    }
}
