//! 服务接口解析顺序：现代注册表优先，旧式按名查找只在注册表缺失时启用。

mod support;

use telecfg_core::{BridgeError, ErrorCategory, InterfaceFamily};

use support::{FixtureBuilder, RegistryMode};

#[test]
fn modern_registry_is_tried_first_and_legacy_is_skipped() {
    for family in InterfaceFamily::ALL {
        let fx = FixtureBuilder::new().registry(RegistryMode::Serves).build();
        let handle = fx.ctx.resolve(family).unwrap();
        assert_eq!(handle.family(), family);
        assert_eq!(fx.journal.entries(), [format!("registry:{family}")]);
    }
}

#[test]
fn legacy_lookup_runs_only_when_registry_is_unavailable() {
    for family in InterfaceFamily::ALL {
        let fx = FixtureBuilder::new()
            .registry(RegistryMode::Unavailable)
            .build();
        fx.ctx.resolve(family).unwrap();
        assert_eq!(
            fx.journal.entries(),
            [
                format!("registry:{family}"),
                format!("manager:{}", family.legacy_service_name()),
            ]
        );
    }
}

#[test]
fn other_registry_failures_do_not_consult_legacy_lookup() {
    let fx = FixtureBuilder::new().registry(RegistryMode::Broken).build();
    let err = fx.ctx.resolve(InterfaceFamily::TelephonyControl).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Resolution);
    assert_eq!(fx.journal.entries(), ["registry:telephony"]);
}

#[test]
fn empty_legacy_lookup_is_a_resolution_failure() {
    let fx = FixtureBuilder::new()
        .registry(RegistryMode::Unavailable)
        .without_legacy_services()
        .build();
    let err = fx.ctx.resolve(InterfaceFamily::SubscriptionRegistry).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ServiceUnavailable {
            family: InterfaceFamily::SubscriptionRegistry,
            ..
        }
    ));
    assert_eq!(err.code(), "telecfg.resolve.unavailable");
}

#[test]
fn handles_are_wrapped_once_and_cached_per_family() {
    let fx = FixtureBuilder::new().build();
    let first = fx.ctx.resolve(InterfaceFamily::CarrierConfigLoader).unwrap();
    let second = fx.ctx.resolve(InterfaceFamily::CarrierConfigLoader).unwrap();
    assert!(first.same_object(&second));
    assert_eq!(fx.channel.wraps(), 1);
    assert_eq!(fx.journal.entries().len(), 1);

    fx.ctx.resolve(InterfaceFamily::TelephonyControl).unwrap();
    assert_eq!(fx.channel.wraps(), 2);
    assert_eq!(fx.ctx.cache().len(), 2);
}

#[test]
fn failed_resolution_is_not_cached() {
    let fx = FixtureBuilder::new().registry(RegistryMode::Broken).build();
    assert!(fx.ctx.resolve(InterfaceFamily::PhoneSubscriberInfo).is_err());
    assert!(fx.ctx.resolve(InterfaceFamily::PhoneSubscriberInfo).is_err());
    assert_eq!(fx.journal.entries().len(), 2);
    assert!(fx.ctx.cache().is_empty());
}

#[test]
fn caches_are_owned_by_their_context() {
    let a = FixtureBuilder::new().build();
    let b = FixtureBuilder::new().build();
    a.ctx.resolve(InterfaceFamily::CarrierConfigLoader).unwrap();
    assert!(a.ctx.cache().contains(InterfaceFamily::CarrierConfigLoader));
    assert!(!b.ctx.cache().contains(InterfaceFamily::CarrierConfigLoader));
}
