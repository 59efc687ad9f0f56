//! 委托请求的启动参数编解码。

use proptest::prelude::*;
use telecfg_core::{ArgumentBag, ConfigValue, DelegatedRequest, OverrideSet, RequestCodecError};

fn config_value() -> impl Strategy<Value = ConfigValue> {
    prop_oneof![
        any::<bool>().prop_map(ConfigValue::Bool),
        any::<i32>().prop_map(ConfigValue::Int),
        any::<i64>().prop_map(ConfigValue::Long),
        ".*".prop_map(ConfigValue::String),
        prop::collection::vec(any::<bool>(), 0..4).prop_map(ConfigValue::BoolArray),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(ConfigValue::IntArray),
        prop::collection::vec(any::<i64>(), 0..4).prop_map(ConfigValue::LongArray),
        prop::collection::vec(".*", 0..4).prop_map(ConfigValue::StringArray),
    ]
}

fn request() -> impl Strategy<Value = DelegatedRequest> {
    let overrides = prop::option::of(prop::collection::btree_map(
        "[a-z][a-z0-9_.]{0,24}",
        config_value(),
        0..6,
    ));
    (any::<i32>(), overrides).prop_map(|(subscription_id, overrides)| {
        DelegatedRequest::new(
            subscription_id,
            overrides.map(|entries| entries.into_iter().collect::<OverrideSet>()),
        )
    })
}

proptest! {
    #[test]
    fn launch_arguments_decode_to_the_same_request(request in request()) {
        let decoded = DelegatedRequest::from_command_args(request.to_command_args());
        prop_assert_eq!(decoded, Ok(Some(request)));
    }
}

#[test]
fn empty_override_set_is_not_a_clear() {
    let request = DelegatedRequest::new(9, Some(OverrideSet::new()));
    let decoded = DelegatedRequest::from_command_args(request.to_command_args())
        .unwrap()
        .unwrap();
    assert!(!decoded.is_clear());
    assert_eq!(decoded.overrides, Some(OverrideSet::new()));
}

#[test]
fn array_values_use_json_lists() {
    let request = DelegatedRequest::new(
        1,
        Some(
            OverrideSet::new()
                .with("carrier_nr_availabilities_int_array", vec![1, 2])
                .with("carrier_wfc_ims_names_string_array", vec!["a,b".to_owned()]),
        ),
    );
    let bag = request.to_bag();
    assert_eq!(
        bag.get("cfg:carrier_nr_availabilities_int_array"),
        Some("int[]:[1,2]")
    );
    assert_eq!(
        bag.get("cfg:carrier_wfc_ims_names_string_array"),
        Some(r#"string[]:["a,b"]"#)
    );
}

#[test]
fn missing_and_invalid_header_entries_are_rejected() {
    let err = DelegatedRequest::from_command_args(["-e", "telecfg.clear", "false"]).unwrap_err();
    assert_eq!(
        err,
        RequestCodecError::MissingEntry {
            name: "telecfg.sub_id"
        }
    );

    let err = DelegatedRequest::from_command_args([
        "-e",
        "telecfg.clear",
        "false",
        "-e",
        "telecfg.sub_id",
        "five",
    ])
    .unwrap_err();
    assert!(matches!(err, RequestCodecError::InvalidEntry { .. }));
}

#[test]
fn stray_tokens_and_foreign_entries_are_rejected() {
    assert_eq!(
        ArgumentBag::from_command_args(["--sub", "5"]),
        Err(RequestCodecError::UnexpectedToken {
            token: "--sub".into()
        })
    );
    assert_eq!(
        ArgumentBag::from_command_args(["-e", "telecfg.clear"]),
        Err(RequestCodecError::Truncated)
    );

    let mut bag = DelegatedRequest::new(1, None).to_bag();
    bag.insert("sub_id", "1");
    assert!(matches!(
        DelegatedRequest::from_bag(&bag),
        Err(RequestCodecError::UnknownEntry { .. })
    ));
}

#[test]
fn repeated_entries_are_rejected() {
    let err = ArgumentBag::from_command_args([
        "-e",
        "telecfg.clear",
        "false",
        "-e",
        "telecfg.sub_id",
        "2",
        "-e",
        "cfg:vonr_enabled_bool",
        "bool:true",
        "-e",
        "cfg:vonr_enabled_bool",
        "bool:false",
    ])
    .unwrap_err();
    assert_eq!(
        err,
        RequestCodecError::DuplicateEntry {
            name: "cfg:vonr_enabled_bool".into()
        }
    );

    let err = DelegatedRequest::from_command_args([
        "-e", "telecfg.sub_id", "2", "-e", "telecfg.sub_id", "3",
    ])
    .unwrap_err();
    assert!(matches!(err, RequestCodecError::DuplicateEntry { name } if name == "telecfg.sub_id"));
}
