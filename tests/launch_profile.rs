//! Integration tests for the launch profile codec and the full
//! encrypt → encode → transmit → decode → decrypt path.

use proptest::prelude::*;
use serde_json::json;
use session_launch::profile::limits::MAX_WIRE_LIMIT;
use session_launch::profile::transport::{read_profile, write_profile};
use session_launch::{
    decrypt_profile_password, encrypt_profile_password, DecodePolicy, LaunchError,
    ProcessConfig, ResourceLimits, SessionContext, SessionLaunchProfile, SessionScope,
    StdStreamBehavior,
};

fn scenario_profile() -> SessionLaunchProfile {
    SessionLaunchProfile {
        context: SessionContext::new("alice", SessionScope::from_project_id("~/analysis", "3f2a91")),
        password: "s3cr3t".into(),
        encryption_key: String::new(),
        executable_path: "/usr/lib/session/rsession".into(),
        config: ProcessConfig {
            args: vec!["--flag".into()],
            environment: [("HOME".to_string(), "/home/alice".to_string())].into(),
            std_input: String::new(),
            std_stream_behavior: StdStreamBehavior::Inherit,
            limits: ResourceLimits {
                memory_limit_bytes: Some(2_000_000_000),
                cpu_affinity: vec![true, false, true],
                ..Default::default()
            },
        },
    }
}

#[test]
fn test_end_to_end_launch_scenario() {
    let original = scenario_profile();
    let mut outgoing = original.clone();

    let encrypted_password = encrypt_profile_password(&mut outgoing).unwrap();
    assert!(outgoing.password.is_empty());

    // The profile travels on one channel...
    let mut wire = Vec::new();
    write_profile(&mut wire, &outgoing).unwrap();
    let text = String::from_utf8(wire.clone()).unwrap();
    assert!(!text.contains("s3cr3t"));
    assert!(!text.contains(&encrypted_password));

    // ...and the ciphertext on another.
    let mut incoming = read_profile(wire.as_slice(), DecodePolicy::Strict).unwrap();
    decrypt_profile_password(&mut incoming, &encrypted_password).unwrap();

    assert_eq!(incoming, original);
}

#[test]
fn test_plaintext_profile_never_reaches_transport() {
    let mut wire = Vec::new();
    let err = write_profile(&mut wire, &scenario_profile()).unwrap_err();
    assert!(matches!(err, LaunchError::PlaintextPassword));
    assert!(wire.is_empty());
}

#[test]
fn test_decodes_generic_numbers_from_other_senders() {
    let value = json!({
        "context": {"username": "bob", "project": "p", "id": "i"},
        "password": "",
        "encryptionKey": "a|b",
        "executablePath": "/bin/true",
        "config": {
            "args": [],
            "environment": {},
            "stdInput": "",
            "stdStreamBehavior": 2,
            "priority": 5,
            "memoryLimitBytes": 1.0e9,
            "stackLimitBytes": 0,
            "userProcessesLimit": 0,
            "cpuLimit": 60.0,
            "niceLimit": 0,
            "filesLimit": 0,
            "cpuAffinity": []
        }
    });
    let profile = SessionLaunchProfile::from_json_with_policy(&value, DecodePolicy::Strict).unwrap();
    assert_eq!(profile.config.limits.memory_limit_bytes, Some(1_000_000_000));
    assert_eq!(profile.config.limits.cpu_limit, Some(60));
    assert_eq!(profile.config.limits.stack_limit_bytes, None);
    assert_eq!(profile.config.std_stream_behavior, StdStreamBehavior::Null);
    assert_eq!(profile.config.limits.priority, 5);
}

#[test]
fn test_mixed_affinity_degrades_only_affinity() {
    let mut value = scenario_profile().to_json();
    value["config"]["cpuAffinity"] = json!([true, 1, false]);

    let profile = SessionLaunchProfile::from_json(&value);
    assert!(profile.config.limits.cpu_affinity.is_empty());
    assert_eq!(profile.config.limits.memory_limit_bytes, Some(2_000_000_000));
    assert_eq!(profile.context.username, "alice");
}

#[test]
fn test_unrepresentable_limit_encodes_zero() {
    let mut profile = scenario_profile();
    profile.config.limits.files_limit = Some(u64::MAX);
    let value = profile.to_json();
    assert_eq!(value["config"]["filesLimit"], json!(0));
}

#[test]
fn test_zero_limit_round_trips_as_unset() {
    let mut profile = scenario_profile();
    profile.password.clear();
    profile.config.limits.files_limit = Some(0);

    let decoded =
        SessionLaunchProfile::from_json_with_policy(&profile.to_json(), DecodePolicy::Strict)
            .unwrap();
    assert_eq!(decoded.config.limits.files_limit, None);
    assert_eq!(decoded.config.limits, profile.config.limits.wire_normalized());
}

fn arb_limit() -> impl Strategy<Value = Option<u64>> {
    prop::option::of(prop_oneof![
        Just(0u64),
        1u64..=MAX_WIRE_LIMIT,
        (MAX_WIRE_LIMIT + 1)..=u64::MAX,
    ])
}

fn arb_behavior() -> impl Strategy<Value = StdStreamBehavior> {
    prop_oneof![
        Just(StdStreamBehavior::Inherit),
        Just(StdStreamBehavior::Capture),
        Just(StdStreamBehavior::Null),
    ]
}

prop_compose! {
    fn arb_limits()(
        priority in any::<i32>(),
        memory in arb_limit(),
        stack in arb_limit(),
        processes in arb_limit(),
        cpu in arb_limit(),
        nice in arb_limit(),
        files in arb_limit(),
        affinity in prop::collection::vec(any::<bool>(), 0..32),
    ) -> ResourceLimits {
        ResourceLimits {
            priority,
            memory_limit_bytes: memory,
            stack_limit_bytes: stack,
            user_processes_limit: processes,
            cpu_limit: cpu,
            nice_limit: nice,
            files_limit: files,
            cpu_affinity: affinity,
        }
    }
}

prop_compose! {
    fn arb_profile()(
        username in "[a-z]{1,12}",
        project in ".{0,16}",
        id in "[0-9a-f]{0,8}",
        encryption_key in "[A-Za-z0-9+/=|]{0,40}",
        executable_path in "/[a-z/]{1,24}",
        args in prop::collection::vec(".{0,12}", 0..6),
        environment in prop::collection::btree_map("[A-Z_]{1,8}", ".{0,12}", 0..6),
        std_input in ".{0,32}",
        std_stream_behavior in arb_behavior(),
        limits in arb_limits(),
    ) -> SessionLaunchProfile {
        SessionLaunchProfile {
            context: SessionContext::new(username, SessionScope::from_project_id(project, id)),
            password: String::new(),
            encryption_key,
            executable_path,
            config: ProcessConfig {
                args,
                environment,
                std_input,
                std_stream_behavior,
                limits,
            },
        }
    }
}

proptest! {
    #[test]
    fn profile_survives_wire_round_trip(profile in arb_profile()) {
        let text = serde_json::to_string(&profile.to_json()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let decoded = SessionLaunchProfile::from_json_with_policy(&value, DecodePolicy::Strict).unwrap();
        prop_assert_eq!(&decoded.config.limits, &profile.config.limits.wire_normalized());
        let mut expected = profile;
        expected.config.limits = expected.config.limits.wire_normalized();
        prop_assert_eq!(decoded, expected);
    }
}
