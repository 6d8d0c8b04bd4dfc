use super::*;

// =============================================================================
// env_parse: unique env var names per test.
// =============================================================================

#[test]
fn env_parse_reads_value() {
    let key = "__TEST_SG_PARSE_OK_311__";
    unsafe { std::env::set_var(key, "250") };
    assert_eq!(env_parse(key, 10_u64), 250);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_trims_whitespace() {
    let key = "__TEST_SG_PARSE_WS_312__";
    unsafe { std::env::set_var(key, "  42 ") };
    assert_eq!(env_parse(key, 10_u64), 42);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_invalid_falls_back() {
    let key = "__TEST_SG_PARSE_BAD_313__";
    unsafe { std::env::set_var(key, "soon") };
    assert_eq!(env_parse(key, 10_u64), 10);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_unset_falls_back() {
    assert_eq!(env_parse("__TEST_SG_SURELY_UNSET_314__", 7_u64), 7);
}

// =============================================================================
// env_path
// =============================================================================

#[test]
fn env_path_accepts_absolute_path() {
    let key = "__TEST_SG_PATH_OK_321__";
    unsafe { std::env::set_var(key, "/home") };
    assert_eq!(env_path(key, "/dashboard"), "/home");
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_path_rejects_relative_and_protocol_relative() {
    for (i, val) in ["home", "//evil.example", "https://evil.example/x", ""].iter().enumerate() {
        let key = format!("__TEST_SG_PATH_BAD_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_path(&key, "/dashboard"), "/dashboard", "expected fallback for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

// =============================================================================
// SyncConfig
// =============================================================================

#[test]
fn default_config_values() {
    let cfg = SyncConfig::default();
    assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    assert_eq!(cfg.sign_out_timeout, Duration::from_secs(5));
    assert_eq!(cfg.post_login_path, "/dashboard");
    assert_eq!(cfg.error_path, "/auth");
}

#[test]
fn builder_overrides_apply() {
    let cfg = SyncConfig::default()
        .with_request_timeout(Duration::from_millis(50))
        .with_sign_out_timeout(Duration::from_millis(20))
        .with_post_login_path("/admin");
    assert_eq!(cfg.request_timeout, Duration::from_millis(50));
    assert_eq!(cfg.sign_out_timeout, Duration::from_millis(20));
    assert_eq!(cfg.post_login_path, "/admin");
}
