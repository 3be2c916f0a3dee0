//! Integration tests for SecurityConfig loading.
//!
//! File loading, env overrides and validation working together.

use serial_test::serial;
use shipgate_core::config::SecurityConfig;

const FULL_CONFIG: &str = r#"
[scan]
enabled = true
tools = ["grype", "trivy"]
fail_on = "high"
warn_on = "medium"
required = true
timeout_secs = 600

[scan.output]
local = "reports/scan.json"
registry = true

[scan.cache]
enabled = true
ttl_secs = 1800

[signing]
enabled = true
keyless = true
oidc_issuer = "https://token.actions.githubusercontent.com"
identity_regexp = "https://github.com/acme/.+"
timeout_secs = 120
required = true

[sbom]
enabled = true
format = "cyclonedx-json"
attach = true
timeout_secs = 300
"#;

#[tokio::test]
async fn load_full_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shipgate.toml");
    tokio::fs::write(&path, FULL_CONFIG).await.unwrap();

    let config = SecurityConfig::load(path.to_str().unwrap()).await.unwrap();
    config.validate().unwrap();

    assert!(config.scan.enabled);
    assert_eq!(config.scan.tools, vec!["grype", "trivy"]);
    assert_eq!(config.scan.fail_on, "high");
    assert_eq!(config.scan.output.local, "reports/scan.json");
    assert!(config.scan.cache.enabled);
    assert_eq!(config.scan.cache.ttl_secs, 1800);
    assert!(config.signing.keyless);
    assert!(config.signing.required);
    assert!(config.sbom.attach);
}

#[tokio::test]
async fn load_missing_file_is_error() {
    let err = SecurityConfig::load("/nonexistent/shipgate.toml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
#[serial]
fn env_overrides_take_precedence() {
    unsafe {
        std::env::set_var("SHIPGATE_SCAN_ENABLED", "true");
        std::env::set_var("SHIPGATE_SCAN_TOOLS", "trivy");
        std::env::set_var("SHIPGATE_SCAN_FAIL_ON", "critical");
    }

    let mut config = SecurityConfig::parse(FULL_CONFIG).unwrap();
    config.apply_env_overrides();

    unsafe {
        std::env::remove_var("SHIPGATE_SCAN_ENABLED");
        std::env::remove_var("SHIPGATE_SCAN_TOOLS");
        std::env::remove_var("SHIPGATE_SCAN_FAIL_ON");
    }

    assert_eq!(config.scan.tools, vec!["trivy"]);
    assert_eq!(config.scan.fail_on, "critical");
}

#[test]
#[serial]
fn env_override_ignores_invalid_bool() {
    unsafe {
        std::env::set_var("SHIPGATE_SIGNING_ENABLED", "maybe");
    }

    let mut config = SecurityConfig::parse(FULL_CONFIG).unwrap();
    config.apply_env_overrides();

    unsafe {
        std::env::remove_var("SHIPGATE_SIGNING_ENABLED");
    }

    // 파싱 불가 값은 무시되고 파일 값이 유지됨
    assert!(config.signing.enabled);
}
