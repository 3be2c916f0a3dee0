//! shipgate-attest 통합 테스트
//!
//! 외부 바이너리를 요구하는 경로 대신 결정적 경로만 검증합니다.
//! 설정 검증, fail-open/fail-closed 분기, attestation 파싱이
//! 대상입니다.

use serial_test::serial;
use tokio_util::sync::CancellationToken;

use shipgate_attest::{AttestError, CosignSigner, SbomManager, fail_open};
use shipgate_core::config::{SbomConfig, SigningConfig};
use shipgate_core::types::{Outcome, Sbom, SbomFormat};

fn key_config() -> SigningConfig {
    SigningConfig {
        enabled: true,
        keyless: false,
        private_key: "/keys/cosign.key".to_owned(),
        public_key: "/keys/cosign.pub".to_owned(),
        ..SigningConfig::default()
    }
}

#[test]
fn empty_private_key_fails_before_any_spawn() {
    let mut config = key_config();
    config.private_key = String::new();
    let err = CosignSigner::new(config).unwrap_err();
    assert!(matches!(err, AttestError::Config { ref field, .. } if field == "signing.private_key"));
}

#[test]
#[serial]
fn keyless_without_ambient_token_is_config_error() {
    unsafe {
        std::env::remove_var("SIGSTORE_ID_TOKEN");
        std::env::remove_var("ACTIONS_ID_TOKEN_REQUEST_URL");
        std::env::remove_var("ACTIONS_ID_TOKEN_REQUEST_TOKEN");
    }
    let config = SigningConfig {
        enabled: true,
        keyless: true,
        oidc_issuer: "https://token.actions.githubusercontent.com".to_owned(),
        identity_regexp: "^https://github.com/acme/.*$".to_owned(),
        ..SigningConfig::default()
    };
    let err = CosignSigner::new(config).unwrap_err();
    assert!(matches!(err, AttestError::MissingOidcToken));
    assert!(err.is_config_error());
}

#[tokio::test]
async fn verify_with_missing_public_key_is_config_error() {
    let mut config = key_config();
    config.public_key = String::new();
    // 개인키만으로 생성은 가능하지만 검증 시점에 공개키가 없으면 에러
    let signer = CosignSigner::new(config).unwrap();
    let err = signer
        .verify("example.com/app:1.0", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AttestError::Config { ref field, .. } if field == "signing.public_key"));
}

#[test]
fn fail_open_skips_only_non_config_errors_when_not_required() {
    let tool_err = AttestError::SignFailed {
        image: "img".to_owned(),
        reason: "exit code 1".to_owned(),
    };
    let outcome: Outcome<()> = fail_open(false, "sign", tool_err).unwrap();
    match outcome {
        Outcome::Skipped { reason } => assert!(reason.contains("exit code 1")),
        Outcome::Completed(()) => panic!("expected skip"),
    }

    let tool_err = AttestError::SignFailed {
        image: "img".to_owned(),
        reason: "exit code 1".to_owned(),
    };
    assert!(fail_open::<()>(true, "sign", tool_err).is_err());

    let config_err = AttestError::Config {
        field: "signing.oidc_issuer".to_owned(),
        reason: "must not be empty".to_owned(),
    };
    assert!(fail_open::<()>(false, "sign", config_err).is_err());
}

#[tokio::test]
async fn disabled_signing_always_skips() {
    let signer = CosignSigner::new(SigningConfig::default()).unwrap();
    let cancel = CancellationToken::new();
    assert!(signer.sign("img", &cancel).await.unwrap().is_skipped());
    assert!(signer.verify("img", &cancel).await.unwrap().is_skipped());
}

#[test]
fn sbom_digest_is_stable_for_identical_content() {
    let content = br#"{"bomFormat": "CycloneDX", "components": []}"#.to_vec();
    let a = Sbom::new(
        SbomFormat::CycloneDxJson,
        content.clone(),
        "img",
        "syft",
        "0.98.0",
        0,
    );
    let b = Sbom::new(SbomFormat::CycloneDxJson, content, "img", "syft", "0.98.0", 0);
    assert_eq!(a.digest, b.digest);
    assert!(a.digest.starts_with("sha256:"));
}

#[test]
fn sbom_manager_exposes_config() {
    let signer = CosignSigner::new(key_config()).unwrap();
    let config = SbomConfig {
        enabled: true,
        format: "spdx-json".to_owned(),
        attach: true,
        ..SbomConfig::default()
    };
    let manager = SbomManager::new(config, signer);
    assert!(manager.config().attach);
    assert_eq!(
        SbomFormat::from_str_loose(&manager.config().format),
        Some(SbomFormat::SpdxJson)
    );
}
