//! 설정 관리 — shipgate.toml 파싱 및 검증
//!
//! [`SecurityConfig`]는 스캔/서명/SBOM 모듈의 설정을 담는 최상위
//! 구조체입니다. 설정 로딩 우선순위:
//!
//! 1. 환경변수 (`SHIPGATE_SCAN_ENABLED=true` 형식)
//! 2. 설정 파일 (`shipgate.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! 모든 검증은 외부 도구 호출 이전에 수행되며, 설정 에러는 치명적이고
//! 재시도되지 않습니다.
//!
//! # 사용 예시
//! ```
//! use shipgate_core::config::SecurityConfig;
//!
//! let config = SecurityConfig::parse("[scan]\nenabled = true\ntools = [\"grype\"]").unwrap();
//! config.validate().unwrap();
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ShipgateError};
use crate::types::{SbomFormat, Severity};

/// 보안 파이프라인 최상위 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// 취약점 스캔 설정
    #[serde(default)]
    pub scan: ScanConfig,
    /// 이미지 서명 설정
    #[serde(default)]
    pub signing: SigningConfig,
    /// SBOM 생성/첨부 설정
    #[serde(default)]
    pub sbom: SbomConfig,
}

/// 취약점 스캔 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 스캔 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// 실행할 스캐너 목록 (순서 유지, 예: ["grype", "trivy"])
    #[serde(default = "default_scan_tools")]
    pub tools: Vec<String>,
    /// 배포 차단 심각도 하한 (빈 문자열 = 차단 없음)
    #[serde(default)]
    pub fail_on: String,
    /// 경고 로그 심각도 하한 (빈 문자열 = 경고 없음)
    #[serde(default)]
    pub warn_on: String,
    /// 스캐너 부재가 치명적인지 여부
    #[serde(default = "default_true")]
    pub required: bool,
    /// 스캐너 호출 타임아웃 (초)
    #[serde(default = "default_scan_timeout_secs")]
    pub timeout_secs: u64,
    /// 결과 출력 라우팅
    #[serde(default)]
    pub output: OutputConfig,
    /// 결과 캐시 설정 (캐싱 자체는 호출 계층이 수행)
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tools: default_scan_tools(),
            fail_on: String::new(),
            warn_on: String::new(),
            required: true,
            timeout_secs: default_scan_timeout_secs(),
            output: OutputConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// 스캔 결과 출력 라우팅
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 로컬 출력 경로 (빈 문자열 = 로컬 출력 없음)
    #[serde(default)]
    pub local: String,
    /// 레지스트리 업로드 여부
    #[serde(default)]
    pub registry: bool,
}

/// 스캔 결과 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 캐시 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// 캐시 TTL (초)
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// 이미지 서명 설정
///
/// `keyless`가 true면 OIDC identity + 투명성 로그 신뢰 모델,
/// false면 개인키/공개키 쌍 신뢰 모델을 사용합니다. 두 모드는
/// 상호 배타적입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// 서명 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// keyless (OIDC) 신뢰 모델 선택
    #[serde(default = "default_true")]
    pub keyless: bool,
    /// OIDC 발급자 URL (keyless 모드)
    #[serde(default)]
    pub oidc_issuer: String,
    /// 인증서 identity 정규식 (keyless 모드)
    #[serde(default)]
    pub identity_regexp: String,
    /// 개인키 — 파일 경로 또는 원본 PEM 내용 (key 모드)
    #[serde(default)]
    pub private_key: String,
    /// 공개키 — 파일 경로 또는 원본 PEM 내용 (key 모드 검증)
    #[serde(default)]
    pub public_key: String,
    /// 개인키 복호화 비밀번호 (선택)
    #[serde(default)]
    pub password: String,
    /// 서명/검증 타임아웃 (초)
    #[serde(default = "default_signing_timeout_secs")]
    pub timeout_secs: u64,
    /// fail-open(false) / fail-closed(true) 선택
    #[serde(default)]
    pub required: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keyless: true,
            oidc_issuer: String::new(),
            identity_regexp: String::new(),
            private_key: String::new(),
            public_key: String::new(),
            password: String::new(),
            timeout_secs: default_signing_timeout_secs(),
            required: false,
        }
    }
}

/// SBOM 생성/첨부 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbomConfig {
    /// SBOM 생성 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// SBOM 출력 형식 (cyclonedx-json, spdx-json 등)
    #[serde(default = "default_sbom_format")]
    pub format: String,
    /// 서명된 증명으로 첨부할지 여부
    #[serde(default)]
    pub attach: bool,
    /// 생성/첨부 타임아웃 (초)
    #[serde(default = "default_sbom_timeout_secs")]
    pub timeout_secs: u64,
    /// fail-open(false) / fail-closed(true) 선택 (첨부 경로에 적용)
    #[serde(default)]
    pub required: bool,
}

impl Default for SbomConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: default_sbom_format(),
            attach: false,
            timeout_secs: default_sbom_timeout_secs(),
            required: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_scan_tools() -> Vec<String> {
    vec!["grype".to_owned()]
}

fn default_scan_timeout_secs() -> u64 {
    300
}

fn default_signing_timeout_secs() -> u64 {
    120
}

fn default_sbom_timeout_secs() -> u64 {
    300
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_sbom_format() -> String {
    "cyclonedx-json".to_owned()
}

/// 타임아웃 상한 (1시간) — 무한 대기에 가까운 설정을 거부
const MAX_TIMEOUT_SECS: u64 = 3600;

impl SecurityConfig {
    /// 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: &str) -> Result<Self, ShipgateError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|_| ConfigError::FileNotFound {
                    path: path.to_owned(),
                })?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })
    }

    /// 환경변수 오버라이드를 적용합니다 (`SHIPGATE_*`).
    pub fn apply_env_overrides(&mut self) {
        // Scan
        override_bool(&mut self.scan.enabled, "SHIPGATE_SCAN_ENABLED");
        override_csv(&mut self.scan.tools, "SHIPGATE_SCAN_TOOLS");
        override_string(&mut self.scan.fail_on, "SHIPGATE_SCAN_FAIL_ON");
        override_string(&mut self.scan.warn_on, "SHIPGATE_SCAN_WARN_ON");
        override_bool(&mut self.scan.required, "SHIPGATE_SCAN_REQUIRED");
        override_u64(&mut self.scan.timeout_secs, "SHIPGATE_SCAN_TIMEOUT_SECS");
        override_string(&mut self.scan.output.local, "SHIPGATE_SCAN_OUTPUT_LOCAL");
        override_bool(&mut self.scan.output.registry, "SHIPGATE_SCAN_OUTPUT_REGISTRY");
        override_bool(&mut self.scan.cache.enabled, "SHIPGATE_SCAN_CACHE_ENABLED");
        override_u64(&mut self.scan.cache.ttl_secs, "SHIPGATE_SCAN_CACHE_TTL_SECS");

        // Signing
        override_bool(&mut self.signing.enabled, "SHIPGATE_SIGNING_ENABLED");
        override_bool(&mut self.signing.keyless, "SHIPGATE_SIGNING_KEYLESS");
        override_string(&mut self.signing.oidc_issuer, "SHIPGATE_SIGNING_OIDC_ISSUER");
        override_string(
            &mut self.signing.identity_regexp,
            "SHIPGATE_SIGNING_IDENTITY_REGEXP",
        );
        override_string(&mut self.signing.private_key, "SHIPGATE_SIGNING_PRIVATE_KEY");
        override_string(&mut self.signing.public_key, "SHIPGATE_SIGNING_PUBLIC_KEY");
        override_string(&mut self.signing.password, "SHIPGATE_SIGNING_PASSWORD");
        override_u64(
            &mut self.signing.timeout_secs,
            "SHIPGATE_SIGNING_TIMEOUT_SECS",
        );
        override_bool(&mut self.signing.required, "SHIPGATE_SIGNING_REQUIRED");

        // SBOM
        override_bool(&mut self.sbom.enabled, "SHIPGATE_SBOM_ENABLED");
        override_string(&mut self.sbom.format, "SHIPGATE_SBOM_FORMAT");
        override_bool(&mut self.sbom.attach, "SHIPGATE_SBOM_ATTACH");
        override_u64(&mut self.sbom.timeout_secs, "SHIPGATE_SBOM_TIMEOUT_SECS");
        override_bool(&mut self.sbom.required, "SHIPGATE_SBOM_REQUIRED");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - 스캔 활성화 시 도구 목록 비어있으면 안 됨
    /// - `fail_on`/`warn_on`은 설정 시 정의된 심각도여야 함
    /// - keyless 서명은 OIDC 발급자와 identity 정규식 필요
    /// - key 서명은 비어있지 않은 개인키 필요
    /// - SBOM 형식은 지원 형식이어야 함
    /// - 타임아웃은 1초 이상 3600초 이하
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_scan()?;
        self.validate_signing()?;
        self.validate_sbom()?;
        Ok(())
    }

    fn validate_scan(&self) -> Result<(), ConfigError> {
        if self.scan.enabled && self.scan.tools.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "scan.tools".to_owned(),
                reason: "at least one scanner required when scan is enabled".to_owned(),
            });
        }

        for (field, value) in [
            ("scan.fail_on", &self.scan.fail_on),
            ("scan.warn_on", &self.scan.warn_on),
        ] {
            if !value.is_empty() && Severity::from_str_loose(value).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: format!(
                        "'{value}' is not a severity (expected: critical, high, medium, low, unknown)"
                    ),
                });
            }
        }

        validate_timeout("scan.timeout_secs", self.scan.timeout_secs)
    }

    fn validate_signing(&self) -> Result<(), ConfigError> {
        if self.signing.enabled {
            if self.signing.keyless {
                if self.signing.oidc_issuer.is_empty() {
                    return Err(ConfigError::MissingValue {
                        field: "signing.oidc_issuer".to_owned(),
                        reason: "keyless signing requires an OIDC issuer".to_owned(),
                    });
                }
                if self.signing.identity_regexp.is_empty() {
                    return Err(ConfigError::MissingValue {
                        field: "signing.identity_regexp".to_owned(),
                        reason: "keyless signing requires an identity-matching expression"
                            .to_owned(),
                    });
                }
            } else if self.signing.private_key.is_empty() {
                return Err(ConfigError::MissingValue {
                    field: "signing.private_key".to_owned(),
                    reason: "key-based signing requires a private key".to_owned(),
                });
            }
        }

        validate_timeout("signing.timeout_secs", self.signing.timeout_secs)
    }

    fn validate_sbom(&self) -> Result<(), ConfigError> {
        if self.sbom.enabled && SbomFormat::from_str_loose(&self.sbom.format).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "sbom.format".to_owned(),
                reason: format!("unsupported sbom format '{}'", self.sbom.format),
            });
        }

        validate_timeout("sbom.timeout_secs", self.sbom.timeout_secs)
    }
}

fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_TIMEOUT_SECS {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: format!("must be 1-{MAX_TIMEOUT_SECS}"),
        });
    }
    Ok(())
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, key: &str) {
    if let Ok(value) = std::env::var(key)
        && let Ok(parsed) = value.parse()
    {
        *target = parsed;
    }
}

fn override_u64(target: &mut u64, key: &str) {
    if let Ok(value) = std::env::var(key)
        && let Ok(parsed) = value.parse()
    {
        *target = parsed;
    }
}

fn override_csv(target: &mut Vec<String>, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *target = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = SecurityConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_minimal_scan_config() {
        let config = SecurityConfig::parse(
            r#"
            [scan]
            enabled = true
            tools = ["grype", "trivy"]
            fail_on = "high"
            "#,
        )
        .unwrap();
        assert!(config.scan.enabled);
        assert_eq!(config.scan.tools, vec!["grype", "trivy"]);
        assert_eq!(config.scan.fail_on, "high");
        config.validate().unwrap();
    }

    #[test]
    fn parse_rejects_bad_toml() {
        let err = SecurityConfig::parse("[scan\nenabled = yes").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn enabled_scan_requires_tools() {
        let mut config = SecurityConfig::default();
        config.scan.enabled = true;
        config.scan.tools.clear();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { ref field, .. } if field == "scan.tools"));
    }

    #[test]
    fn fail_on_must_be_a_severity() {
        let mut config = SecurityConfig::default();
        config.scan.fail_on = "catastrophic".to_owned();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "scan.fail_on")
        );
    }

    #[test]
    fn empty_fail_on_is_valid() {
        let mut config = SecurityConfig::default();
        config.scan.enabled = true;
        config.scan.fail_on = String::new();
        config.validate().unwrap();
    }

    #[test]
    fn keyless_signing_requires_issuer_and_identity() {
        let mut config = SecurityConfig::default();
        config.signing.enabled = true;
        config.signing.keyless = true;
        config.signing.identity_regexp = "https://github.com/acme/.*".to_owned();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingValue { ref field, .. } if field == "signing.oidc_issuer")
        );

        config.signing.oidc_issuer = "https://token.actions.githubusercontent.com".to_owned();
        config.signing.identity_regexp = String::new();
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingValue { ref field, .. } if field == "signing.identity_regexp")
        );
    }

    #[test]
    fn key_signing_requires_private_key() {
        let mut config = SecurityConfig::default();
        config.signing.enabled = true;
        config.signing.keyless = false;
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingValue { ref field, .. } if field == "signing.private_key")
        );

        config.signing.private_key = "cosign.key".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn sbom_format_must_be_supported() {
        let mut config = SecurityConfig::default();
        config.sbom.enabled = true;
        config.sbom.format = "sarif".to_owned();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "sbom.format"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = SecurityConfig::default();
        config.scan.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let config = SecurityConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let restored = SecurityConfig::parse(&serialized).unwrap();
        assert_eq!(restored.scan.timeout_secs, config.scan.timeout_secs);
        assert_eq!(restored.sbom.format, config.sbom.format);
    }
}
