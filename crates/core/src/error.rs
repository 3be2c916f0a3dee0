//! 에러 타입 — 도메인별 에러 정의
//!
//! 각 하위 크레이트(`shipgate-scan`, `shipgate-attest`)는 자체 에러 타입을
//! 정의하고 `From` 구현을 통해 [`ShipgateError`]로 변환합니다.

use crate::types::Severity;

/// Shipgate 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ShipgateError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 외부 도구 가용성 에러
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// 서브프로세스 실행 에러
    #[error("exec error: {0}")]
    Exec(#[from] ExecError),

    /// 스캔 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 정책 위반
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyError),

    /// 서명/검증 에러
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    /// SBOM 에러
    #[error("sbom error: {0}")]
    Sbom(#[from] SbomError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 설정 에러는 외부 호출 이전에 탐지되며, 작업 전체에 치명적이고
/// 재시도되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 필수 설정 값 누락
    #[error("missing required config value for '{field}': {reason}")]
    MissingValue { field: String, reason: String },
}

/// 외부 도구 가용성 에러
///
/// "도구 없음", "도구는 있으나 버전이 낮음", "확인 자체 실패"를
/// 구분 가능한 별도 variant로 보고합니다.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// 레지스트리에 등록되지 않은 도구
    #[error("unknown tool: {tool}")]
    UnknownTool { tool: String },

    /// 도구 바이너리가 설치되어 있지 않음
    #[error("tool not installed: {tool} (install: {install_url})")]
    NotInstalled { tool: String, install_url: String },

    /// 설치된 버전이 최소 요구 버전보다 낮음
    #[error("tool too old: {tool} {installed} (minimum: {minimum})")]
    VersionTooOld {
        tool: String,
        installed: String,
        minimum: String,
    },

    /// 버전 확인 실패 (출력 파싱 불가 등)
    #[error("version check failed for {tool}: {reason}")]
    VersionCheckFailed { tool: String, reason: String },

    /// 버전 문자열 파싱 실패
    #[error("version parse error: '{input}': {reason}")]
    VersionParse { input: String, reason: String },

    /// 필수 도구 확인 실패 집계
    ///
    /// `check_all_tools`는 개별 실패에서 중단하지 않고 모든 실패를
    /// 수집하여 한 번에 보고합니다.
    #[error("required tools unavailable: {}", .failures.join("; "))]
    Unavailable { failures: Vec<String> },
}

/// 서브프로세스 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// 실행 파일을 찾을 수 없음
    #[error("command not found: {command} (tool: {tool})")]
    NotFound { tool: String, command: String },

    /// 프로세스 생성 실패
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    /// 0이 아닌 종료 코드
    #[error("{tool} exited with code {code}: {stderr}")]
    NonZeroExit {
        tool: String,
        code: i32,
        stderr: String,
    },

    /// 타임아웃 초과 (자식 프로세스는 종료됨)
    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    /// 호출자 취소 (자식 프로세스는 종료됨)
    #[error("{tool} cancelled")]
    Cancelled { tool: String },
}

/// 스캔 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 스캔 실행 실패
    #[error("scan failed: {0}")]
    ScanFailed(String),

    /// 스캐너 출력 파싱 실패
    #[error("scan output parse failed: {0}")]
    ParseFailed(String),

    /// 결과 무결성 위반 (content digest 불일치)
    #[error("scan result digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: String, computed: String },
}

/// 정책 위반 에러
///
/// 차단 결정에 기여한 심각도별 개수를 그대로 담아, 호출자와 테스트가
/// 에러 존재 여부가 아닌 구체적 수치를 검증할 수 있게 합니다.
/// 시스템 장애가 아닌 "배포 차단"을 의미하는 예상된 결과입니다.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// fail-on 임계값 초과
    #[error("{}", violation_message(.fail_on, .critical, .high, .medium, .low, .unknown))]
    ThresholdExceeded {
        fail_on: Severity,
        critical: usize,
        high: usize,
        medium: usize,
        low: usize,
        unknown: usize,
    },
}

/// 정책 위반 메시지 생성: "found 1 critical and 2 high vulnerabilities (fail-on: High)"
fn violation_message(
    fail_on: &Severity,
    critical: &usize,
    high: &usize,
    medium: &usize,
    low: &usize,
    unknown: &usize,
) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (*critical, "critical"),
        (*high, "high"),
        (*medium, "medium"),
        (*low, "low"),
        (*unknown, "unknown"),
    ] {
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }

    let joined = match parts.len() {
        0 => "0".to_owned(),
        1 => parts.remove(0),
        _ => {
            let last = parts.pop().unwrap_or_default();
            format!("{} and {}", parts.join(", "), last)
        }
    };

    format!("found {joined} vulnerabilities (fail-on: {fail_on})")
}

/// 서명/검증 에러
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// 서명 설정 오류 (required 플래그와 무관하게 치명적)
    #[error("invalid signing config: {0}")]
    ConfigInvalid(String),

    /// 서명 실패
    #[error("sign failed: {0}")]
    SignFailed(String),

    /// 검증 실패 — "검증되지 않음"은 항상 에러로 표현됩니다
    #[error("verify failed: {0}")]
    VerifyFailed(String),
}

/// SBOM 에러
#[derive(Debug, thiserror::Error)]
pub enum SbomError {
    /// SBOM 생성 실패
    #[error("sbom generation failed: {0}")]
    GenerateFailed(String),

    /// 증명(attestation) 첨부 실패
    #[error("sbom attach failed: {0}")]
    AttachFailed(String),

    /// 증명 검증 실패
    #[error("sbom verify failed: {0}")]
    VerifyFailed(String),
}
