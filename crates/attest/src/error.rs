//! shipgate-attest 에러 타입

use shipgate_core::error::{ExecError, ShipgateError};

/// 서명/SBOM 증명 에러
#[derive(Debug, thiserror::Error)]
pub enum AttestError {
    /// 서명 설정 오류 (required 플래그와 무관하게 항상 치명적)
    #[error("invalid signing config: {field}: {reason}")]
    Config { field: String, reason: String },

    /// keyless 서명에 필요한 ambient OIDC 토큰 없음
    #[error(
        "keyless signing requires an ambient OIDC token \
         (SIGSTORE_ID_TOKEN or GitHub Actions token env)"
    )]
    MissingOidcToken,

    /// 외부 도구 실행 실패
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// 서명 실패
    #[error("signing failed for '{image}': {reason}")]
    SignFailed { image: String, reason: String },

    /// 서명 검증 실패
    #[error("signature verification failed for '{image}': {reason}")]
    VerifyFailed { image: String, reason: String },

    /// SBOM 생성 실패
    #[error("sbom generation failed for '{image}': {reason}")]
    SbomGenerate { image: String, reason: String },

    /// attestation 출력 파싱 실패
    #[error("failed to parse attestation: {0}")]
    AttestationParse(String),

    /// attestation predicate 타입 불일치
    #[error("attestation predicate mismatch: expected '{expected}', got '{actual}'")]
    PredicateMismatch { expected: String, actual: String },

    /// 임시 파일 I/O 실패
    #[error("attestation io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttestError {
    /// 설정 오류 여부를 반환합니다.
    ///
    /// 설정 오류는 fail-open 대상이 아닙니다. 잘못된 설정을 건너뛰면
    /// 오류가 조용히 묻히기 때문입니다.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::MissingOidcToken)
    }
}

impl From<AttestError> for ShipgateError {
    fn from(err: AttestError) -> Self {
        use shipgate_core::error::{SbomError, SigningError};
        match err {
            AttestError::Config { field, reason } => {
                ShipgateError::Signing(SigningError::ConfigInvalid(format!("{field}: {reason}")))
            }
            AttestError::MissingOidcToken => {
                ShipgateError::Signing(SigningError::ConfigInvalid(err.to_string()))
            }
            AttestError::SignFailed { image, reason } => {
                ShipgateError::Signing(SigningError::SignFailed(format!("{image}: {reason}")))
            }
            AttestError::VerifyFailed { image, reason } => {
                ShipgateError::Signing(SigningError::VerifyFailed(format!("{image}: {reason}")))
            }
            AttestError::SbomGenerate { image, reason } => {
                ShipgateError::Sbom(SbomError::GenerateFailed(format!("{image}: {reason}")))
            }
            AttestError::AttestationParse(reason) => {
                ShipgateError::Sbom(SbomError::VerifyFailed(reason))
            }
            AttestError::PredicateMismatch { .. } => {
                ShipgateError::Sbom(SbomError::VerifyFailed(err.to_string()))
            }
            AttestError::Exec(e) => ShipgateError::Exec(e),
            AttestError::Io(e) => ShipgateError::Io(e),
        }
    }
}
