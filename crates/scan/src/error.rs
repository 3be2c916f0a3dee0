//! 스캔 모듈 에러 타입
//!
//! [`ScannerError`]는 스캔 모듈 내에서 발생할 수 있는 모든 에러를
//! 나타냅니다. `From<ScannerError> for ShipgateError` 구현을 통해 `?`
//! 연산자로 상위 에러 타입으로 자연스럽게 전파됩니다.

use shipgate_core::error::{ExecError, PolicyError, ScanError, ShipgateError, ToolError};

/// 스캔 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 도구 가용성 에러 (설치 안 됨 / 버전 낮음)
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// 외부 스캐너 실행 실패
    #[error("exec error: {0}")]
    Exec(#[from] ExecError),

    /// 스캐너 JSON 출력 파싱 실패
    ///
    /// 재실행 없이 진단할 수 있도록 도구 이름과 원인을 포함합니다.
    #[error("output parse error: {tool}: {reason}")]
    OutputParse { tool: String, reason: String },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 정책 위반 — 배포 차단을 의미하는 예상된 결과
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyError),

    /// 동시 스캔 태스크 실패 (패닉/중단)
    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

impl From<ScannerError> for ShipgateError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::Tool(e) => ShipgateError::Tool(e),
            ScannerError::Exec(e) => ShipgateError::Exec(e),
            ScannerError::OutputParse { tool, reason } => {
                ShipgateError::Scan(ScanError::ParseFailed(format!("{tool}: {reason}")))
            }
            ScannerError::Config { field, reason } => {
                ShipgateError::Config(shipgate_core::error::ConfigError::InvalidValue {
                    field,
                    reason,
                })
            }
            ScannerError::Policy(e) => ShipgateError::Policy(e),
            ScannerError::TaskFailed(msg) => ShipgateError::Scan(ScanError::ScanFailed(msg)),
        }
    }
}
