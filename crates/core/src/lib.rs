#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod exec;
pub mod metrics;
pub mod tools;
pub mod types;
pub mod version;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    ConfigError, ExecError, PolicyError, ScanError, SbomError, ShipgateError, SigningError,
    ToolError,
};

// 설정
pub use config::{CacheConfig, OutputConfig, SbomConfig, ScanConfig, SecurityConfig, SigningConfig};

// 도메인 타입
pub use types::{
    CertificateInfo, Outcome, Sbom, SbomFormat, ScanResult, Severity, SignResult, VerifyResult,
    Vulnerability, VulnerabilitySummary, TOOL_ALL,
};

// 버전 비교
pub use version::Version;

// 도구 레지스트리
pub use tools::{ToolMetadata, ToolRegistry};
