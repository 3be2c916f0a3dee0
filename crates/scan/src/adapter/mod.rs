//! 스캐너 어댑터 — 외부 취약점 스캐너 호출 및 출력 정규화
//!
//! 각 어댑터는 하나의 외부 스캐너 바이너리를 이미지 레퍼런스에 대해
//! 호출하고, 도구별 JSON을 공통 [`ScanResult`] 모델로 정규화합니다.
//!
//! 도구 집합은 작고 안정적이므로 open-ended 플러그인 탐색 대신 설정
//! 시점에 선택되는 닫힌 variant 집합([`Scanner`])으로 구현합니다.
//!
//! # 정규화 규칙
//!
//! - 심각도: 도구별 테이블, 대소문자 구분 없음, 미인식 문자열은
//!   `Unknown`으로 매핑 (에러 아님)
//! - CVSS: 처음 발견되는 0이 아닌 v3 기본 점수, 없으면 0.0
//! - 이미지 digest: 도구 메타데이터에 있으면 추출, 없으면 빈 문자열
//! - 취약점 0건은 정상 성공

pub mod grype;
pub mod trivy;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use shipgate_core::types::ScanResult;

use crate::error::ScannerError;

pub use grype::GrypeScanner;
pub use trivy::TrivyScanner;

/// 스캐너 어댑터 trait
///
/// `Scan(ctx, imageRef) -> ScanResult` 계약의 구현점입니다. 설치/버전
/// 확인은 [`ToolRegistry`](shipgate_core::tools::ToolRegistry)가 별도
/// 작업으로 수행하므로, 호출자는 "도구 없음"과 "스캔 실패"를 구분할 수
/// 있습니다.
pub trait ScannerAdapter: Send + Sync {
    /// 스캐너 이름 (레지스트리 키와 동일)
    fn name(&self) -> &'static str;

    /// 이미지를 스캔하여 정규화된 결과를 반환합니다.
    fn scan(
        &self,
        image: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ScanResult, ScannerError>> + Send;
}

/// 설정으로 선택되는 닫힌 스캐너 집합
#[derive(Debug, Clone)]
pub enum Scanner {
    Grype(GrypeScanner),
    Trivy(TrivyScanner),
}

impl Scanner {
    /// 설정의 도구 이름으로 스캐너를 선택합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "grype" => Some(Self::Grype(GrypeScanner::new())),
            "trivy" => Some(Self::Trivy(TrivyScanner::new())),
            _ => None,
        }
    }
}

impl ScannerAdapter for Scanner {
    fn name(&self) -> &'static str {
        match self {
            Self::Grype(s) => s.name(),
            Self::Trivy(s) => s.name(),
        }
    }

    async fn scan(
        &self,
        image: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScannerError> {
        match self {
            Self::Grype(s) => s.scan(image, timeout, cancel).await,
            Self::Trivy(s) => s.scan(image, timeout, cancel).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_selects_known_scanners() {
        assert!(matches!(Scanner::from_name("grype"), Some(Scanner::Grype(_))));
        assert!(matches!(Scanner::from_name("TRIVY"), Some(Scanner::Trivy(_))));
        assert!(Scanner::from_name("snyk").is_none());
        assert!(Scanner::from_name("").is_none());
    }

    #[test]
    fn scanner_names_match_registry_keys() {
        assert_eq!(Scanner::from_name("grype").unwrap().name(), "grype");
        assert_eq!(Scanner::from_name("trivy").unwrap().name(), "trivy");
    }
}
