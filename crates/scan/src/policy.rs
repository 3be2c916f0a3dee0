//! 정책 판정
//!
//! 병합된 스캔 결과를 fail/warn 임계값과 비교합니다. 임계값은 심각도
//! 하한(floor)입니다. `fail_on = "high"`는 High 이상(High, Critical)의
//! 취약점이 하나라도 있으면 위반입니다.
//!
//! 판정은 순수 함수입니다. 경고는 로그로만 기록되고 에러는 위반 시에만
//! 반환되므로, 호출자는 파이프라인 차단 여부를 `Result`로 판단합니다.

use tracing::{info, warn};

use shipgate_core::config::ScanConfig;
use shipgate_core::error::PolicyError;
use shipgate_core::metrics::POLICY_VIOLATIONS_TOTAL;
use shipgate_core::types::{ScanResult, Severity};

/// fail/warn 임계값 기반 정책 판정기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEnforcer {
    fail_on: Option<Severity>,
    warn_on: Option<Severity>,
}

impl PolicyEnforcer {
    pub fn new(fail_on: Option<Severity>, warn_on: Option<Severity>) -> Self {
        Self { fail_on, warn_on }
    }

    /// 설정 문자열에서 판정기를 만듭니다.
    ///
    /// 빈 문자열은 해당 임계값 비활성화입니다. 미인식 문자열은 설정
    /// 검증 단계에서 이미 거부되므로 여기서는 비활성화로 취급합니다.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            fail_on: Severity::from_str_loose(&config.fail_on),
            warn_on: Severity::from_str_loose(&config.warn_on),
        }
    }

    /// 결과를 임계값과 비교합니다.
    ///
    /// `None`은 스캔이 수행되지 않았음을 의미하며 항상 통과입니다.
    /// warn 임계값 위반은 로그 경고만 남기고, fail 임계값 위반은
    /// [`PolicyError::ThresholdExceeded`]를 반환합니다.
    pub fn enforce(&self, result: Option<&ScanResult>) -> Result<(), PolicyError> {
        let Some(result) = result else {
            return Ok(());
        };

        if let Some(warn_floor) = self.warn_on {
            let count = count_at_or_above(result, warn_floor);
            if count > 0 {
                warn!(
                    image = %result.image,
                    threshold = %warn_floor,
                    count,
                    "vulnerabilities at or above warn threshold"
                );
            }
        }

        if let Some(fail_floor) = self.fail_on
            && count_at_or_above(result, fail_floor) > 0
        {
            metrics::counter!(POLICY_VIOLATIONS_TOTAL).increment(1);
            // 에러에는 차단 결정에 기여한 개수만 담는다. 하한 미만
            // 심각도는 0으로 내려 메시지에 섞이지 않게 한다.
            let s = &result.summary;
            let contributing = |sev: Severity, count: usize| if sev >= fail_floor { count } else { 0 };
            return Err(PolicyError::ThresholdExceeded {
                fail_on: fail_floor,
                critical: contributing(Severity::Critical, s.critical),
                high: contributing(Severity::High, s.high),
                medium: contributing(Severity::Medium, s.medium),
                low: contributing(Severity::Low, s.low),
                unknown: contributing(Severity::Unknown, s.unknown),
            });
        }

        info!(
            image = %result.image,
            total = result.summary.total,
            "policy check passed"
        );
        Ok(())
    }

    /// fail 임계값 이상의 취약점이 있는지 반환합니다.
    pub fn should_block(&self, result: &ScanResult) -> bool {
        self.fail_on
            .map(|floor| count_at_or_above(result, floor) > 0)
            .unwrap_or(false)
    }
}

fn count_at_or_above(result: &ScanResult, floor: Severity) -> usize {
    let s = &result.summary;
    [
        (Severity::Critical, s.critical),
        (Severity::High, s.high),
        (Severity::Medium, s.medium),
        (Severity::Low, s.low),
        (Severity::Unknown, s.unknown),
    ]
    .into_iter()
    .filter(|(sev, _)| *sev >= floor)
    .map(|(_, count)| count)
    .sum()
}
