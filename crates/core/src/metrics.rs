//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `shipgate_`
//! - 모듈명: `scan_`, `policy_`, `sign_`, `sbom_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 도구 레이블 키 (grype, trivy, cosign, syft)
pub const LABEL_TOOL: &str = "tool";

/// 심각도 레이블 키 (unknown, low, medium, high, critical)
pub const LABEL_SEVERITY: &str = "severity";

/// 결과 레이블 키 (success, failure, skipped)
pub const LABEL_RESULT: &str = "result";

// ─── Scan 메트릭 ───────────────────────────────────────────────────

/// 완료된 스캐너 호출 수 (counter)
pub const SCAN_COMPLETED_TOTAL: &str = "shipgate_scan_completed_total";

/// 실패한 스캐너 호출 수 (counter)
pub const SCAN_FAILURES_TOTAL: &str = "shipgate_scan_failures_total";

/// 병합 후 발견된 취약점 수 (counter)
pub const SCAN_VULNS_FOUND_TOTAL: &str = "shipgate_scan_vulns_found_total";

/// 스캔 소요 시간 (histogram)
pub const SCAN_DURATION_SECONDS: &str = "shipgate_scan_duration_seconds";

// ─── Policy 메트릭 ─────────────────────────────────────────────────

/// 정책 위반으로 차단된 결과 수 (counter)
pub const POLICY_VIOLATIONS_TOTAL: &str = "shipgate_policy_violations_total";

// ─── Signing 메트릭 ────────────────────────────────────────────────

/// 서명 작업 수 (counter, result 레이블)
pub const SIGN_OPERATIONS_TOTAL: &str = "shipgate_sign_operations_total";

/// 검증 작업 수 (counter, result 레이블)
pub const VERIFY_OPERATIONS_TOTAL: &str = "shipgate_verify_operations_total";

// ─── SBOM 메트릭 ───────────────────────────────────────────────────

/// 생성된 SBOM 수 (counter)
pub const SBOM_GENERATED_TOTAL: &str = "shipgate_sbom_generated_total";

/// SBOM 증명 첨부 작업 수 (counter, result 레이블)
pub const SBOM_ATTACH_TOTAL: &str = "shipgate_sbom_attach_total";

/// 전체 메트릭 이름 목록 (테스트 및 설명 등록용)
pub const ALL_METRICS: &[&str] = &[
    SCAN_COMPLETED_TOTAL,
    SCAN_FAILURES_TOTAL,
    SCAN_VULNS_FOUND_TOTAL,
    SCAN_DURATION_SECONDS,
    POLICY_VIOLATIONS_TOTAL,
    SIGN_OPERATIONS_TOTAL,
    VERIFY_OPERATIONS_TOTAL,
    SBOM_GENERATED_TOTAL,
    SBOM_ATTACH_TOTAL,
];

/// 메트릭 설명을 전역 recorder에 등록합니다.
///
/// recorder 설치 이후 1회 호출합니다. recorder가 없으면 no-op입니다.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(SCAN_COMPLETED_TOTAL, "Completed scanner invocations");
    describe_counter!(SCAN_FAILURES_TOTAL, "Failed scanner invocations");
    describe_counter!(
        SCAN_VULNS_FOUND_TOTAL,
        "Vulnerabilities found after merging"
    );
    describe_histogram!(SCAN_DURATION_SECONDS, "Scan duration in seconds");
    describe_counter!(POLICY_VIOLATIONS_TOTAL, "Results blocked by policy");
    describe_counter!(SIGN_OPERATIONS_TOTAL, "Image signing operations");
    describe_counter!(VERIFY_OPERATIONS_TOTAL, "Image verification operations");
    describe_counter!(SBOM_GENERATED_TOTAL, "Generated SBOM documents");
    describe_counter!(SBOM_ATTACH_TOTAL, "SBOM attestation attach operations");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metrics_start_with_shipgate_prefix() {
        for name in ALL_METRICS {
            assert!(
                name.starts_with("shipgate_"),
                "metric without prefix: {name}"
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRICS {
            if !name.ends_with("_seconds") {
                assert!(name.ends_with("_total"), "counter without _total: {name}");
            }
        }
    }

    #[test]
    fn describe_metrics_without_recorder_is_noop() {
        describe_metrics();
    }
}
