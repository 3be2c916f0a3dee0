//! 다중 스캐너 결과 병합
//!
//! 여러 도구가 같은 취약점을 서로 다른 심각도로 보고할 수 있습니다.
//! 병합은 취약점 ID 기준 중복 제거에 심각도 상향(escalation)을
//! 적용합니다. 같은 ID에 대해 항상 더 높은 심각도의 항목이 남으므로
//! 병합은 보수적입니다. 어떤 도구 하나라도 Critical이라 하면 병합
//! 결과도 Critical입니다.

use std::collections::BTreeMap;

use tracing::info;

use shipgate_core::types::{ScanResult, TOOL_ALL};

/// 여러 스캔 결과를 ID 기준으로 병합합니다.
///
/// - 입력이 비어 있으면 `None`
/// - 결과가 하나면 그대로 반환 (tool 이름 유지, 요약 재계산 없음)
/// - 둘 이상이면 ID별 최고 심각도 항목을 남기고, tool은 `"all"`,
///   metadata에 `merged_from` 키로 참여 도구 목록을 기록합니다
///
/// 단일 결과 통과는 metadata 형태가 다릅니다. [`ScanResult::is_merged`]가
/// false이고 `merged_from` 키가 없으므로, 스캐너 개수에 따라 분기하는
/// 호출자는 두 형태를 모두 처리해야 합니다.
///
/// 병합 목록은 심각도 내림차순, 같은 심각도 내에서는 ID 오름차순으로
/// 정렬되어 결정적입니다.
pub fn merge_results(results: Vec<ScanResult>) -> Option<ScanResult> {
    if results.is_empty() {
        return None;
    }
    if results.len() == 1 {
        return results.into_iter().next();
    }

    let image = results[0].image.clone();
    // digest는 도구에 따라 비어 있을 수 있으므로 비어 있지 않은 첫 값을 쓴다.
    let image_digest = results
        .iter()
        .map(|r| r.image_digest.as_str())
        .find(|d| !d.is_empty())
        .unwrap_or_default()
        .to_string();

    let mut tools: Vec<&str> = results.iter().map(|r| r.tool.as_str()).collect();
    tools.sort_unstable();
    tools.dedup();
    let merged_from = tools.join(",");

    let mut by_id = BTreeMap::new();
    for result in &results {
        for vuln in &result.vulnerabilities {
            by_id
                .entry(vuln.id.clone())
                .and_modify(|existing: &mut shipgate_core::types::Vulnerability| {
                    if vuln.severity > existing.severity {
                        *existing = vuln.clone();
                    }
                })
                .or_insert_with(|| vuln.clone());
        }
    }

    let mut vulnerabilities: Vec<_> = by_id.into_values().collect();
    vulnerabilities.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut metadata = BTreeMap::new();
    metadata.insert("merged_from".to_string(), merged_from.clone());

    let merged = ScanResult::new(image, image_digest, TOOL_ALL, vulnerabilities, metadata);
    info!(
        tools = merged_from,
        total = merged.summary.total,
        "merged scan results"
    );
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipgate_core::types::{Severity, Vulnerability};

    fn vuln(id: &str, severity: Severity) -> Vulnerability {
        Vulnerability {
            id: id.to_string(),
            severity,
            package: "pkg".to_string(),
            installed_version: "1.0.0".to_string(),
            fixed_version: None,
            description: String::new(),
            references: vec![],
            cvss_score: 0.0,
        }
    }

    fn result(tool: &str, digest: &str, vulns: Vec<Vulnerability>) -> ScanResult {
        ScanResult::new("img", digest, tool, vulns, BTreeMap::new())
    }

    #[test]
    fn empty_input_is_none() {
        assert!(merge_results(vec![]).is_none());
    }

    #[test]
    fn single_result_passes_through_unchanged() {
        let single = result("grype", "sha256:a", vec![vuln("CVE-1", Severity::High)]);
        let merged = merge_results(vec![single]).unwrap();
        assert_eq!(merged.tool, "grype");
        assert!(!merged.is_merged());
        assert!(merged.metadata.get("merged_from").is_none());
    }

    #[test]
    fn higher_severity_wins_regardless_of_order() {
        let a = result("grype", "", vec![vuln("CVE-1", Severity::Medium)]);
        let b = result("trivy", "", vec![vuln("CVE-1", Severity::Critical)]);

        let merged = merge_results(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(merged.vulnerabilities.len(), 1);
        assert_eq!(merged.vulnerabilities[0].severity, Severity::Critical);

        let reversed = merge_results(vec![b, a]).unwrap();
        assert_eq!(reversed.vulnerabilities[0].severity, Severity::Critical);
    }

    #[test]
    fn merged_result_is_marked_and_sorted() {
        let a = result(
            "grype",
            "sha256:a",
            vec![vuln("CVE-3", Severity::Low), vuln("CVE-1", Severity::High)],
        );
        let b = result(
            "trivy",
            "",
            vec![vuln("CVE-2", Severity::High), vuln("CVE-4", Severity::Critical)],
        );

        let merged = merge_results(vec![a, b]).unwrap();
        assert!(merged.is_merged());
        assert_eq!(merged.tool, TOOL_ALL);
        assert_eq!(merged.image_digest, "sha256:a");
        assert_eq!(merged.metadata.get("merged_from").unwrap(), "grype,trivy");

        let ids: Vec<&str> = merged.vulnerabilities.iter().map(|v| v.id.as_str()).collect();
        // 심각도 내림차순, 동률은 ID 오름차순
        assert_eq!(ids, ["CVE-4", "CVE-1", "CVE-2", "CVE-3"]);
    }

    #[test]
    fn summary_reflects_merged_counts() {
        let a = result("grype", "", vec![vuln("CVE-1", Severity::High)]);
        let b = result(
            "trivy",
            "",
            vec![vuln("CVE-1", Severity::Critical), vuln("CVE-2", Severity::Low)],
        );
        let merged = merge_results(vec![a, b]).unwrap();
        assert_eq!(merged.summary.total, 2);
        assert_eq!(merged.summary.critical, 1);
        assert_eq!(merged.summary.high, 0);
        assert_eq!(merged.summary.low, 1);
    }

    #[test]
    fn equal_severity_keeps_first_seen() {
        let mut first = vuln("CVE-1", Severity::High);
        first.description = "from grype".to_string();
        let mut second = vuln("CVE-1", Severity::High);
        second.description = "from trivy".to_string();

        let merged = merge_results(vec![
            result("grype", "", vec![first]),
            result("trivy", "", vec![second]),
        ])
        .unwrap();
        assert_eq!(merged.vulnerabilities[0].description, "from grype");
    }
}
