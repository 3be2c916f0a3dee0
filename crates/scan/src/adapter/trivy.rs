//! Trivy 어댑터
//!
//! `trivy image --format json <image>` 출력을 공통 모델로 정규화합니다.
//! Trivy 리포트는 대상(OS 패키지, 언어별 패키지)별 Results 섹션으로
//! 나뉘며, 모든 섹션의 취약점을 단일 목록으로 평탄화합니다.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use shipgate_core::exec::run_tool;
use shipgate_core::types::{ScanResult, Severity, Vulnerability};

use crate::error::ScannerError;

use super::ScannerAdapter;

/// Trivy 취약점 스캐너 어댑터
#[derive(Debug, Clone, Default)]
pub struct TrivyScanner;

impl TrivyScanner {
    pub fn new() -> Self {
        Self
    }

    /// Trivy JSON 출력을 파싱하여 정규화된 결과를 만듭니다.
    pub fn parse_output(&self, image: &str, output: &[u8]) -> Result<ScanResult, ScannerError> {
        let report: TrivyReport =
            serde_json::from_slice(output).map_err(|e| ScannerError::OutputParse {
                tool: "trivy".to_string(),
                reason: e.to_string(),
            })?;

        let vulnerabilities: Vec<Vulnerability> = report
            .results
            .iter()
            .flat_map(|r| r.vulnerabilities.iter())
            .map(normalize_vulnerability)
            .collect();

        let image_digest = report
            .metadata
            .as_ref()
            .map(extract_digest)
            .unwrap_or_default();

        debug!(image, count = vulnerabilities.len(), "parsed trivy report");

        Ok(ScanResult::new(
            image,
            image_digest,
            "trivy",
            vulnerabilities,
            BTreeMap::new(),
        ))
    }
}

impl ScannerAdapter for TrivyScanner {
    fn name(&self) -> &'static str {
        "trivy"
    }

    async fn scan(
        &self,
        image: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScannerError> {
        let args = vec![
            "image".to_string(),
            "--format".to_string(),
            "json".to_string(),
            image.to_string(),
        ];
        let output = run_tool("trivy", "trivy", &args, &[], timeout, cancel).await?;
        self.parse_output(image, &output.stdout)
    }
}

fn map_severity(raw: &str) -> Severity {
    match raw.to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Unknown,
    }
}

fn normalize_vulnerability(v: &TrivyVulnerability) -> Vulnerability {
    Vulnerability {
        id: v.vulnerability_id.clone(),
        severity: map_severity(&v.severity),
        package: v.pkg_name.clone(),
        installed_version: v.installed_version.clone(),
        // Trivy는 미수정을 빈 문자열로 표기한다.
        fixed_version: match v.fixed_version.as_deref() {
            Some("") | None => None,
            Some(s) => Some(s.to_string()),
        },
        description: v.description.clone().unwrap_or_default(),
        references: v.references.clone(),
        cvss_score: first_cvss_v3(&v.cvss),
    }
}

/// 벤더별 CVSS 항목에서 처음 발견되는 0이 아닌 V3Score를 반환합니다.
fn first_cvss_v3(cvss: &BTreeMap<String, TrivyCvss>) -> f64 {
    cvss.values()
        .filter_map(|c| c.v3_score)
        .find(|score| *score > 0.0)
        .unwrap_or(0.0)
}

/// RepoDigests의 첫 항목에서 `@` 뒤의 digest를 추출합니다.
fn extract_digest(metadata: &TrivyMetadata) -> String {
    metadata
        .repo_digests
        .first()
        .and_then(|d| d.split_once('@'))
        .map(|(_, digest)| digest.to_string())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct TrivyReport {
    #[serde(rename = "Results", default)]
    results: Vec<TrivyResult>,
    #[serde(rename = "Metadata", default)]
    metadata: Option<TrivyMetadata>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Vec<TrivyVulnerability>,
}

#[derive(Debug, Deserialize)]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: String,
    #[serde(rename = "PkgName", default)]
    pkg_name: String,
    #[serde(rename = "InstalledVersion", default)]
    installed_version: String,
    #[serde(rename = "FixedVersion", default)]
    fixed_version: Option<String>,
    #[serde(rename = "Severity", default)]
    severity: String,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "References", default)]
    references: Vec<String>,
    #[serde(rename = "CVSS", default)]
    cvss: BTreeMap<String, TrivyCvss>,
}

#[derive(Debug, Deserialize)]
struct TrivyCvss {
    #[serde(rename = "V3Score", default)]
    v3_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TrivyMetadata {
    #[serde(rename = "RepoDigests", default)]
    repo_digests: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Metadata": {
            "RepoDigests": ["example.com/app@sha256:abc123"]
        },
        "Results": [
            {
                "Target": "app (alpine 3.19)",
                "Vulnerabilities": [
                    {
                        "VulnerabilityID": "CVE-2024-1111",
                        "PkgName": "libfoo",
                        "InstalledVersion": "1.2.3",
                        "FixedVersion": "1.2.4",
                        "Severity": "HIGH",
                        "Description": "buffer overread",
                        "References": ["https://nvd.example/CVE-2024-1111"],
                        "CVSS": {
                            "nvd": {"V3Score": 7.5},
                            "redhat": {"V3Score": 7.1}
                        }
                    }
                ]
            },
            {
                "Target": "usr/bin/app",
                "Vulnerabilities": [
                    {
                        "VulnerabilityID": "CVE-2024-3333",
                        "PkgName": "golang.org/x/net",
                        "InstalledVersion": "0.1.0",
                        "FixedVersion": "",
                        "Severity": "UNKNOWN",
                        "CVSS": {}
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_full_report_and_flattens_results() {
        let result = TrivyScanner::new()
            .parse_output("example.com/app:1.0", SAMPLE.as_bytes())
            .unwrap();
        assert_eq!(result.tool, "trivy");
        assert_eq!(result.image_digest, "sha256:abc123");
        assert_eq!(result.vulnerabilities.len(), 2);

        let first = &result.vulnerabilities[0];
        assert_eq!(first.id, "CVE-2024-1111");
        assert_eq!(first.severity, Severity::High);
        assert_eq!(first.cvss_score, 7.5);
        assert_eq!(first.fixed_version.as_deref(), Some("1.2.4"));
    }

    #[test]
    fn empty_fixed_version_becomes_none() {
        let result = TrivyScanner::new().parse_output("img", SAMPLE.as_bytes()).unwrap();
        let second = &result.vulnerabilities[1];
        assert!(second.fixed_version.is_none());
        assert_eq!(second.severity, Severity::Unknown);
        assert_eq!(second.cvss_score, 0.0);
    }

    #[test]
    fn report_without_results_is_success() {
        let result = TrivyScanner::new().parse_output("img", b"{}").unwrap();
        assert!(result.vulnerabilities.is_empty());
        assert_eq!(result.image_digest, "");
    }

    #[test]
    fn results_without_vulnerabilities_key_parse() {
        let json = r#"{"Results": [{"Target": "clean"}]}"#;
        let result = TrivyScanner::new().parse_output("img", json.as_bytes()).unwrap();
        assert!(result.vulnerabilities.is_empty());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = TrivyScanner::new().parse_output("img", b"[1,2").unwrap_err();
        assert!(matches!(err, ScannerError::OutputParse { .. }));
    }
}
