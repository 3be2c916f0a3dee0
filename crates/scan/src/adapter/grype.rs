//! Grype 어댑터
//!
//! `grype registry:<image> -o json` 출력을 공통 모델로 정규화합니다.
//! `registry:` 스킴은 로컬 Docker 데몬을 거치지 않고 레지스트리에서
//! 직접 읽도록 강제합니다.

use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use shipgate_core::exec::run_tool;
use shipgate_core::types::{ScanResult, Severity, Vulnerability};

use crate::error::ScannerError;

use super::ScannerAdapter;

/// Grype 취약점 스캐너 어댑터
#[derive(Debug, Clone, Default)]
pub struct GrypeScanner;

impl GrypeScanner {
    pub fn new() -> Self {
        Self
    }

    /// Grype JSON 출력을 파싱하여 정규화된 결과를 만듭니다.
    ///
    /// 스캔 실행과 분리된 공개 API로, 테스트에서 캡처된 출력에 직접
    /// 사용할 수 있습니다.
    pub fn parse_output(&self, image: &str, output: &[u8]) -> Result<ScanResult, ScannerError> {
        let report: GrypeReport =
            serde_json::from_slice(output).map_err(|e| ScannerError::OutputParse {
                tool: "grype".to_string(),
                reason: e.to_string(),
            })?;

        let vulnerabilities: Vec<Vulnerability> =
            report.matches.iter().map(normalize_match).collect();

        let image_digest = report.source.as_ref().map(extract_digest).unwrap_or_default();
        let tool_version = report
            .descriptor
            .as_ref()
            .map(|d| d.version.clone())
            .unwrap_or_default();

        debug!(
            image,
            count = vulnerabilities.len(),
            "parsed grype report"
        );

        let mut metadata = std::collections::BTreeMap::new();
        if !tool_version.is_empty() {
            metadata.insert("tool_version".to_string(), tool_version);
        }
        Ok(ScanResult::new(
            image,
            image_digest,
            "grype",
            vulnerabilities,
            metadata,
        ))
    }
}

impl ScannerAdapter for GrypeScanner {
    fn name(&self) -> &'static str {
        "grype"
    }

    async fn scan(
        &self,
        image: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScannerError> {
        let args = vec![format!("registry:{image}"), "-o".to_string(), "json".to_string()];
        let output = run_tool("grype", "grype", &args, &[], timeout, cancel).await?;
        self.parse_output(image, &output.stdout)
    }
}

/// Grype 심각도 문자열을 공통 심각도로 매핑합니다.
///
/// `Negligible`은 별도 단계가 없으므로 `Low`로 내립니다. 미인식
/// 문자열은 `Unknown`입니다.
fn map_severity(raw: &str) -> Severity {
    match raw.to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" | "negligible" => Severity::Low,
        _ => Severity::Unknown,
    }
}

fn normalize_match(m: &GrypeMatch) -> Vulnerability {
    let v = &m.vulnerability;
    // 기본 취약점 항목에 CVSS가 없으면 relatedVulnerabilities에서 찾는다.
    let cvss_score = first_cvss_v3(&v.cvss).or_else(|| {
        m.related_vulnerabilities
            .iter()
            .find_map(|r| first_cvss_v3(&r.cvss))
    });

    Vulnerability {
        id: v.id.clone(),
        severity: map_severity(&v.severity),
        package: m.artifact.name.clone(),
        installed_version: m.artifact.version.clone(),
        fixed_version: v.fix.as_ref().and_then(|f| f.versions.first().cloned()),
        description: v.description.clone().unwrap_or_default(),
        cvss_score: cvss_score.unwrap_or(0.0),
        references: v.urls.clone(),
    }
}

/// 처음 발견되는 0이 아닌 v3 기본 점수를 반환합니다.
fn first_cvss_v3(entries: &[GrypeCvss]) -> Option<f64> {
    entries
        .iter()
        .filter(|c| c.version.starts_with('3'))
        .map(|c| c.metrics.base_score)
        .find(|score| *score > 0.0)
}

/// source.target의 형태는 소스 종류에 따라 달라지므로 느슨하게 탐색합니다.
fn extract_digest(source: &GrypeSource) -> String {
    let target = &source.target;
    if let Some(digest) = target.get("manifestDigest").and_then(|v| v.as_str())
        && !digest.is_empty()
    {
        return digest.to_string();
    }
    if let Some(repo_digests) = target.get("repoDigests").and_then(|v| v.as_array())
        && let Some(first) = repo_digests.first().and_then(|v| v.as_str())
        && let Some((_, digest)) = first.split_once('@')
    {
        return digest.to_string();
    }
    String::new()
}

#[derive(Debug, Deserialize)]
struct GrypeReport {
    #[serde(default)]
    matches: Vec<GrypeMatch>,
    #[serde(default)]
    source: Option<GrypeSource>,
    #[serde(default)]
    descriptor: Option<GrypeDescriptor>,
}

#[derive(Debug, Deserialize)]
struct GrypeMatch {
    vulnerability: GrypeVulnerability,
    #[serde(rename = "relatedVulnerabilities", default)]
    related_vulnerabilities: Vec<GrypeVulnerability>,
    artifact: GrypeArtifact,
}

#[derive(Debug, Deserialize)]
struct GrypeVulnerability {
    id: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
    #[serde(default)]
    fix: Option<GrypeFix>,
    #[serde(default)]
    cvss: Vec<GrypeCvss>,
}

#[derive(Debug, Deserialize)]
struct GrypeFix {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GrypeCvss {
    #[serde(default)]
    version: String,
    metrics: GrypeCvssMetrics,
}

#[derive(Debug, Deserialize)]
struct GrypeCvssMetrics {
    #[serde(rename = "baseScore", default)]
    base_score: f64,
}

#[derive(Debug, Deserialize)]
struct GrypeArtifact {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct GrypeSource {
    #[serde(default)]
    target: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GrypeDescriptor {
    #[serde(default)]
    version: String,
}
