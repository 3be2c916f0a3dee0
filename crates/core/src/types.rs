//! 도메인 타입 — 파이프라인 전역에서 사용되는 공통 타입
//!
//! 스캔/서명/SBOM 모듈이 공유하는 데이터 구조를 정의합니다.
//! 모든 타입은 작업당 한 번 생성되는 불변 값 레코드이며, 생성 시점의
//! summary/digest 파생을 제외하면 생성 후 변경되지 않습니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ScanError;

/// 병합된 스캔 결과의 합성 도구 이름
pub const TOOL_ALL: &str = "all";

/// 심각도 레벨
///
/// 취약점 심각도를 나타냅니다. `Ord` 구현으로 심각도 비교가 가능합니다
/// (`Unknown < Low < Medium < High < Critical`). 이 전순서는 병합 시
/// 심각도 승격과 정책 임계값 비교 양쪽에서 동일하게 사용됩니다.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// 알 수 없음 — 스캐너가 심각도를 보고하지 않음
    #[default]
    Unknown,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Some(Self::Unknown),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 단일 취약점 발견
///
/// 스캐너가 보고한 하나의 취약점을 나타냅니다. 식별자+패키지 유일성은
/// 이 수준에서 강제되지 않으며, 중복 제거는 병합 시 식별자 기준으로만
/// 수행됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    /// 취약점 식별자 (CVE 또는 도구별 ID)
    pub id: String,
    /// 심각도
    pub severity: Severity,
    /// 영향받는 패키지명
    pub package: String,
    /// 설치된 버전
    pub installed_version: String,
    /// 수정된 버전 (미수정이면 None)
    pub fixed_version: Option<String>,
    /// 취약점 설명
    pub description: String,
    /// 참고 URL 목록 (순서 유지, 비어있을 수 있음)
    pub references: Vec<String>,
    /// CVSS v3 기본 점수 (알 수 없으면 0.0)
    pub cvss_score: f64,
}

impl fmt::Display for Vulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} {} (fixed: {})",
            self.id,
            self.severity,
            self.package,
            self.installed_version,
            self.fixed_version.as_deref().unwrap_or("N/A"),
        )
    }
}

/// 심각도별 취약점 개수 요약
///
/// 항상 [`VulnerabilitySummary::from_vulnerabilities`]로 파생됩니다.
/// 불변식: `total == critical + high + medium + low + unknown == 목록 길이`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilitySummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
    pub total: usize,
}

impl VulnerabilitySummary {
    /// 취약점 목록에서 요약을 파생합니다.
    pub fn from_vulnerabilities(vulnerabilities: &[Vulnerability]) -> Self {
        let mut summary = Self::default();
        for vuln in vulnerabilities {
            match vuln.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Unknown => summary.unknown += 1,
            }
        }
        summary.total = vulnerabilities.len();
        summary
    }
}

impl fmt::Display for VulnerabilitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total (critical: {}, high: {}, medium: {}, low: {}, unknown: {})",
            self.total, self.critical, self.high, self.medium, self.low, self.unknown,
        )
    }
}

/// 취약점 목록의 content digest를 계산합니다 (`sha256:<hex>`).
///
/// 변조/일관성 확인용 해시이며 암호학적 증명(attestation)이 아닙니다.
/// `Vec<Vulnerability>`의 JSON 직렬화는 실패하지 않습니다.
fn digest_vulnerabilities(vulnerabilities: &[Vulnerability]) -> String {
    let bytes = serde_json::to_vec(vulnerabilities).unwrap_or_default();
    format!("sha256:{}", hex::encode(Sha256::digest(&bytes)))
}

/// 단일 스캐너의 스캔 결과
///
/// 병합된 결과는 `tool`이 [`TOOL_ALL`]로 설정됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// 스캔 대상 이미지 레퍼런스
    pub image: String,
    /// 도구 메타데이터에서 추출한 이미지 digest (없으면 빈 문자열)
    pub image_digest: String,
    /// 결과를 생성한 도구 (병합 결과는 "all")
    pub tool: String,
    /// 발견된 취약점 목록
    pub vulnerabilities: Vec<Vulnerability>,
    /// 파생된 요약
    pub summary: VulnerabilitySummary,
    /// 스캔 시각
    pub scanned_at: SystemTime,
    /// 취약점 목록 직렬화의 SHA-256 해시 (변조/일관성 확인용)
    pub content_digest: String,
    /// 자유 형식 도구 메타데이터 (스캐너 버전, scan id 등)
    pub metadata: BTreeMap<String, String>,
}

impl ScanResult {
    /// 새 스캔 결과를 생성하며, summary와 content digest를 파생합니다.
    pub fn new(
        image: impl Into<String>,
        image_digest: impl Into<String>,
        tool: impl Into<String>,
        vulnerabilities: Vec<Vulnerability>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        let summary = VulnerabilitySummary::from_vulnerabilities(&vulnerabilities);
        let content_digest = digest_vulnerabilities(&vulnerabilities);
        Self {
            image: image.into(),
            image_digest: image_digest.into(),
            tool: tool.into(),
            vulnerabilities,
            summary,
            scanned_at: SystemTime::now(),
            content_digest,
            metadata,
        }
    }

    /// content digest를 재계산하여 저장된 값과 비교합니다.
    ///
    /// 불일치는 손상을 의미하며 에러로 보고됩니다. 절대 조용히 복구하지
    /// 않습니다. digest는 advisory이므로 역직렬화 경로에서 자동 호출되지
    /// 않으며, 신뢰할 수 없는 저장소에서 로드한 호출자가 명시적으로
    /// 호출해야 합니다.
    pub fn verify_content_digest(&self) -> Result<(), ScanError> {
        let computed = digest_vulnerabilities(&self.vulnerabilities);
        if computed != self.content_digest {
            return Err(ScanError::DigestMismatch {
                expected: self.content_digest.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// 병합 결과 여부를 반환합니다.
    pub fn is_merged(&self) -> bool {
        self.tool == TOOL_ALL
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScanResult({}, tool={}, {})",
            self.image, self.tool, self.summary,
        )
    }
}

/// 서명 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignResult {
    /// 서명된 이미지 digest (레퍼런스에서 추출 불가하면 빈 문자열)
    pub image_digest: String,
    /// 투명성 로그 엔트리 레퍼런스 (keyless 전용, key 방식은 None)
    pub log_entry: Option<String>,
    /// 서명 시각
    pub signed_at: SystemTime,
}

/// 검증된 서명의 인증서 정보 (keyless 전용)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// OIDC 발급자 (예: GitHub Actions)
    pub issuer: String,
    /// 서명자 identity
    pub identity: String,
}

/// 검증 결과
///
/// `verified == false`로 반환되는 일은 없습니다 — 검증 실패는 항상
/// 에러이며, 이 타입은 성공한 검증에서만 생성됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// 검증 성공 여부 (반환 시 항상 true)
    pub verified: bool,
    /// 검증된 이미지 digest
    pub image_digest: String,
    /// 인증서 정보 (keyless 전용, key 방식은 None)
    pub certificate: Option<CertificateInfo>,
    /// 검증 시각
    pub verified_at: SystemTime,
}

/// fail-open 가능 작업의 3-상태 결과
///
/// "성공 / 건너뜀(degraded) / 실패"를 명시적으로 구분합니다.
/// 실패는 감싸는 `Result`의 `Err`이며, `Skipped`는 `required = false`
/// 설정에서 실패를 허용하고 계속 진행하는 fail-open 분기입니다.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// 작업 완료
    Completed(T),
    /// fail-open으로 건너뜀 — 경고 로그 후 보증 없이 진행
    Skipped { reason: String },
}

impl<T> Outcome<T> {
    /// 건너뜀 여부를 반환합니다.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// 완료된 값을 꺼냅니다. 건너뛴 경우 None입니다.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped { .. } => None,
        }
    }
}

/// SBOM 출력 형식
///
/// 각 형식은 고정된 predicate type / attestation type 문자열 쌍에
/// 대응합니다. 이 매핑은 형식 정체성의 일부이며 외부 검증기와의
/// 상호운용을 위해 정확히 재현되어야 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SbomFormat {
    /// CycloneDX 1.x JSON
    CycloneDxJson,
    /// CycloneDX 1.x XML
    CycloneDxXml,
    /// SPDX 2.x JSON
    SpdxJson,
    /// SPDX 2.x tag-value
    SpdxTagValue,
    /// Syft 네이티브 JSON
    SyftJson,
}

impl SbomFormat {
    /// in-toto 증명의 predicate type URI를 반환합니다.
    pub fn predicate_type(&self) -> &'static str {
        match self {
            Self::CycloneDxJson | Self::CycloneDxXml => "https://cyclonedx.org/bom",
            Self::SpdxJson | Self::SpdxTagValue => "https://spdx.dev/Document",
            Self::SyftJson => "https://syft.dev/bom",
        }
    }

    /// cosign `--type` 인자로 쓰이는 attestation type을 반환합니다.
    pub fn attestation_type(&self) -> &'static str {
        match self {
            Self::CycloneDxJson | Self::CycloneDxXml => "cyclonedx",
            Self::SpdxJson => "spdxjson",
            Self::SpdxTagValue => "spdx",
            Self::SyftJson => "custom",
        }
    }

    /// SBOM 생성기(syft)의 `-o` 출력 형식 인자를 반환합니다.
    pub fn generator_output(&self) -> &'static str {
        match self {
            Self::CycloneDxJson => "cyclonedx-json",
            Self::CycloneDxXml => "cyclonedx-xml",
            Self::SpdxJson => "spdx-json",
            Self::SpdxTagValue => "spdx-tag-value",
            Self::SyftJson => "syft-json",
        }
    }

    /// 문자열에서 SBOM 형식을 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cyclonedx-json" | "cyclonedx" | "cdx-json" | "cdx" => Some(Self::CycloneDxJson),
            "cyclonedx-xml" | "cdx-xml" => Some(Self::CycloneDxXml),
            "spdx-json" | "spdxjson" => Some(Self::SpdxJson),
            "spdx" | "spdx-tag-value" => Some(Self::SpdxTagValue),
            "syft-json" | "syft" => Some(Self::SyftJson),
            _ => None,
        }
    }
}

impl fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.generator_output())
    }
}

/// SBOM 문서
///
/// 생성기 출력은 digest 계산을 제외하면 변경 없이 통과되는 불투명
/// 바이트입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sbom {
    /// SBOM 형식
    pub format: SbomFormat,
    /// 원본 내용 바이트
    pub content: Vec<u8>,
    /// 내용의 SHA-256 digest (`sha256:<hex>`)
    pub digest: String,
    /// 원본 이미지 레퍼런스
    pub image: String,
    /// 생성 도구 이름
    pub tool_name: String,
    /// 생성 도구 버전 (알 수 없으면 빈 문자열)
    pub tool_version: String,
    /// 포함된 패키지 수 (파싱 불가 형식이면 0)
    pub package_count: usize,
}

impl Sbom {
    /// 원본 내용에서 SBOM을 생성하며 digest를 파생합니다.
    pub fn new(
        format: SbomFormat,
        content: Vec<u8>,
        image: impl Into<String>,
        tool_name: impl Into<String>,
        tool_version: impl Into<String>,
        package_count: usize,
    ) -> Self {
        let digest = format!("sha256:{}", hex::encode(Sha256::digest(&content)));
        Self {
            format,
            content,
            digest,
            image: image.into(),
            tool_name: tool_name.into(),
            tool_version: tool_version.into(),
            package_count,
        }
    }
}

impl fmt::Display for Sbom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sbom(format={}, image={}, packages={})",
            self.format, self.image, self.package_count,
        )
    }
}
