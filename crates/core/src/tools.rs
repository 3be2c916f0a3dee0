//! 외부 도구 레지스트리 — 알려진 도구 선언과 설치/버전 확인
//!
//! [`ToolRegistry`]는 파이프라인이 의존하는 외부 바이너리(grype, trivy,
//! cosign, syft)의 메타데이터를 담는 호출자 소유 객체입니다. 프로세스
//! 전역 가변 상태 대신, 시작 시 명시적으로 생성되어 조회가 필요한
//! 컴포넌트에 참조로 전달됩니다.
//!
//! "도구 없음" / "도구는 있으나 너무 오래됨" / "스캔 자체 실패"는 서로
//! 독립적으로 보고 가능한 세 가지 조건입니다. [`check_installed`]와
//! [`check_version`]이 분리된 이유입니다.
//!
//! [`check_installed`]: ToolRegistry::check_installed
//! [`check_version`]: ToolRegistry::check_version

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::error::{ExecError, ToolError};
use crate::exec::run_tool;
use crate::version::Version;

/// 버전 확인 호출 타임아웃 — 버전 출력은 즉시 나와야 정상
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// 외부 도구 메타데이터
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    /// 도구 이름 (레지스트리 키)
    pub name: String,
    /// 실행 커맨드
    pub command: String,
    /// 최소 요구 버전
    pub min_version: Version,
    /// 설치 안내 URL
    pub install_url: String,
    /// 버전 출력 인자 (예: ["--version"])
    pub version_args: Vec<String>,
}

/// 외부 도구 레지스트리
///
/// 시작 시 [`ToolRegistry::with_defaults`]로 생성하여 소유권 또는
/// 참조로 전달합니다.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolMetadata>,
}

impl ToolRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파이프라인이 아는 기본 도구들이 등록된 레지스트리를 생성합니다.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ToolMetadata {
            name: "grype".to_owned(),
            command: "grype".to_owned(),
            min_version: Version::new(0, 70, 0),
            install_url: "https://github.com/anchore/grype#installation".to_owned(),
            version_args: vec!["--version".to_owned()],
        });
        registry.register(ToolMetadata {
            name: "trivy".to_owned(),
            command: "trivy".to_owned(),
            min_version: Version::new(0, 45, 0),
            install_url: "https://trivy.dev/latest/getting-started/installation/".to_owned(),
            version_args: vec!["--version".to_owned()],
        });
        registry.register(ToolMetadata {
            name: "cosign".to_owned(),
            command: "cosign".to_owned(),
            min_version: Version::new(2, 0, 0),
            install_url: "https://docs.sigstore.dev/cosign/system_config/installation/".to_owned(),
            version_args: vec!["version".to_owned()],
        });
        registry.register(ToolMetadata {
            name: "syft".to_owned(),
            command: "syft".to_owned(),
            min_version: Version::new(0, 90, 0),
            install_url: "https://github.com/anchore/syft#installation".to_owned(),
            version_args: vec!["--version".to_owned()],
        });
        registry
    }

    /// 도구를 등록합니다. 같은 이름이 이미 있으면 교체합니다.
    pub fn register(&mut self, metadata: ToolMetadata) {
        self.tools.insert(metadata.name.clone(), metadata);
    }

    /// 이름으로 도구 메타데이터를 조회합니다.
    pub fn get(&self, name: &str) -> Option<&ToolMetadata> {
        self.tools.get(name)
    }

    /// 등록된 도구 이름 목록을 반환합니다.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// 도구 바이너리가 실행 가능한지 확인합니다.
    ///
    /// 버전 출력 호출이 0이 아닌 코드로 끝나도 바이너리는 존재하는
    /// 것이므로 설치된 것으로 간주합니다.
    pub async fn check_installed(&self, name: &str) -> Result<(), ToolError> {
        let meta = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            tool: name.to_owned(),
        })?;

        match self.run_version_command(meta).await {
            Ok(_) | Err(ExecError::NonZeroExit { .. }) => Ok(()),
            Err(ExecError::NotFound { .. }) => Err(ToolError::NotInstalled {
                tool: meta.name.clone(),
                install_url: meta.install_url.clone(),
            }),
            Err(e) => Err(ToolError::VersionCheckFailed {
                tool: meta.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// 설치된 버전을 확인하고 최소 요구 버전과 비교합니다.
    pub async fn check_version(&self, name: &str) -> Result<Version, ToolError> {
        let meta = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            tool: name.to_owned(),
        })?;

        let output = self.run_version_command(meta).await.map_err(|e| match e {
            ExecError::NotFound { .. } => ToolError::NotInstalled {
                tool: meta.name.clone(),
                install_url: meta.install_url.clone(),
            },
            other => ToolError::VersionCheckFailed {
                tool: meta.name.clone(),
                reason: other.to_string(),
            },
        })?;

        let installed = extract_version(&output).ok_or_else(|| ToolError::VersionCheckFailed {
            tool: meta.name.clone(),
            reason: format!("no version found in output: {}", truncate_line(&output)),
        })?;

        debug!(tool = %meta.name, version = %installed, "tool version detected");

        if !installed.meets_minimum(&meta.min_version) {
            return Err(ToolError::VersionTooOld {
                tool: meta.name.clone(),
                installed: installed.to_string(),
                minimum: meta.min_version.to_string(),
            });
        }

        Ok(installed)
    }

    /// 활성화된 보안 설정이 암시하는 모든 도구를 확인합니다.
    ///
    /// 개별 실패에서 중단하지 않고 모든 실패를 수집합니다 — 호출자가
    /// 문제 전체를 한 번에 볼 수 있어야 하기 때문입니다. required가
    /// 아닌 도구의 실패는 경고만 남기고 호출을 실패시키지 않습니다.
    pub async fn check_all_tools(&self, config: &SecurityConfig) -> Result<(), ToolError> {
        let mut failures = Vec::new();

        for (tool, required) in implied_tools(config) {
            match self.check_version(&tool).await {
                Ok(_) => {}
                Err(e) if required => failures.push(format!("{tool}: {e}")),
                Err(e) => {
                    warn!(tool = %tool, error = %e, "optional tool unavailable");
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ToolError::Unavailable { failures })
        }
    }

    async fn run_version_command(&self, meta: &ToolMetadata) -> Result<String, ExecError> {
        let cancel = CancellationToken::new();
        let output = run_tool(
            &meta.name,
            &meta.command,
            &meta.version_args,
            &[],
            VERSION_CHECK_TIMEOUT,
            &cancel,
        )
        .await?;
        // 일부 도구(trivy 등)는 버전을 stderr에 쓴다
        Ok(format!("{}\n{}", output.stdout_string(), output.stderr))
    }
}

/// 활성화된 설정이 암시하는 (도구, required) 목록을 중복 없이 수집합니다.
///
/// cosign이 서명과 SBOM 첨부 양쪽에서 필요한 경우, 하나라도 required면
/// required로 취급합니다.
fn implied_tools(config: &SecurityConfig) -> Vec<(String, bool)> {
    let mut tools: Vec<(String, bool)> = Vec::new();
    let mut push = |name: &str, required: bool| {
        if let Some(existing) = tools.iter_mut().find(|(n, _)| n == name) {
            existing.1 = existing.1 || required;
        } else {
            tools.push((name.to_owned(), required));
        }
    };

    if config.scan.enabled {
        for tool in &config.scan.tools {
            push(tool, config.scan.required);
        }
    }
    if config.signing.enabled {
        push("cosign", config.signing.required);
    }
    if config.sbom.enabled {
        push("syft", config.sbom.required);
        if config.sbom.attach {
            push("cosign", config.sbom.required);
        }
    }

    tools
}

/// 버전 출력에서 첫 번째 버전 형태 토큰을 추출합니다.
///
/// "grype 0.74.1", "Version: 0.48.0", "GitVersion:    v2.2.3" 같은
/// 다양한 출력 형태를 처리합니다.
fn extract_version(output: &str) -> Option<Version> {
    output
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .filter(|token| !token.is_empty())
        .find_map(|token| Version::parse(token).ok())
}

fn truncate_line(s: &str) -> String {
    let line = s.lines().next().unwrap_or("");
    line.chars().take(120).collect()
}
