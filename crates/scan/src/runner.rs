//! 동시 스캔 실행기
//!
//! 설정된 스캐너들을 하나의 이미지에 대해 병렬로 실행하고, 결과를
//! 병합한 뒤 정책을 판정합니다. 스캐너 간 데이터 의존성이 없으므로
//! 각 스캐너는 독립 tokio task로 실행됩니다.
//!
//! 스캔 실패는 항상 에러로 표면화됩니다. 서명/SBOM과 달리 스캔에는
//! fail-open 경로가 없습니다.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use shipgate_core::config::SecurityConfig;
use shipgate_core::metrics::{
    LABEL_TOOL, SCAN_COMPLETED_TOTAL, SCAN_DURATION_SECONDS, SCAN_FAILURES_TOTAL,
    SCAN_VULNS_FOUND_TOTAL,
};
use shipgate_core::tools::ToolRegistry;
use shipgate_core::types::{ScanResult, Severity};

use crate::adapter::{Scanner, ScannerAdapter};
use crate::error::ScannerError;
use crate::merge::merge_results;
use crate::policy::PolicyEnforcer;

/// [`ScanRunner`] 빌더
#[derive(Debug, Default)]
pub struct ScanRunnerBuilder {
    config: Option<SecurityConfig>,
    registry: Option<ToolRegistry>,
    cancel: Option<CancellationToken>,
}

impl ScanRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: SecurityConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// 러너를 생성합니다.
    ///
    /// 스캔이 비활성화되어 있거나 설정된 도구 이름이 알려진 스캐너가
    /// 아니면 에러입니다.
    pub fn build(self) -> Result<ScanRunner, ScannerError> {
        let config = self.config.ok_or_else(|| ScannerError::Config {
            field: "scan".to_string(),
            reason: "config is required".to_string(),
        })?;
        if !config.scan.enabled {
            return Err(ScannerError::Config {
                field: "scan.enabled".to_string(),
                reason: "scanning is disabled".to_string(),
            });
        }

        // 임계값 오타는 "차단 없음"으로 조용히 해석되면 안 된다. 외부
        // 호출 전에 거부한다.
        for (field, value) in [
            ("scan.fail_on", &config.scan.fail_on),
            ("scan.warn_on", &config.scan.warn_on),
        ] {
            if !value.is_empty() && Severity::from_str_loose(value).is_none() {
                return Err(ScannerError::Config {
                    field: field.to_string(),
                    reason: format!("'{value}' is not a severity"),
                });
            }
        }

        let mut scanners = Vec::new();
        for name in &config.scan.tools {
            let scanner = Scanner::from_name(name).ok_or_else(|| ScannerError::Config {
                field: "scan.tools".to_string(),
                reason: format!("unknown scanner '{name}'"),
            })?;
            if !scanners
                .iter()
                .any(|s: &Scanner| s.name() == scanner.name())
            {
                scanners.push(scanner);
            }
        }
        if scanners.is_empty() {
            return Err(ScannerError::Config {
                field: "scan.tools".to_string(),
                reason: "no scanners configured".to_string(),
            });
        }

        Ok(ScanRunner {
            enforcer: PolicyEnforcer::from_config(&config.scan),
            timeout: Duration::from_secs(config.scan.timeout_secs),
            config,
            scanners,
            registry: self.registry.unwrap_or_else(ToolRegistry::with_defaults),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// 설정된 스캐너들을 소유하는 동시 스캔 실행기
#[derive(Debug)]
pub struct ScanRunner {
    config: SecurityConfig,
    scanners: Vec<Scanner>,
    enforcer: PolicyEnforcer,
    timeout: Duration,
    registry: ToolRegistry,
    cancel: CancellationToken,
}

impl ScanRunner {
    pub fn builder() -> ScanRunnerBuilder {
        ScanRunnerBuilder::new()
    }

    /// 설정된 스캐너 이름 목록
    pub fn scanner_names(&self) -> Vec<&'static str> {
        self.scanners.iter().map(|s| s.name()).collect()
    }

    /// 이미지를 모든 스캐너로 병렬 스캔하고 병합 결과를 반환합니다.
    ///
    /// 어느 스캐너라도 실패하면 전체가 에러입니다.
    pub async fn scan(&self, image: &str) -> Result<Option<ScanResult>, ScannerError> {
        self.registry.check_all_tools(&self.config).await?;

        let scan_id = uuid::Uuid::new_v4().to_string();
        info!(image, scan_id, scanners = ?self.scanner_names(), "starting scan");

        // 스캐너 하나가 실패하면 형제 스캔도 즉시 중단되어야 한다.
        // 이번 실행 전용 child 토큰으로 fan-out하고, 실패를 보는 즉시
        // 취소한다. 호출자의 토큰은 건드리지 않는다.
        let run_cancel = self.cancel.child_token();

        let mut handles = Vec::with_capacity(self.scanners.len());
        for scanner in &self.scanners {
            let scanner = scanner.clone();
            let image = image.to_string();
            let timeout = self.timeout;
            let cancel = run_cancel.clone();
            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let result = scanner.scan(&image, timeout, &cancel).await;
                (scanner.name(), started.elapsed(), result)
            }));
        }

        // 모든 핸들을 끝까지 기다린다. JoinHandle을 drop하면 태스크가
        // 분리되어 자식 프로세스가 계속 실행되기 때문이다. 첫 에러를
        // 보존하고 나머지는 취소된 채로 배수한다.
        let mut results = Vec::with_capacity(handles.len());
        let mut first_err: Option<ScannerError> = None;
        for handle in handles {
            let (tool, elapsed, result) = match handle.await {
                Ok(finished) => finished,
                Err(e) => {
                    run_cancel.cancel();
                    first_err.get_or_insert(ScannerError::TaskFailed(e.to_string()));
                    continue;
                }
            };
            metrics::histogram!(SCAN_DURATION_SECONDS, LABEL_TOOL => tool)
                .record(elapsed.as_secs_f64());
            match result {
                Ok(result) => {
                    metrics::counter!(SCAN_COMPLETED_TOTAL, LABEL_TOOL => tool).increment(1);
                    metrics::counter!(SCAN_VULNS_FOUND_TOTAL, LABEL_TOOL => tool)
                        .increment(result.summary.total as u64);
                    debug!(
                        tool,
                        total = result.summary.total,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "scanner finished"
                    );
                    results.push(result);
                }
                Err(e) => {
                    metrics::counter!(SCAN_FAILURES_TOTAL, LABEL_TOOL => tool).increment(1);
                    run_cancel.cancel();
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        let mut merged = merge_results(results);
        if let Some(result) = merged.as_mut() {
            result.metadata.insert("scan_id".to_owned(), scan_id);
        }
        Ok(merged)
    }

    /// 스캔 후 정책까지 판정합니다.
    ///
    /// 통과하면 병합 결과를 반환하고, 임계값 위반이면
    /// [`ScannerError::Policy`]입니다.
    pub async fn scan_and_enforce(&self, image: &str) -> Result<Option<ScanResult>, ScannerError> {
        let merged = self.scan(image).await?;
        self.enforcer.enforce(merged.as_ref())?;
        Ok(merged)
    }
}
