//! SBOM 생성, 첨부, 검증
//!
//! syft로 SBOM을 생성하고 cosign attestation으로 이미지에
//! 부착/검증합니다. SBOM 내용 자체는 불투명 바이트로 취급하며,
//! 파이프라인은 digest와 형식 메타데이터만 해석합니다.
//!
//! 첨부(쓰기 경로)는 `sbom.required`에 따라 fail-open이 가능하지만,
//! 검증(읽기 경로)은 항상 fail-closed입니다.

use base64::Engine;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use shipgate_core::config::SbomConfig;
use shipgate_core::exec::run_tool;
use shipgate_core::metrics::{LABEL_RESULT, SBOM_ATTACH_TOTAL, SBOM_GENERATED_TOTAL};
use shipgate_core::types::{Outcome, Sbom, SbomFormat};

use crate::error::AttestError;
use crate::signer::{CosignSigner, fail_open, materialize_key};

/// SBOM 생성기/첨부기/검증기
///
/// 첨부와 검증은 서명자와 같은 키/keyless 설정을 공유하므로
/// [`CosignSigner`]를 내장합니다.
#[derive(Debug, Clone)]
pub struct SbomManager {
    config: SbomConfig,
    signer: CosignSigner,
}

impl SbomManager {
    pub fn new(config: SbomConfig, signer: CosignSigner) -> Self {
        Self { config, signer }
    }

    pub fn config(&self) -> &SbomConfig {
        &self.config
    }

    /// syft로 이미지의 SBOM을 생성합니다.
    ///
    /// 패키지 수와 도구 버전은 best-effort 메타데이터입니다. JSON이
    /// 아닌 형식이거나 필드가 없으면 각각 0과 빈 문자열이며 에러가
    /// 아닙니다.
    pub async fn generate(
        &self,
        image: &str,
        format: SbomFormat,
        cancel: &CancellationToken,
    ) -> Result<Sbom, AttestError> {
        let args = vec![
            image.to_owned(),
            "-o".to_owned(),
            format.generator_output().to_owned(),
        ];
        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        let output = match run_tool("syft", "syft", &args, &[], timeout, cancel).await {
            Ok(output) => output,
            Err(e) => {
                metrics::counter!(SBOM_GENERATED_TOTAL, LABEL_RESULT => "error").increment(1);
                return Err(AttestError::Exec(e));
            }
        };

        if output.stdout.is_empty() {
            metrics::counter!(SBOM_GENERATED_TOTAL, LABEL_RESULT => "error").increment(1);
            return Err(AttestError::SbomGenerate {
                image: image.to_owned(),
                reason: "generator produced empty output".to_owned(),
            });
        }

        let (package_count, tool_version) = inspect_content(format, &output.stdout);
        let sbom = Sbom::new(
            format,
            output.stdout,
            image,
            "syft",
            tool_version,
            package_count,
        );
        metrics::counter!(SBOM_GENERATED_TOTAL, LABEL_RESULT => "ok").increment(1);
        info!(image, format = %format, packages = sbom.package_count, "sbom generated");
        Ok(sbom)
    }

    /// SBOM을 서명된 attestation으로 이미지에 부착합니다.
    ///
    /// 서명과 동일한 key/keyless 플래그를 사용하며, 실패 시
    /// `sbom.required`에 따라 건너뛰기 또는 에러입니다.
    pub async fn attach(
        &self,
        sbom: &Sbom,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome<()>, AttestError> {
        match self.run_attach(sbom, image, cancel).await {
            Ok(()) => {
                metrics::counter!(SBOM_ATTACH_TOTAL, LABEL_RESULT => "ok").increment(1);
                info!(image, format = %sbom.format, "sbom attestation attached");
                Ok(Outcome::Completed(()))
            }
            Err(e) => {
                metrics::counter!(SBOM_ATTACH_TOTAL, LABEL_RESULT => "error").increment(1);
                fail_open(self.config.required, "sbom-attach", e)
            }
        }
    }

    async fn run_attach(
        &self,
        sbom: &Sbom,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<(), AttestError> {
        let mut predicate = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut predicate, &sbom.content)?;

        let signing = self.signer.config();
        let mut args = vec![
            "attest".to_owned(),
            "--yes".to_owned(),
            "--predicate".to_owned(),
            predicate.path().to_string_lossy().into_owned(),
            "--type".to_owned(),
            sbom.format.attestation_type().to_owned(),
        ];
        let mut envs = Vec::new();
        let _key_file = if signing.keyless {
            args.push("--oidc-issuer".to_owned());
            args.push(signing.oidc_issuer.clone());
            None
        } else {
            let (key_ref, file) = materialize_key(&signing.private_key)?;
            args.push("--key".to_owned());
            args.push(key_ref);
            if !signing.password.is_empty() {
                envs.push(("COSIGN_PASSWORD".to_owned(), signing.password.clone()));
            }
            file
        };
        args.push(image.to_owned());

        run_tool(
            "cosign",
            "cosign",
            &args,
            &envs,
            self.signer.operation_timeout(),
            cancel,
        )
        .await?;
        Ok(())
    }

    /// 이미지에 부착된 SBOM attestation을 검증하고 내용을 꺼냅니다.
    ///
    /// DSSE envelope의 payload를 디코딩해 in-toto statement의
    /// `predicateType`이 요청한 형식과 일치하는지 확인합니다. 검증
    /// 실패 시 부분 내용을 반환하지 않으며 fail-open도 없습니다.
    pub async fn verify(
        &self,
        image: &str,
        format: SbomFormat,
        cancel: &CancellationToken,
    ) -> Result<Sbom, AttestError> {
        let (mut args, _key_file) = self.signer.verify_args()?;
        args.insert(0, "verify-attestation".to_owned());
        args.insert(1, "--type".to_owned());
        args.insert(2, format.attestation_type().to_owned());
        args.push(image.to_owned());

        let output = run_tool(
            "cosign",
            "cosign",
            &args,
            &[],
            self.signer.operation_timeout(),
            cancel,
        )
        .await?;

        let content = extract_predicate(format, &output.stdout)?;
        debug!(image, format = %format, bytes = content.len(), "sbom attestation verified");

        let (package_count, tool_version) = inspect_content(format, &content);
        Ok(Sbom::new(
            format,
            content,
            image,
            "syft",
            tool_version,
            package_count,
        ))
    }
}

/// JSON 형식 SBOM에서 패키지 수와 생성 도구 버전을 추출합니다.
///
/// CycloneDX는 `components`, SPDX JSON은 `packages`, syft JSON은
/// `artifacts` 배열을 셉니다. 텍스트 형식(XML, tag-value)은 0입니다.
fn inspect_content(format: SbomFormat, content: &[u8]) -> (usize, String) {
    let Ok(doc) = serde_json::from_slice::<serde_json::Value>(content) else {
        return (0, String::new());
    };

    let count_key = match format {
        SbomFormat::CycloneDxJson => "components",
        SbomFormat::SpdxJson => "packages",
        SbomFormat::SyftJson => "artifacts",
        SbomFormat::CycloneDxXml | SbomFormat::SpdxTagValue => return (0, String::new()),
    };
    let package_count = doc
        .get(count_key)
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0);

    // syft JSON만 생성기 버전을 담는다
    let tool_version = doc
        .pointer("/descriptor/version")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned();

    (package_count, tool_version)
}

/// `cosign verify-attestation` 출력에서 SBOM 내용을 꺼냅니다.
///
/// 출력은 줄 단위 DSSE envelope입니다. 첫 envelope의 base64 payload를
/// 디코딩하면 in-toto statement가 나오고, 그 `predicate`가 SBOM
/// 문서입니다. JSON이 아닌 형식은 cosign이 `{"Data": "..."}` 래퍼로
/// 감싸므로 풀어서 반환합니다.
fn extract_predicate(format: SbomFormat, stdout: &[u8]) -> Result<Vec<u8>, AttestError> {
    let text = String::from_utf8_lossy(stdout);
    let first_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| AttestError::AttestationParse("empty verification output".to_owned()))?;

    let envelope: DsseEnvelope = serde_json::from_str(first_line)
        .map_err(|e| AttestError::AttestationParse(format!("invalid envelope: {e}")))?;
    if envelope.signatures.is_empty() {
        return Err(AttestError::AttestationParse(
            "envelope has no signatures".to_owned(),
        ));
    }

    let payload = base64::engine::general_purpose::STANDARD
        .decode(&envelope.payload)
        .map_err(|e| AttestError::AttestationParse(format!("invalid payload encoding: {e}")))?;
    let statement: InTotoStatement = serde_json::from_slice(&payload)
        .map_err(|e| AttestError::AttestationParse(format!("invalid in-toto statement: {e}")))?;

    if statement.predicate_type != format.predicate_type() {
        return Err(AttestError::PredicateMismatch {
            expected: format.predicate_type().to_owned(),
            actual: statement.predicate_type,
        });
    }

    // 텍스트 형식 SBOM은 Data 래퍼 안에 원본 문자열로 들어 있다
    if let Some(data) = statement.predicate.get("Data").and_then(|v| v.as_str()) {
        return Ok(data.as_bytes().to_vec());
    }
    serde_json::to_vec(&statement.predicate)
        .map_err(|e| AttestError::AttestationParse(format!("unserializable predicate: {e}")))
}

#[derive(Debug, Deserialize)]
struct DsseEnvelope {
    #[serde(rename = "payloadType", default)]
    #[allow(dead_code)]
    payload_type: String,
    payload: String,
    #[serde(default)]
    signatures: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct InTotoStatement {
    #[serde(rename = "predicateType")]
    predicate_type: String,
    predicate: serde_json::Value,
}
