//! 시맨틱 버전 비교 — 도구 최소 버전 준수 확인
//!
//! 외부 스캐너/서명 도구의 `--version` 출력에서 뽑은 버전 문자열을
//! 파싱하고 비교합니다. 도구들이 완전한 SemVer를 따르지 않는 경우가
//! 있어(`v0.74`처럼 patch 생략) 최소 `major.minor`만 요구합니다.
//!
//! # 전순서
//!
//! 숫자 필드는 일반 비교, pre-release 태그가 있는 버전은 같은 숫자의
//! 릴리스 버전보다 항상 아래, 두 pre-release 태그는 사전순 비교.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// 시맨틱 버전
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// pre-release 태그 (릴리스 버전이면 빈 문자열)
    pub pre: String,
}

impl Version {
    /// 릴리스 버전을 생성합니다.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: String::new(),
        }
    }

    /// pre-release 태그가 붙은 버전을 생성합니다.
    pub fn with_pre(major: u64, minor: u64, patch: u64, pre: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: pre.into(),
        }
    }

    /// 버전 문자열을 파싱합니다.
    ///
    /// 선행 `v`를 허용하고, 최소 `major.minor`를 요구하며(patch 생략 시 0),
    /// 하이픈 뒤의 pre-release 접미사를 허용합니다. 이 형태에 맞지 않는
    /// 입력은 파싱 에러이며, 절대 best-effort 추측을 하지 않습니다.
    pub fn parse(input: &str) -> Result<Self, ToolError> {
        let trimmed = input.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let (numbers, pre) = match body.split_once('-') {
            Some((numbers, pre)) => {
                if pre.is_empty() {
                    return Err(ToolError::VersionParse {
                        input: input.to_owned(),
                        reason: "empty pre-release tag after hyphen".to_owned(),
                    });
                }
                (numbers, pre)
            }
            None => (body, ""),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(ToolError::VersionParse {
                input: input.to_owned(),
                reason: format!(
                    "expected major.minor[.patch], got {} component(s)",
                    parts.len()
                ),
            });
        }

        let mut fields = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            fields[i] = part.parse().map_err(|_| ToolError::VersionParse {
                input: input.to_owned(),
                reason: format!("non-numeric component '{part}'"),
            })?;
        }

        Ok(Self {
            major: fields[0],
            minor: fields[1],
            patch: fields[2],
            pre: pre.to_owned(),
        })
    }

    /// 두 버전을 비교하여 세 값 결과를 반환합니다.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    /// 이 버전이 최소 요구 버전 이상인지 반환합니다.
    pub fn meets_minimum(&self, minimum: &Self) -> bool {
        self >= minimum
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                // pre-release는 같은 숫자의 릴리스보다 아래
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pre.is_empty() {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        } else {
            write!(f, "{}.{}.{}-{}", self.major, self.minor, self.patch, self.pre)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_leading_v() {
        let v = Version::parse("v2.0.1").unwrap();
        assert_eq!(v, Version::new(2, 0, 1));
    }

    #[test]
    fn parse_with_prerelease() {
        let v = Version::parse("1.2.3-beta.1").unwrap();
        assert_eq!(v, Version::with_pre(1, 2, 3, "beta.1"));
    }

    #[test]
    fn parse_major_minor_only() {
        let v = Version::parse("0.74").unwrap();
        assert_eq!(v, Version::new(0, 74, 0));
    }

    #[test]
    fn parse_invalid_inputs() {
        assert!(Version::parse("invalid").is_err());
        assert!(Version::parse("1").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("1.x.3").is_err());
        assert!(Version::parse("1.2.3-").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn prerelease_orders_below_release() {
        let pre = Version::with_pre(1, 2, 3, "beta");
        let release = Version::new(1, 2, 3);
        assert_eq!(pre.compare(&release), Ordering::Less);
        assert_eq!(release.compare(&pre), Ordering::Greater);
    }

    #[test]
    fn prerelease_tags_compare_lexicographically() {
        let alpha = Version::with_pre(1, 0, 0, "alpha");
        let beta = Version::with_pre(1, 0, 0, "beta");
        assert_eq!(alpha.compare(&beta), Ordering::Less);
        assert_eq!(beta.compare(&beta.clone()), Ordering::Equal);
    }

    #[test]
    fn numeric_ordering() {
        assert_eq!(
            Version::new(1, 3, 0).compare(&Version::new(1, 2, 9)),
            Ordering::Greater
        );
        assert_eq!(
            Version::new(2, 0, 0).compare(&Version::new(1, 99, 99)),
            Ordering::Greater
        );
    }

    #[test]
    fn meets_minimum() {
        assert!(Version::new(1, 3, 0).meets_minimum(&Version::new(1, 2, 3)));
        assert!(!Version::new(1, 2, 0).meets_minimum(&Version::new(1, 2, 3)));
        assert!(Version::new(1, 2, 3).meets_minimum(&Version::new(1, 2, 3)));
        // pre-release는 최소 요구 릴리스를 만족하지 못함
        assert!(!Version::with_pre(1, 2, 3, "rc.1").meets_minimum(&Version::new(1, 2, 3)));
    }

    #[test]
    fn display_roundtrip() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(Version::with_pre(1, 2, 3, "beta.1").to_string(), "1.2.3-beta.1");
        let v = Version::parse("v0.48.0").unwrap();
        assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
    }
}
