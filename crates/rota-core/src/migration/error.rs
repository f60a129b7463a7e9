//! 마이그레이션 파싱/검증 에러 타입.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// 발췌문 최대 길이 (문자 수)
const MAX_EXCERPT_CHARS: usize = 200;

/// SQL을 문장 단위로 나눌 수 없을 때의 에러.
///
/// 기본 설정에서는 발생하지 않으며, `ParseOptions::strict`일 때
/// 닫히지 않은 달러 인용/문자열에 대해서만 반환됩니다.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{migration_file}{}: {message}{}", line_suffix(.line), syntax_suffix(.syntax))]
pub struct MigrationParseError {
    /// 에러 설명
    pub message: String,
    /// 대상 마이그레이션 파일
    pub migration_file: String,
    /// 문제 구간 시작 라인 (1-based)
    pub line: Option<usize>,
    /// 문제 구간 발췌
    pub syntax: Option<String>,
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(":{}", l)).unwrap_or_default()
}

fn syntax_suffix(syntax: &Option<String>) -> String {
    syntax
        .as_ref()
        .map(|s| format!(" (near `{}`)", s))
        .unwrap_or_default()
}

/// 의존성 검증 실패 항목.
///
/// 검증기는 이 값을 던지지 않고 `ValidationResult::errors`에 모아서 반환합니다.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationValidationError {
    /// 참조 테이블이 어디에도 없음
    #[error(
        "{migration_file}: table `{dependent_table}` (statement #{statement_index}) references missing table `{missing_table}`; create `{missing_table}` before `{dependent_table}`, or move `{missing_table}`'s creation to an earlier migration"
    )]
    MissingTable {
        migration_file: String,
        dependent_table: String,
        missing_table: String,
        statement_index: usize,
    },

    /// 참조 테이블이 이후 마이그레이션에서 생성됨
    #[error(
        "{migration_file}: table `{dependent_table}` (statement #{statement_index}) references `{referenced_table}`, which is not created until later migration {defined_in}; move `{referenced_table}`'s creation to an earlier migration than {migration_file}"
    )]
    ForwardReference {
        migration_file: String,
        dependent_table: String,
        referenced_table: String,
        defined_in: String,
        statement_index: usize,
    },

    /// 파일 내 순환 의존성
    #[error(
        "{migration_file}: circular dependency detected at table `{table}` (statement #{statement_index}); break the cycle by adding one of the foreign keys with ALTER TABLE after both tables exist"
    )]
    CircularDependency {
        migration_file: String,
        table: String,
        statement_index: usize,
    },
}

impl MigrationValidationError {
    /// 에러가 발생한 마이그레이션 파일
    pub fn migration_file(&self) -> &str {
        match self {
            Self::MissingTable { migration_file, .. }
            | Self::ForwardReference { migration_file, .. }
            | Self::CircularDependency { migration_file, .. } => migration_file,
        }
    }

    /// 문제의 원인이 된 테이블 (누락/미래 참조/순환 지점)
    pub fn table(&self) -> &str {
        match self {
            Self::MissingTable { missing_table, .. } => missing_table,
            Self::ForwardReference {
                referenced_table, ..
            } => referenced_table,
            Self::CircularDependency { table, .. } => table,
        }
    }

    /// 의존성을 도입한 문장 순번
    pub fn statement_index(&self) -> usize {
        match self {
            Self::MissingTable {
                statement_index, ..
            }
            | Self::ForwardReference {
                statement_index, ..
            }
            | Self::CircularDependency {
                statement_index, ..
            } => *statement_index,
        }
    }
}

/// 마이그레이션 처리 에러
#[derive(Debug, Error)]
pub enum MigrationError {
    /// 문장 분리 실패
    #[error("migration parse failed: {0}")]
    Parse(#[from] MigrationParseError),

    /// 의존성 검증 실패 (수집된 모든 에러 포함)
    #[error("migration {migration_file} failed dependency validation ({} error(s)): {}", .errors.len(), join_errors(.errors))]
    Validation {
        migration_file: String,
        errors: Vec<MigrationValidationError>,
    },

    /// 파일 I/O 실패
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_errors(errors: &[MigrationValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, MigrationError>;

/// 에러 메시지용 SQL 발췌 (공백 정리, 길이 제한)
pub fn sql_excerpt(sql: &str) -> String {
    let trimmed = sql.trim();

    let mut out = String::with_capacity(trimmed.len().min(MAX_EXCERPT_CHARS) + 3);
    for (i, ch) in trimmed.chars().enumerate() {
        if i >= MAX_EXCERPT_CHARS {
            out.push_str("...");
            break;
        }

        match ch {
            '\n' | '\r' | '\t' => out.push(' '),
            _ => out.push(ch),
        }
    }

    out
}
