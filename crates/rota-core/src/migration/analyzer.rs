//! SQL 마이그레이션 파일 파서.
//!
//! 문장 분리기와 분류기를 파일 전체에 적용해 [`MigrationFile`]을 만듭니다.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::classifier::classify;
use super::error::{sql_excerpt, MigrationError, MigrationParseError, Result};
use super::models::{MigrationFile, Statement, TableDependency};
use super::splitter::{split, SplitOutput};

/// 파싱 옵션
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// 닫히지 않은 달러 인용/문자열/괄호를 에러로 처리
    ///
    /// 기본값(false)에서는 남은 내용 전체를 한 문장으로 취급하고 경고만 남깁니다.
    pub strict: bool,
}

/// 마이그레이션 파일 분석기
#[derive(Debug, Clone, Default)]
pub struct MigrationAnalyzer {
    options: ParseOptions,
}

impl MigrationAnalyzer {
    /// 기본 옵션으로 분석기 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 옵션을 지정해 분석기 생성
    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    /// 디렉토리의 `*.sql` 파일을 파싱해 파일명 오름차순으로 반환
    pub fn scan_directory(&self, dir: &Path) -> Result<Vec<MigrationFile>> {
        let entries = fs::read_dir(dir).map_err(|source| MigrationError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MigrationError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "sql") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(self.parse_file(&path)?);
        }

        debug!(dir = %dir.display(), files = files.len(), "마이그레이션 디렉토리 스캔 완료");
        Ok(files)
    }

    /// 단일 마이그레이션 파일 읽기 및 파싱
    pub fn parse_file(&self, path: &Path) -> Result<MigrationFile> {
        let content = fs::read_to_string(path).map_err(|source| MigrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown.sql");

        Ok(self.parse_migration_file(filename, &content)?)
    }

    /// 마이그레이션 파일 내용 파싱
    pub fn parse_migration_file(
        &self,
        filename: &str,
        content: &str,
    ) -> std::result::Result<MigrationFile, MigrationParseError> {
        let SplitOutput {
            statements: raw,
            unterminated,
        } = split(content);

        if let Some(open) = unterminated {
            // 열린 구간은 항상 마지막 문장에 포함됨
            let excerpt = raw.last().map(|s| sql_excerpt(&s.sql));
            if self.options.strict {
                return Err(MigrationParseError {
                    message: open.describe(),
                    migration_file: filename.to_string(),
                    line: Some(open.line()),
                    syntax: excerpt,
                });
            }
            warn!(
                file = filename,
                line = open.line(),
                "{} - 파일 끝까지 한 문장으로 처리",
                open.describe()
            );
        }

        let statements: Vec<Statement> = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let c = classify(&raw.sql);
                Statement {
                    sql: raw.sql,
                    statement_type: c.statement_type,
                    table_name: c.table_name,
                    dependencies: c.references,
                    original_index: index,
                    line: raw.line,
                }
            })
            .collect();

        let tables_created: BTreeSet<String> = statements
            .iter()
            .filter(|s| s.statement_type.is_create_table())
            .filter_map(|s| s.table_name.clone())
            .collect();

        let dependencies = detect_dependencies(&statements);

        debug!(
            file = filename,
            statements = statements.len(),
            tables = tables_created.len(),
            edges = dependencies.len(),
            "마이그레이션 파싱 완료"
        );

        Ok(MigrationFile {
            filename: filename.to_string(),
            statements,
            tables_created,
            dependencies,
        })
    }
}

/// 기본 옵션으로 마이그레이션 파일 내용 파싱
pub fn parse_migration_file(
    filename: &str,
    content: &str,
) -> std::result::Result<MigrationFile, MigrationParseError> {
    MigrationAnalyzer::new().parse_migration_file(filename, content)
}

/// 문장 목록에서 테이블 의존성 엣지 추출
///
/// 엣지는 항상 그것을 도입한 문장의 대상 테이블에 고정됩니다.
pub fn detect_dependencies(statements: &[Statement]) -> Vec<TableDependency> {
    statements
        .iter()
        .filter_map(|stmt| stmt.table_name.as_ref().map(|table| (stmt, table)))
        .flat_map(|(stmt, table)| {
            stmt.dependencies
                .iter()
                .map(move |dep| TableDependency::foreign_key(table, dep, stmt.original_index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::models::{DependencyType, StatementType};

    const SCHEMA: &str = r#"
-- 003: overrides
CREATE TABLE IF NOT EXISTS rotations (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE overrides (
    id SERIAL PRIMARY KEY,
    rotation_id INTEGER NOT NULL REFERENCES rotations(id),
    approved_by INTEGER REFERENCES users(id)
);

CREATE INDEX idx_overrides_rotation ON overrides (rotation_id);

ALTER TABLE overrides ADD CONSTRAINT fk_requester FOREIGN KEY (requested_by) REFERENCES users(id);

CREATE OR REPLACE FUNCTION touch_updated_at() RETURNS trigger AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DO $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'shift_kind') THEN
        CREATE TYPE shift_kind AS ENUM ('primary', 'secondary');
    END IF;
END $$;
"#;

    #[test]
    fn test_parse_migration_file() {
        let file = parse_migration_file("003_overrides.sql", SCHEMA).unwrap();

        let types: Vec<_> = file.statements.iter().map(|s| s.statement_type).collect();
        assert_eq!(
            types,
            vec![
                StatementType::CreateTable,
                StatementType::CreateTable,
                StatementType::CreateIndex,
                StatementType::AlterTable,
                StatementType::CreateFunction,
                StatementType::DoBlock,
            ]
        );
        for (i, stmt) in file.statements.iter().enumerate() {
            assert_eq!(stmt.original_index, i);
        }
        assert_eq!(file.statements[0].line, 3);
        assert_eq!(
            file.tables_created.iter().cloned().collect::<Vec<_>>(),
            vec!["overrides", "rotations"]
        );
    }

    #[test]
    fn test_dependencies_are_anchored_to_statements() {
        let file = parse_migration_file("003_overrides.sql", SCHEMA).unwrap();

        let edges: Vec<_> = file
            .dependencies
            .iter()
            .map(|d| {
                (
                    d.dependent_table.as_str(),
                    d.referenced_table.as_str(),
                    d.statement_index,
                )
            })
            .collect();
        assert_eq!(
            edges,
            vec![
                ("overrides", "rotations", 1),
                ("overrides", "users", 1),
                ("overrides", "users", 3),
            ]
        );
        assert!(file
            .dependencies
            .iter()
            .all(|d| d.dependency_type == DependencyType::ForeignKey));

        let anchored: BTreeSet<_> = file
            .statements
            .iter()
            .filter_map(|s| s.table_name.as_deref())
            .collect();
        assert!(file
            .dependencies
            .iter()
            .all(|d| anchored.contains(d.dependent_table.as_str())));
    }

    #[test]
    fn test_unterminated_dollar_quote_swallows_rest_of_file() {
        let content = "CREATE TABLE a (id INT);\nDO $$ BEGIN\nCREATE TABLE b (id INT REFERENCES a(id));";
        let file = parse_migration_file("004_broken.sql", content).unwrap();

        assert_eq!(file.statements.len(), 2);
        // 나머지를 삼킨 문장은 불투명 블록으로 남고 의존성 정보가 없음
        assert_eq!(file.statements[1].statement_type, StatementType::DoBlock);
        assert!(file.statements[1].dependencies.is_empty());
        assert!(file.dependencies.is_empty());
        assert_eq!(file.tables_created.len(), 1);
    }

    #[test]
    fn test_strict_mode_rejects_unterminated_dollar_quote() {
        let analyzer = MigrationAnalyzer::with_options(ParseOptions { strict: true });
        let err = analyzer
            .parse_migration_file("004_broken.sql", "SELECT 1;\n\nDO $$ BEGIN PERFORM 1;")
            .unwrap_err();

        assert_eq!(err.migration_file, "004_broken.sql");
        assert_eq!(err.line, Some(3));
        assert!(err.message.contains("dollar-quoted"));
        assert_eq!(err.syntax.as_deref(), Some("DO $$ BEGIN PERFORM 1;"));
    }

    #[test]
    fn test_detect_dependencies_skips_statements_without_table() {
        let statements = vec![Statement {
            sql: "SELECT 1".into(),
            statement_type: StatementType::Other,
            table_name: None,
            dependencies: vec!["ghost".into()],
            original_index: 0,
            line: 1,
        }];
        assert!(detect_dependencies(&statements).is_empty());
    }

    #[test]
    fn test_scan_directory_sorts_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("002_b.sql"), "CREATE TABLE b (id INT);").unwrap();
        fs::write(dir.path().join("001_a.sql"), "CREATE TABLE a (id INT);").unwrap();
        fs::write(dir.path().join("README.md"), "not a migration").unwrap();

        let files = MigrationAnalyzer::new().scan_directory(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["001_a.sql", "002_b.sql"]);
    }

    #[test]
    fn test_scan_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = MigrationAnalyzer::new().scan_directory(&missing).unwrap_err();
        assert!(matches!(err, MigrationError::Io { .. }));
    }
}
