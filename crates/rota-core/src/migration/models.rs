//! 마이그레이션 의존성 분석을 위한 데이터 모델.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::error::MigrationValidationError;

/// SQL 문장 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatementType {
    /// CREATE TABLE [IF NOT EXISTS]
    CreateTable,
    /// ALTER TABLE
    AlterTable,
    /// CREATE [UNIQUE] INDEX
    CreateIndex,
    /// CREATE [OR REPLACE] FUNCTION
    CreateFunction,
    /// DO $$ ... $$ 블록
    DoBlock,
    /// 기타 문장 (분류 불가)
    Other,
}

impl StatementType {
    /// CREATE TABLE 문장인지 확인
    pub fn is_create_table(&self) -> bool {
        matches!(self, StatementType::CreateTable)
    }

    /// 내부를 해석하지 않는 불투명 블록인지 확인 (함수 본문, DO 블록)
    pub fn is_opaque(&self) -> bool {
        matches!(self, StatementType::CreateFunction | StatementType::DoBlock)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementType::CreateTable => "CREATE TABLE",
            StatementType::AlterTable => "ALTER TABLE",
            StatementType::CreateIndex => "CREATE INDEX",
            StatementType::CreateFunction => "CREATE FUNCTION",
            StatementType::DoBlock => "DO",
            StatementType::Other => "OTHER",
        };
        write!(f, "{}", name)
    }
}

/// 파싱된 SQL 문장.
///
/// 파싱 시 한 번 생성된 뒤 변경되지 않습니다. 재정렬은 문장 자체가 아니라
/// 출력 시퀀스 내 위치만 바꿉니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// 원본 SQL (주석 줄 제외, 앞뒤 공백 제거)
    pub sql: String,
    /// 문장 유형
    pub statement_type: StatementType,
    /// 문장이 주로 대상으로 하는 테이블
    pub table_name: Option<String>,
    /// 외래키로 참조하는 테이블 목록 (중복 없음, 등장 순서 유지)
    pub dependencies: Vec<String>,
    /// 파일 내 문장 순번 (0-based)
    pub original_index: usize,
    /// 파일 내 시작 라인 번호 (1-based)
    pub line: usize,
}

impl Statement {
    /// 외래키 의존성이 자기 자신만을 가리키는지 확인
    pub fn is_self_referencing(&self) -> bool {
        match &self.table_name {
            Some(table) => self.dependencies.iter().any(|dep| dep == table),
            None => false,
        }
    }
}

/// 의존성 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DependencyType {
    /// REFERENCES 외래키
    ForeignKey,
    /// INHERITS (예약, 현재 검출하지 않음)
    Inherits,
    /// 기타 (예약)
    Other,
}

/// 테이블 간 방향성 의존 관계 (`dependent_table` → `referenced_table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableDependency {
    /// 나중에 생성되어야 하는 테이블
    pub dependent_table: String,
    /// 먼저 존재해야 하는 테이블
    pub referenced_table: String,
    /// 의존성 유형
    pub dependency_type: DependencyType,
    /// 의존성을 도입한 문장 순번
    pub statement_index: usize,
}

impl TableDependency {
    /// 새 외래키 의존성 생성
    pub fn foreign_key(dependent: &str, referenced: &str, statement_index: usize) -> Self {
        Self {
            dependent_table: dependent.to_string(),
            referenced_table: referenced.to_string(),
            dependency_type: DependencyType::ForeignKey,
            statement_index,
        }
    }

    /// 자기 참조 여부
    pub fn is_self_reference(&self) -> bool {
        self.dependent_table == self.referenced_table
    }
}

/// 마이그레이션 파일 하나의 파싱 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    /// 파일명 (예: `003_add_overrides.sql`)
    pub filename: String,
    /// 원본 순서의 문장 목록
    pub statements: Vec<Statement>,
    /// 이 파일에서 생성하는 테이블
    pub tables_created: BTreeSet<String>,
    /// 이 파일의 문장에서 도출된 의존성
    pub dependencies: Vec<TableDependency>,
}

impl MigrationFile {
    /// `table`을 생성하는 첫 CREATE TABLE 문장 순번
    pub fn creation_index(&self, table: &str) -> Option<usize> {
        self.statements
            .iter()
            .find(|s| s.statement_type.is_create_table() && s.table_name.as_deref() == Some(table))
            .map(|s| s.original_index)
    }

    /// 순번으로 문장 조회
    pub fn statement(&self, index: usize) -> Option<&Statement> {
        self.statements.get(index)
    }
}

/// 그래프 상의 테이블 정의 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    /// 정의한 마이그레이션 파일
    pub migration_file: String,
    /// 배치 내 파일 순서 (0-based)
    pub file_position: usize,
    /// 파일 내 문장 순번
    pub statement_index: usize,
    /// 파일 내 라인 번호
    pub line: usize,
}

/// 출처 파일이 표시된 의존성 엣지
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// 엣지를 도입한 마이그레이션 파일
    pub migration_file: String,
    /// 의존성
    pub dependency: TableDependency,
}

/// 배치 전체와 기존 테이블을 합친 의존성 그래프.
///
/// 검증 실행마다 새로 만들어지며 저장되지 않습니다.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    /// 등장한 모든 테이블 (마이그레이션 + 데이터베이스)
    pub nodes: BTreeSet<String>,
    /// 모든 의존성 엣지 (파일 순서, 파일 내 순서 유지)
    pub edges: Vec<GraphEdge>,
    /// 배치 이전에 이미 존재하던 테이블
    pub executed_tables: BTreeSet<String>,
    /// 테이블별 정의 위치 (파일 순서대로)
    pub definitions: BTreeMap<String, Vec<TableDefinition>>,
}

impl DependencyGraph {
    /// 새 그래프 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 여러 파일에서 정의된 테이블 찾기
    pub fn find_duplicates(&self) -> Vec<(&str, &[TableDefinition])> {
        self.definitions
            .iter()
            .filter(|(_, locations)| {
                let files: BTreeSet<_> = locations.iter().map(|l| &l.migration_file).collect();
                files.len() > 1
            })
            .map(|(name, locations)| (name.as_str(), locations.as_slice()))
            .collect()
    }

    /// 테이블 → 참조 테이블 인접 목록 (자기 참조 제외)
    pub fn adjacency(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in &self.edges {
            let dep = &edge.dependency;
            if dep.is_self_reference() {
                continue;
            }
            let targets = map.entry(dep.dependent_table.as_str()).or_default();
            if !targets.contains(&dep.referenced_table.as_str()) {
                targets.push(dep.referenced_table.as_str());
            }
        }
        map
    }

    /// 파일 간 의존 관계 (파일 → 참조 테이블을 정의한 파일들)
    pub fn file_dependencies(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut map: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for edge in &self.edges {
            let Some(defs) = self.definitions.get(&edge.dependency.referenced_table) else {
                continue;
            };
            for def in defs {
                if def.migration_file != edge.migration_file {
                    map.entry(edge.migration_file.as_str())
                        .or_default()
                        .insert(def.migration_file.as_str());
                }
            }
        }
        map
    }
}

/// 단일 마이그레이션 파일의 의존성 검증 결과.
///
/// 첫 에러에서 멈추지 않고 모든 에러와 경고를 모아서 반환합니다.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    /// 에러가 하나도 없으면 true
    pub valid: bool,
    /// 실행 전 반드시 수정해야 하는 문제
    pub errors: Vec<MigrationValidationError>,
    /// 재정렬 등으로 자동 해결되는 문제
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// 새 결과 생성 (유효 상태로 시작)
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// 에러 추가
    pub fn add_error(&mut self, error: MigrationValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    /// 경고 추가
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// 에러 메시지 목록
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// 파일별 검증 결과
#[derive(Debug, Clone, Serialize)]
pub struct FileValidation {
    /// 파일명
    pub filename: String,
    /// 문장 수
    pub statements: usize,
    /// 검증 결과
    pub result: ValidationResult,
}

/// 배치 전체 검증 보고서
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// 파일별 결과 (파일명 오름차순)
    pub files: Vec<FileValidation>,
}

impl ValidationReport {
    /// 새 보고서 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 파일 결과 추가
    pub fn push(&mut self, file: &MigrationFile, result: ValidationResult) {
        self.files.push(FileValidation {
            filename: file.filename.clone(),
            statements: file.statements.len(),
            result,
        });
    }

    /// 에러 수
    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.result.errors.len()).sum()
    }

    /// 경고 수
    pub fn warning_count(&self) -> usize {
        self.files.iter().map(|f| f.result.warnings.len()).sum()
    }

    /// 검증 통과 여부
    pub fn is_valid(&self) -> bool {
        self.files.iter().all(|f| f.result.valid)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "═══════════════════════════════════════════════════════════════"
        )?;
        writeln!(f, "                    마이그레이션 의존성 검증 보고서")?;
        writeln!(
            f,
            "═══════════════════════════════════════════════════════════════"
        )?;
        writeln!(f)?;
        writeln!(f, "📊 요약")?;
        writeln!(f, "  분석 파일: {} 개", self.files.len())?;
        writeln!(
            f,
            "  SQL 문장: {} 개",
            self.files.iter().map(|v| v.statements).sum::<usize>()
        )?;
        writeln!(
            f,
            "  🔴 에러: {} 개  🟡 경고: {} 개",
            self.error_count(),
            self.warning_count()
        )?;

        for file in &self.files {
            if file.result.errors.is_empty() && file.result.warnings.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(
                f,
                "───────────────────────────────────────────────────────────────"
            )?;
            writeln!(f, "📄 {}", file.filename)?;
            for error in &file.result.errors {
                writeln!(f, "  [ERROR] {}", error)?;
            }
            for warning in &file.result.warnings {
                writeln!(f, "  [WARNING] {}", warning)?;
            }
        }

        if self.error_count() == 0 && self.warning_count() == 0 {
            writeln!(f)?;
            writeln!(f, "✅ 문제가 발견되지 않았습니다.")?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "═══════════════════════════════════════════════════════════════"
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(file: &str, position: usize) -> TableDefinition {
        TableDefinition {
            migration_file: file.to_string(),
            file_position: position,
            statement_index: 0,
            line: 1,
        }
    }

    #[test]
    fn test_dependency_graph_duplicates() {
        let mut graph = DependencyGraph::new();
        graph
            .definitions
            .insert("users".into(), vec![definition("01.sql", 0), definition("05.sql", 1)]);
        graph
            .definitions
            .insert("roles".into(), vec![definition("01.sql", 0), definition("01.sql", 0)]);

        let dups = graph.find_duplicates();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].0, "users");
    }

    #[test]
    fn test_adjacency_skips_self_reference() {
        let mut graph = DependencyGraph::new();
        for (dependent, referenced) in [("nodes", "nodes"), ("orders", "users"), ("orders", "users")] {
            graph.edges.push(GraphEdge {
                migration_file: "01.sql".into(),
                dependency: TableDependency::foreign_key(dependent, referenced, 0),
            });
        }

        let adjacency = graph.adjacency();
        assert!(!adjacency.contains_key("nodes"));
        assert_eq!(adjacency["orders"], vec!["users"]);
    }

    #[test]
    fn test_validation_result_tracks_validity() {
        let mut result = ValidationResult::new();
        assert!(result.valid);

        result.add_warning("reorder");
        assert!(result.valid);

        result.add_error(MigrationValidationError::CircularDependency {
            migration_file: "01.sql".into(),
            table: "a".into(),
            statement_index: 0,
        });
        assert!(!result.valid);
        assert_eq!(result.error_messages().len(), 1);
    }

    #[test]
    fn test_validation_report_display() {
        let file = MigrationFile {
            filename: "001_init.sql".into(),
            statements: Vec::new(),
            tables_created: BTreeSet::new(),
            dependencies: Vec::new(),
        };
        let mut result = ValidationResult::new();
        result.add_error(MigrationValidationError::MissingTable {
            migration_file: "001_init.sql".into(),
            dependent_table: "users_new".into(),
            missing_table: "roles".into(),
            statement_index: 0,
        });

        let mut report = ValidationReport::new();
        report.push(&file, result);

        let output = format!("{}", report);
        assert!(output.contains("에러: 1"));
        assert!(output.contains("001_init.sql"));
        assert!(output.contains("roles"));
        assert!(!report.is_valid());
    }
}
