//! 마이그레이션 의존성 검증기.
//!
//! 각 엣지의 참조 테이블이 다음 중 하나를 만족하는지 확인합니다.
//!
//! 1. 데이터베이스에 이미 존재
//! 2. 배치 내 이전 마이그레이션 파일에서 생성
//! 3. 같은 파일의 앞선 문장에서 생성 (뒤에서 생성되면 재정렬 경고)
//!
//! 이후 파일에서 생성되면 미래 참조, 어디에도 없으면 누락 테이블 에러입니다.
//! 모든 에러를 모아서 반환하며 첫 에러에서 멈추지 않습니다.

use tracing::{debug, info, warn};

use super::error::MigrationValidationError;
use super::graph::{build_graph, creation_edges, depth_first};
use super::models::{DependencyGraph, MigrationFile, ValidationReport, ValidationResult};

/// 단일 마이그레이션 파일의 의존성 검증.
///
/// `all_files`는 배치의 모든 파일(적용 순서)이며 `migration_file`이 없으면
/// 파일명 순서에 맞는 위치에 있는 것으로 간주합니다.
pub fn validate_dependencies(
    migration_file: &MigrationFile,
    executed_tables: &[String],
    all_files: &[MigrationFile],
) -> ValidationResult {
    let mut batch: Vec<&MigrationFile> = all_files.iter().collect();
    let position = match batch
        .iter()
        .position(|f| f.filename == migration_file.filename)
    {
        Some(position) => position,
        None => {
            let position = batch.partition_point(|f| f.filename < migration_file.filename);
            batch.insert(position, migration_file);
            position
        }
    };

    let graph = build_graph(batch, executed_tables);
    validate_in_graph(migration_file, position, &graph)
}

/// 배치 전체 검증 (파일명 순서, 그래프는 한 번만 생성)
pub fn validate_batch(files: &[MigrationFile], executed_tables: &[String]) -> ValidationReport {
    let graph = build_graph(files.iter(), executed_tables);

    let mut report = ValidationReport::new();
    for (position, file) in files.iter().enumerate() {
        report.push(file, validate_in_graph(file, position, &graph));
    }

    info!(
        files = files.len(),
        errors = report.error_count(),
        warnings = report.warning_count(),
        "배치 검증 완료"
    );
    report
}

fn validate_in_graph(
    file: &MigrationFile,
    position: usize,
    graph: &DependencyGraph,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    check_references(file, position, graph, &mut result);
    check_cycles(file, &mut result);
    check_duplicates(file, graph, &mut result);

    if result.valid {
        debug!(
            file = %file.filename,
            edges = file.dependencies.len(),
            warnings = result.warnings.len(),
            "의존성 검증 통과"
        );
    } else {
        warn!(
            file = %file.filename,
            errors = result.errors.len(),
            "의존성 검증 실패"
        );
    }

    result
}

fn check_references(
    file: &MigrationFile,
    position: usize,
    graph: &DependencyGraph,
    result: &mut ValidationResult,
) {
    for dep in &file.dependencies {
        if dep.is_self_reference() || graph.executed_tables.contains(&dep.referenced_table) {
            continue;
        }

        let definitions = graph
            .definitions
            .get(&dep.referenced_table)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if definitions.iter().any(|d| d.file_position < position) {
            continue;
        }

        if let Some(created_at) = file.creation_index(&dep.referenced_table) {
            if created_at > dep.statement_index {
                result.add_warning(format!(
                    "{}: table `{}` (statement #{}) references `{}`, which is created later in the same file (statement #{}); statements will be reordered",
                    file.filename, dep.dependent_table, dep.statement_index, dep.referenced_table, created_at
                ));
            }
            continue;
        }

        match definitions.iter().find(|d| d.file_position > position) {
            Some(later) => result.add_error(MigrationValidationError::ForwardReference {
                migration_file: file.filename.clone(),
                dependent_table: dep.dependent_table.clone(),
                referenced_table: dep.referenced_table.clone(),
                defined_in: later.migration_file.clone(),
                statement_index: dep.statement_index,
            }),
            None => result.add_error(MigrationValidationError::MissingTable {
                migration_file: file.filename.clone(),
                dependent_table: dep.dependent_table.clone(),
                missing_table: dep.referenced_table.clone(),
                statement_index: dep.statement_index,
            }),
        }
    }
}

fn check_cycles(file: &MigrationFile, result: &mut ValidationResult) {
    let edges = creation_edges(&file.statements, &file.dependencies);
    if edges.is_empty() {
        return;
    }

    let roots = file
        .statements
        .iter()
        .filter(|s| s.statement_type.is_create_table())
        .filter_map(|s| s.table_name.as_deref());

    let traversal = depth_first(roots, |table| edges.get(table).cloned().unwrap_or_default());
    for table in traversal.cycles {
        result.add_error(MigrationValidationError::CircularDependency {
            migration_file: file.filename.clone(),
            table: table.to_string(),
            statement_index: file.creation_index(table).unwrap_or_default(),
        });
    }
}

fn check_duplicates(file: &MigrationFile, graph: &DependencyGraph, result: &mut ValidationResult) {
    for table in &file.tables_created {
        let Some(definitions) = graph.definitions.get(table) else {
            continue;
        };
        let others: Vec<&str> = definitions
            .iter()
            .filter(|d| d.migration_file != file.filename)
            .map(|d| d.migration_file.as_str())
            .collect();
        if !others.is_empty() {
            result.add_warning(format!(
                "{}: table `{}` is also created in {}; table names are matched without schema, check that these refer to the same table",
                file.filename,
                table,
                others.join(", ")
            ));
        }
    }
}
