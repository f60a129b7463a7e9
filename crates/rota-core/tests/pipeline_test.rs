//! 파싱 → 검증 → 재정렬 파이프라인 통합 테스트
//!
//! ## 테스트 검증 항목
//! 1. 의존성이 없으면 재정렬 결과가 입력과 동일
//! 2. 재정렬 후 모든 참조 테이블이 참조하는 테이블보다 먼저 생성
//! 3. 두 테이블 순환은 문장 순서와 무관하게 검출
//! 4. 자기 참조 테이블은 에러 없이 통과
//! 5. 이후 마이그레이션에서 생성되는 테이블 참조는 에러
//! 6. 달러 인용 블록 내부의 `;`는 문장을 나누지 않음
//! 7. 누락 테이블이 여러 개면 모두 보고
//! 8. 문장 중간의 `--` 주석 내용은 분리/의존성에 영향 없음

use proptest::prelude::*;
use rota_core::migration::{
    build_dependency_graph, parse_migration_file, reorder_statements, split_statements,
    validate_batch, validate_dependencies, MigrationAnalyzer, MigrationFile,
    MigrationValidationError, Statement, StatementType,
};

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

fn parse(name: &str, sql: &str) -> MigrationFile {
    parse_migration_file(name, sql).unwrap()
}

fn creation_position(statements: &[Statement], table: &str) -> usize {
    statements
        .iter()
        .position(|s| {
            s.statement_type == StatementType::CreateTable && s.table_name.as_deref() == Some(table)
        })
        .unwrap()
}

/// `t{i}`는 자신보다 번호가 작은 테이블만 참조 (비순환 보장)
fn create_sql(index: usize, refs: &[bool]) -> String {
    let mut columns = vec!["id SERIAL PRIMARY KEY".to_string()];
    for (target, _) in refs.iter().enumerate().filter(|(_, r)| **r) {
        columns.push(format!("t{target}_id INTEGER REFERENCES t{target}(id)"));
    }
    format!("CREATE TABLE t{index} ({});", columns.join(", "))
}

fn acyclic_schema() -> impl Strategy<Value = Vec<String>> {
    (2usize..8)
        .prop_flat_map(|n| {
            (0..n)
                .map(|i| proptest::collection::vec(any::<bool>(), i))
                .collect::<Vec<_>>()
        })
        .prop_flat_map(|rows| {
            let statements: Vec<String> = rows
                .iter()
                .enumerate()
                .map(|(i, refs)| create_sql(i, refs))
                .collect();
            Just(statements).prop_shuffle()
        })
}

fn independent_statements() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(0usize..4, 1..10).prop_map(|kinds| {
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| match kind {
                0 => format!("CREATE TABLE s{i} (id SERIAL);"),
                1 => format!("CREATE INDEX idx_s{i} ON s{i} (id);"),
                2 => format!("ALTER TABLE s{i} ADD COLUMN note TEXT;"),
                _ => format!("DO $$ BEGIN PERFORM {i}; END $$;"),
            })
            .collect()
    })
}

// ============================================================================
// 속성 테스트
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_reorder_without_dependencies_is_identity(sqls in independent_statements()) {
        let file = parse("001.sql", &sqls.join("\n"));
        prop_assert!(file.dependencies.is_empty());

        let reordered = reorder_statements(&file.statements, &[]);
        prop_assert_eq!(reordered, file.statements);
    }

    #[test]
    fn prop_reorder_creates_referenced_tables_first(sqls in acyclic_schema()) {
        let file = parse("001.sql", &sqls.join("\n"));

        let result = validate_dependencies(&file, &[], std::slice::from_ref(&file));
        prop_assert!(result.valid, "{:?}", result.errors);

        let reordered = reorder_statements(&file.statements, &file.dependencies);
        prop_assert_eq!(reordered.len(), file.statements.len());

        for dep in &file.dependencies {
            prop_assert!(
                creation_position(&reordered, &dep.referenced_table)
                    < creation_position(&reordered, &dep.dependent_table),
                "{} must precede {}",
                dep.referenced_table,
                dep.dependent_table
            );
        }

        // 재정렬은 순열
        let mut indexes: Vec<_> = reordered.iter().map(|s| s.original_index).collect();
        indexes.sort_unstable();
        prop_assert_eq!(indexes, (0..file.statements.len()).collect::<Vec<_>>());
    }
}

// ============================================================================
// 시나리오 테스트
// ============================================================================

#[test]
fn test_cycle_detected_for_both_orderings() {
    let a = "CREATE TABLE a (id SERIAL PRIMARY KEY, b_id INTEGER REFERENCES b(id));";
    let b = "CREATE TABLE b (id SERIAL PRIMARY KEY, a_id INTEGER REFERENCES a(id));";

    for sql in [format!("{a}\n{b}"), format!("{b}\n{a}")] {
        let file = parse("010_cycle.sql", &sql);
        let result = validate_dependencies(&file, &[], std::slice::from_ref(&file));

        assert!(!result.valid);
        let cycles: Vec<_> = result
            .errors
            .iter()
            .filter(|e| matches!(e, MigrationValidationError::CircularDependency { .. }))
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].to_string().contains("circular dependency"));
    }
}

#[test]
fn test_self_referencing_table_validates() {
    let file = parse(
        "011_nodes.sql",
        "CREATE TABLE nodes (id SERIAL PRIMARY KEY, parent_id INTEGER REFERENCES nodes(id));",
    );

    let result = validate_dependencies(&file, &[], std::slice::from_ref(&file));
    assert!(result.valid);
    assert!(result.errors.is_empty());
}

#[test]
fn test_forward_migration_is_rejected() {
    let files = vec![
        parse(
            "001.sql",
            "CREATE TABLE child (id SERIAL, parent_id INTEGER REFERENCES parent(id));",
        ),
        parse("002.sql", "CREATE TABLE parent (id SERIAL);"),
    ];

    let result = validate_dependencies(&files[0], &[], &files);
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].table(), "parent");
    assert!(result.error_messages()[0].contains("002.sql"));

    // 다음 파일은 문제 없음
    assert!(validate_dependencies(&files[1], &[], &files).valid);
}

#[test]
fn test_do_block_semicolons_are_preserved() {
    let sql = "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'shift_kind'); END IF; END $$;";

    let statements = split_statements(sql);
    assert_eq!(statements.len(), 1);

    let file = parse("012_types.sql", sql);
    assert_eq!(file.statements.len(), 1);
    assert_eq!(file.statements[0].statement_type, StatementType::DoBlock);
}

#[test]
fn test_reversed_creation_order_end_to_end() {
    let file = parse(
        "013_notifications.sql",
        "CREATE TABLE notification_snapshots (id SERIAL, trigger_id INTEGER REFERENCES cron_trigger_audits(id)); CREATE TABLE cron_trigger_audits (id SERIAL);",
    );

    let result = validate_dependencies(&file, &[], std::slice::from_ref(&file));
    assert!(result.valid);
    assert_eq!(result.warnings.len(), 1);

    let reordered = reorder_statements(&file.statements, &file.dependencies);
    let tables: Vec<_> = reordered
        .iter()
        .filter_map(|s| s.table_name.as_deref())
        .collect();
    assert_eq!(tables, vec!["cron_trigger_audits", "notification_snapshots"]);
}

#[test]
fn test_two_missing_tables_produce_two_errors() {
    let file = parse(
        "014_users_new.sql",
        "CREATE TABLE users_new (id SERIAL, role_id INTEGER REFERENCES roles(id), org_id INTEGER REFERENCES orgs(id));",
    );

    let result = validate_dependencies(&file, &[], std::slice::from_ref(&file));
    assert_eq!(result.errors.len(), 2);
    for err in &result.errors {
        let message = err.to_string();
        assert!(message.contains("users_new"));
        assert!(message.contains("014_users_new.sql"));
    }
}

#[test]
fn test_existing_database_tables_satisfy_references() {
    let file = parse(
        "015_audit.sql",
        "CREATE TABLE audit_log (id SERIAL, user_id INTEGER REFERENCES public.users(id));",
    );

    let executed = vec!["users".to_string()];
    let result = validate_dependencies(&file, &executed, std::slice::from_ref(&file));
    assert!(result.valid, "{:?}", result.errors);
}

#[test]
fn test_trailing_comments_do_not_disturb_the_schema() {
    let file = parse(
        "001_oncall.sql",
        "CREATE TABLE users (id SERIAL PRIMARY KEY);
CREATE TABLE rotations (id SERIAL PRIMARY KEY); -- rotation's owner (see docs
CREATE TABLE shifts (
    id SERIAL PRIMARY KEY,
    user_id INT REFERENCES users(id), -- the on-call user's id; never ghost(id)
    rotation_id INT REFERENCES rotations(id)
);
CREATE TABLE overrides (
    id SERIAL PRIMARY KEY,
    shift_id INT REFERENCES shifts(id) -- $$ not a block
);",
    );

    assert_eq!(file.statements.len(), 4);
    let created: Vec<&str> = file.tables_created.iter().map(String::as_str).collect();
    assert_eq!(created, vec!["overrides", "rotations", "shifts", "users"]);

    let edges: Vec<(&str, &str)> = file
        .dependencies
        .iter()
        .map(|d| (d.dependent_table.as_str(), d.referenced_table.as_str()))
        .collect();
    assert_eq!(
        edges,
        vec![
            ("shifts", "users"),
            ("shifts", "rotations"),
            ("overrides", "shifts"),
        ]
    );

    let follow_up = parse(
        "002_escalations.sql",
        "CREATE TABLE escalations (id SERIAL, override_id INT REFERENCES overrides(id));",
    );
    let report = validate_batch(&[file, follow_up], &[]);
    assert!(report.is_valid(), "{}", report);
}

#[test]
fn test_directory_batch_and_graph() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("001_rotations.sql"),
        "CREATE TABLE rotations (id SERIAL PRIMARY KEY);",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("002_shifts.sql"),
        "-- shifts\nCREATE TABLE shifts (id SERIAL, rotation_id INTEGER REFERENCES rotations(id));\nCREATE INDEX idx_shifts_rotation ON shifts (rotation_id);",
    )
    .unwrap();

    let files = MigrationAnalyzer::new().scan_directory(dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let report = validate_batch(&files, &[]);
    assert!(report.is_valid(), "{}", report);

    let graph = build_dependency_graph(&files, &[]);
    assert!(graph.find_cycles().is_empty());
    assert!(graph.file_dependencies()["002_shifts.sql"].contains("001_rotations.sql"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["files"].as_array().unwrap().len(), 2);
}
