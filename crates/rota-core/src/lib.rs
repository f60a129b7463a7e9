//! SQL 마이그레이션 의존성 검증 엔진.

pub mod migration;

pub use migration::{
    build_dependency_graph, detect_dependencies, parse_migration_file, reorder_statements,
    validate_batch, validate_dependencies, MigrationAnalyzer, MigrationError, MigrationFile,
    MigrationParseError, MigrationValidationError, ParseOptions, Statement, StatementType,
    TableDependency, ValidationReport, ValidationResult,
};
