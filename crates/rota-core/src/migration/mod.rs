//! 마이그레이션 의존성 검증 및 문장 재정렬.
//!
//! SQL 마이그레이션 파일을 문장 단위로 파싱하고, 테이블 간 외래키 의존성을
//! 추출해 누락 테이블, 미래 참조, 순환 의존성을 실행 전에 검출합니다.
//! 같은 파일 안에서 순서만 뒤바뀐 CREATE TABLE은 재정렬로 해결합니다.
//!
//! 모든 연산은 메모리 내에서만 동작하며 I/O가 없습니다
//! (디렉토리 스캔 [`MigrationAnalyzer::scan_directory`] 제외).
//!
//! # 사용 예시
//!
//! ```ignore
//! use rota_core::migration::{reorder_statements, validate_dependencies, MigrationAnalyzer};
//!
//! let files = MigrationAnalyzer::new().scan_directory(Path::new("migrations"))?;
//! for file in &files {
//!     let result = validate_dependencies(file, &executed_tables, &files);
//!     if !result.valid {
//!         return Err(...);
//!     }
//!     let ordered = reorder_statements(&file.statements, &file.dependencies);
//! }
//! ```

pub mod analyzer;
pub mod classifier;
pub mod error;
pub mod graph;
pub mod models;
pub mod reorderer;
pub mod splitter;
pub mod validator;

pub use analyzer::{detect_dependencies, parse_migration_file, MigrationAnalyzer, ParseOptions};
pub use error::{MigrationError, MigrationParseError, MigrationValidationError, Result};
pub use graph::build_dependency_graph;
pub use models::*;
pub use reorderer::reorder_statements;
pub use splitter::split_statements;
pub use validator::{validate_batch, validate_dependencies};
