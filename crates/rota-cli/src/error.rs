//! 에러 타입 정의.

use rota_core::migration::{MigrationError, ValidationReport};
use thiserror::Error;

/// 마이그레이션 실행 에러
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// 데이터베이스 에러 (연결, 카탈로그 조회, 커밋)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 파싱/검증 실패
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// 실행 전 배치 검증 실패 (아무것도 실행되지 않음)
    #[error("validation failed, no migration was applied\n{0}")]
    BatchValidation(ValidationReport),

    /// 문장 실행 실패 (해당 마이그레이션은 롤백됨)
    #[error("{migration_file}: statement #{statement_index} failed: {source}")]
    Execution {
        migration_file: String,
        statement_index: usize,
        #[source]
        source: sqlx::Error,
    },

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, ExecutorError>;
