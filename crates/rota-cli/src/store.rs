//! PostgreSQL 기반 [`MigrationStore`] 구현.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rota_core::migration::{MigrationFile, Statement};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::{debug, instrument};

use crate::config::{mask_database_url, MigrateConfig};
use crate::error::{ExecutorError, Result};
use crate::executor::{AppliedMigration, MigrationStore};

/// PostgreSQL 마이그레이션 저장소
pub struct PgMigrationStore {
    pool: PgPool,
    schema: String,
    history_table: String,
}

impl PgMigrationStore {
    /// 설정으로 연결 후 이력 테이블 준비
    #[instrument(skip(config), fields(schema = %config.schema))]
    pub async fn connect(config: &MigrateConfig) -> Result<Self> {
        let url = config.require_database_url()?;
        debug!(database_url = %mask_database_url(url), "데이터베이스 연결");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect(url)
            .await?;

        let store = Self {
            pool,
            schema: config.schema.clone(),
            history_table: config.history_table.clone(),
        };
        store.ensure_history_table().await?;
        Ok(store)
    }

    /// 이력 테이블 생성 (없을 때만)
    pub async fn ensure_history_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                filename TEXT PRIMARY KEY,
                statements INTEGER NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            self.history_ident()
        );
        sqlx::raw_sql(&sql).execute(&self.pool).await?;
        Ok(())
    }

    fn history_ident(&self) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.schema),
            quote_ident(&self.history_table)
        )
    }
}

#[async_trait]
impl MigrationStore for PgMigrationStore {
    #[instrument(skip(self))]
    async fn executed_tables(&self) -> Result<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' AND table_name <> $2
             ORDER BY table_name",
        )
        .bind(&self.schema)
        .bind(&self.history_table)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = tables.len(), "기존 테이블 조회");
        Ok(tables)
    }

    async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT filename, applied_at FROM {} ORDER BY applied_at, filename",
            self.history_ident()
        );
        let rows: Vec<(String, DateTime<Utc>)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(filename, applied_at)| AppliedMigration {
                filename,
                applied_at,
            })
            .collect())
    }

    #[instrument(skip(self, file, statements), fields(file = %file.filename, statements = statements.len()))]
    async fn apply(&self, file: &MigrationFile, statements: &[Statement]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let search_path = format!("SET LOCAL search_path TO {}", quote_ident(&self.schema));
        (&mut *tx).execute(sqlx::raw_sql(&search_path)).await?;

        for stmt in statements {
            (&mut *tx)
                .execute(sqlx::raw_sql(&stmt.sql))
                .await
                .map_err(|source| ExecutorError::Execution {
                    migration_file: file.filename.clone(),
                    statement_index: stmt.original_index,
                    source,
                })?;
        }

        let record = format!(
            "INSERT INTO {} (filename, statements, applied_at) VALUES ($1, $2, $3)",
            self.history_ident()
        );
        sqlx::query(&record)
            .bind(&file.filename)
            .bind(i32::try_from(statements.len()).unwrap_or(i32::MAX))
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        // 커밋 전 에러로 반환되면 트랜잭션은 drop 시 롤백됨
        tx.commit().await?;
        Ok(())
    }
}

/// PostgreSQL 식별자 인용
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
