//! 의존성 검증을 거친 마이그레이션 실행기.
//!
//! 실행 순서:
//!
//! 1. 적용 이력과 비교해 대기 중인 파일을 파일명 오름차순으로 선택
//! 2. 대기 파일 전체를 현재 테이블 목록 기준으로 검증 (하나라도 실패하면 아무것도 실행하지 않음)
//! 3. 파일마다 테이블 목록을 다시 조회해 재검증, 재정렬 후 단일 트랜잭션으로 실행
//! 4. 실행 실패 시 해당 파일은 롤백되고 이후 파일은 시도하지 않음

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rota_core::migration::{
    reorder_statements, validate_batch, validate_dependencies, MigrationError, MigrationFile,
    Statement,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::error::{ExecutorError, Result};

/// 적용된 마이그레이션 이력
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    /// 파일명
    pub filename: String,
    /// 적용 시각
    pub applied_at: DateTime<Utc>,
}

/// 실행기가 사용하는 데이터베이스 연산.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// 대상 스키마에 현재 존재하는 테이블 목록
    async fn executed_tables(&self) -> Result<Vec<String>>;

    /// 적용 이력 (적용 순서)
    async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>>;

    /// 문장들을 주어진 순서대로 하나의 트랜잭션에서 실행하고 이력 기록.
    ///
    /// 실패하면 아무것도 남기지 않아야 합니다.
    async fn apply(&self, file: &MigrationFile, statements: &[Statement]) -> Result<()>;
}

/// 실행 결과 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    /// 이번 실행에서 적용된 파일
    pub applied: Vec<String>,
    /// 이미 적용되어 건너뛴 파일 수
    pub already_applied: usize,
}

/// 마이그레이션 실행기
pub struct MigrationExecutor<S> {
    store: S,
}

impl<S: MigrationStore> MigrationExecutor<S> {
    /// 새 실행기 생성
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// 내부 저장소 참조
    pub fn store(&self) -> &S {
        &self.store
    }

    /// 아직 적용되지 않은 파일 (파일명 오름차순)
    pub async fn pending<'a>(&self, files: &'a [MigrationFile]) -> Result<Vec<&'a MigrationFile>> {
        let applied: BTreeSet<String> = self
            .store
            .applied_migrations()
            .await?
            .into_iter()
            .map(|m| m.filename)
            .collect();

        let mut pending: Vec<&MigrationFile> = files
            .iter()
            .filter(|f| !applied.contains(&f.filename))
            .collect();
        pending.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(pending)
    }

    /// 대기 중인 마이그레이션 전체 실행
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn run(&self, files: &[MigrationFile]) -> Result<ApplySummary> {
        let pending: Vec<MigrationFile> = self.pending(files).await?.into_iter().cloned().collect();
        let mut summary = ApplySummary {
            applied: Vec::with_capacity(pending.len()),
            already_applied: files.len() - pending.len(),
        };

        if pending.is_empty() {
            info!("적용할 마이그레이션 없음");
            return Ok(summary);
        }

        // 실행 전 전체 검증
        let executed = self.store.executed_tables().await?;
        let report = validate_batch(&pending, &executed);
        if !report.is_valid() {
            let failed: Vec<&str> = report
                .files
                .iter()
                .filter(|f| !f.result.valid)
                .map(|f| f.filename.as_str())
                .collect();
            error!(
                files = ?failed,
                errors = report.error_count(),
                "검증 실패 - 마이그레이션을 실행하지 않음"
            );
            return Err(ExecutorError::BatchValidation(report));
        }

        for file in &pending {
            self.apply_one(file, &pending).await?;
            summary.applied.push(file.filename.clone());
        }

        info!(
            applied = summary.applied.len(),
            skipped = summary.already_applied,
            "마이그레이션 적용 완료"
        );
        Ok(summary)
    }

    #[instrument(skip(self, file, pending), fields(file = %file.filename))]
    async fn apply_one(&self, file: &MigrationFile, pending: &[MigrationFile]) -> Result<()> {
        let executed = self.store.executed_tables().await?;
        let result = validate_dependencies(file, &executed, pending);
        if !result.valid {
            return Err(MigrationError::Validation {
                migration_file: file.filename.clone(),
                errors: result.errors,
            }
            .into());
        }
        for warning in &result.warnings {
            warn!("{}", warning);
        }

        let ordered = reorder_statements(&file.statements, &file.dependencies);
        let deferred = deferred_statements(&ordered);
        if !deferred.is_empty() {
            warn!(
                statements = ?deferred,
                "재정렬로 비-테이블 문장이 CREATE TABLE 뒤로 이동"
            );
        }
        if let Err(e) = self.store.apply(file, &ordered).await {
            error!(error = %e, "마이그레이션 실행 실패 - 롤백");
            return Err(e);
        }

        info!(statements = ordered.len(), "마이그레이션 적용");
        Ok(())
    }
}

/// 재정렬 후 원래 자신보다 뒤에 있던 CREATE TABLE 뒤로 밀려난 비-테이블 문장의 원래 순번
fn deferred_statements(ordered: &[Statement]) -> Vec<usize> {
    ordered
        .iter()
        .enumerate()
        .filter(|(_, stmt)| !stmt.statement_type.is_create_table())
        .filter(|(position, stmt)| {
            ordered[..*position].iter().any(|earlier| {
                earlier.statement_type.is_create_table()
                    && earlier.original_index > stmt.original_index
            })
        })
        .map(|(_, stmt)| stmt.original_index)
        .collect()
}
