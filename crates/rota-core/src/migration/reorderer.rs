//! 파일 내 문장 재정렬.
//!
//! 검증을 통과한 파일에 대해서만 호출됩니다. 출력 순서:
//!
//! 1. 의존 관계가 있는 CREATE TABLE (참조 대상이 먼저)
//! 2. 의존 관계가 없는 CREATE TABLE (원래 순서)
//! 3. 나머지 문장 (원래 순서)

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::graph::{creation_edges, depth_first};
use super::models::{Statement, TableDependency};

/// 의존성을 만족하도록 문장 순서를 재배열합니다.
///
/// 결과는 항상 입력의 순열이며, `dependencies`가 비어 있으면 입력을 그대로 반환합니다.
pub fn reorder_statements(
    statements: &[Statement],
    dependencies: &[TableDependency],
) -> Vec<Statement> {
    if dependencies.is_empty() {
        return statements.to_vec();
    }

    let edges = creation_edges(statements, dependencies);

    let mut related: BTreeSet<&str> = BTreeSet::new();
    for (&dependent, referenced) in &edges {
        related.insert(dependent);
        related.extend(referenced.iter().copied());
    }

    let mut creates_by_table: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut roots: Vec<&str> = Vec::new();
    for (pos, stmt) in statements.iter().enumerate() {
        if !stmt.statement_type.is_create_table() {
            continue;
        }
        if let Some(table) = stmt.table_name.as_deref() {
            if related.contains(table) {
                let positions = creates_by_table.entry(table).or_default();
                if positions.is_empty() {
                    roots.push(table);
                }
                positions.push(pos);
            }
        }
    }

    let traversal = depth_first(roots, |table| edges.get(table).cloned().unwrap_or_default());

    let mut order: Vec<usize> = Vec::with_capacity(statements.len());
    for table in &traversal.order {
        if let Some(positions) = creates_by_table.get(table) {
            order.extend(positions);
        }
    }

    let ordered: BTreeSet<usize> = order.iter().copied().collect();
    order.extend(
        statements
            .iter()
            .enumerate()
            .filter(|(pos, s)| s.statement_type.is_create_table() && !ordered.contains(pos))
            .map(|(pos, _)| pos),
    );
    order.extend(
        statements
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.statement_type.is_create_table())
            .map(|(pos, _)| pos),
    );

    if order.iter().enumerate().any(|(i, &pos)| i != pos) {
        debug!(
            statements = statements.len(),
            tables = traversal.order.len(),
            "문장 순서 재배열"
        );
    }

    order.into_iter().map(|pos| statements[pos].clone()).collect()
}
