//! 의존성 그래프 생성과 공용 DFS 순회.
//!
//! 순환 검출(검증기)과 위상 정렬(재정렬기)은 같은 3색(미방문/방문 중/방문 완료)
//! DFS를 [`depth_first`] 하나로 공유합니다.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::models::{
    DependencyGraph, GraphEdge, MigrationFile, Statement, TableDefinition, TableDependency,
};

/// DFS 방문 상태 (미방문은 맵에 없음)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// DFS 순회 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traversal<'a> {
    /// 후위 순서: 모든 참조 대상이 참조하는 노드보다 먼저 나옴
    pub order: Vec<&'a str>,
    /// 방문 중인 노드를 다시 만난 지점 (순환 발견 위치, 발견 순서)
    pub cycles: Vec<&'a str>,
}

/// 3색 DFS.
///
/// `roots`를 주어진 순서대로 시작점으로 삼고, `neighbors`가 돌려주는 순서대로
/// 인접 노드를 방문합니다. 입력 순서가 같으면 결과도 항상 같습니다.
pub fn depth_first<'a, I, F>(roots: I, mut neighbors: F) -> Traversal<'a>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&'a str) -> Vec<&'a str>,
{
    let mut state: HashMap<&'a str, VisitState> = HashMap::new();
    let mut traversal = Traversal::default();

    for root in roots {
        if !state.contains_key(root) {
            visit(root, &mut neighbors, &mut state, &mut traversal);
        }
    }

    traversal
}

fn visit<'a, F>(
    node: &'a str,
    neighbors: &mut F,
    state: &mut HashMap<&'a str, VisitState>,
    traversal: &mut Traversal<'a>,
) where
    F: FnMut(&'a str) -> Vec<&'a str>,
{
    state.insert(node, VisitState::Visiting);

    for next in neighbors(node) {
        match state.get(next) {
            None => visit(next, neighbors, state, traversal),
            Some(VisitState::Visiting) => {
                if !traversal.cycles.contains(&next) {
                    traversal.cycles.push(next);
                }
            }
            Some(VisitState::Visited) => {}
        }
    }

    state.insert(node, VisitState::Visited);
    traversal.order.push(node);
}

/// 파일 내 테이블 생성 순서를 결정하는 인접 목록.
///
/// 두 테이블 모두 `statements` 안에서 CREATE TABLE로 생성되고, 엣지를 도입한
/// 문장이 CREATE TABLE인 경우만 포함합니다. ALTER TABLE로 추가되는 외래키는
/// 모든 테이블 생성 이후에 실행되므로 생성 순서에 영향을 주지 않습니다.
pub(crate) fn creation_edges<'a>(
    statements: &'a [Statement],
    dependencies: &'a [TableDependency],
) -> BTreeMap<&'a str, Vec<&'a str>> {
    let created: BTreeSet<&str> = statements
        .iter()
        .filter(|s| s.statement_type.is_create_table())
        .filter_map(|s| s.table_name.as_deref())
        .collect();

    let mut map: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for dep in dependencies {
        if dep.is_self_reference()
            || !created.contains(dep.dependent_table.as_str())
            || !created.contains(dep.referenced_table.as_str())
        {
            continue;
        }

        let introduced_by_create = statements
            .iter()
            .find(|s| s.original_index == dep.statement_index)
            .map_or(true, |s| s.statement_type.is_create_table());
        if !introduced_by_create {
            continue;
        }

        let targets = map.entry(dep.dependent_table.as_str()).or_default();
        if !targets.contains(&dep.referenced_table.as_str()) {
            targets.push(dep.referenced_table.as_str());
        }
    }
    map
}

/// 마이그레이션 파일들과 기존 테이블로 의존성 그래프 생성.
///
/// I/O 없음. `executed_tables`는 호출자가 미리 조회해서 넘깁니다.
/// `migration_files`의 순서가 곧 적용 순서입니다.
pub fn build_dependency_graph(
    migration_files: &[MigrationFile],
    executed_tables: &[String],
) -> DependencyGraph {
    build_graph(migration_files.iter(), executed_tables)
}

pub(crate) fn build_graph<'a, I>(migration_files: I, executed_tables: &[String]) -> DependencyGraph
where
    I: IntoIterator<Item = &'a MigrationFile>,
{
    let mut graph = DependencyGraph::new();

    for table in executed_tables {
        graph.executed_tables.insert(table.clone());
        graph.nodes.insert(table.clone());
    }

    for (position, file) in migration_files.into_iter().enumerate() {
        for table in &file.tables_created {
            graph.nodes.insert(table.clone());
        }

        for stmt in &file.statements {
            if !stmt.statement_type.is_create_table() {
                continue;
            }
            if let Some(table) = &stmt.table_name {
                graph
                    .definitions
                    .entry(table.clone())
                    .or_default()
                    .push(TableDefinition {
                        migration_file: file.filename.clone(),
                        file_position: position,
                        statement_index: stmt.original_index,
                        line: stmt.line,
                    });
            }
        }

        graph
            .edges
            .extend(file.dependencies.iter().map(|dep| GraphEdge {
                migration_file: file.filename.clone(),
                dependency: dep.clone(),
            }));
    }

    graph
}

impl DependencyGraph {
    /// 그래프 전체의 순환 검출 (순환이 발견된 테이블 목록)
    pub fn find_cycles(&self) -> Vec<String> {
        let adjacency = self.adjacency();
        let roots: Vec<&str> = adjacency.keys().copied().collect();

        depth_first(roots, |node| adjacency.get(node).cloned().unwrap_or_default())
            .cycles
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}
