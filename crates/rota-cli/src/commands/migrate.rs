//! 마이그레이션 관리 CLI 명령어.
//!
//! # 사용법
//!
//! ```bash
//! # 마이그레이션 의존성 검증 (DB 불필요)
//! rota migrate verify
//! rota migrate verify --verbose --json
//!
//! # 파일별 실행 순서 미리보기
//! rota migrate plan
//!
//! # 의존성 그래프 시각화
//! rota migrate graph --format mermaid > graph.md
//!
//! # 검증 후 적용
//! rota migrate apply --db-url "postgres://..."
//!
//! # 적용/대기 상태
//! rota migrate status
//! ```

use std::collections::BTreeSet;

use rota_core::migration::{
    build_dependency_graph, reorder_statements, validate_batch, validate_dependencies,
    DependencyGraph, MigrationAnalyzer, MigrationFile, ParseOptions, ValidationReport,
};

use crate::config::MigrateConfig;
use crate::error::{ExecutorError, Result};
use crate::executor::{MigrationExecutor, MigrationStore};
use crate::store::PgMigrationStore;

/// 명령 출력 옵션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    /// 상세 출력
    pub verbose: bool,
    /// JSON 출력 (verify)
    pub json: bool,
    /// 그래프 출력 형식
    pub graph_format: GraphFormat,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            json: false,
            graph_format: GraphFormat::Mermaid,
        }
    }
}

/// 그래프 출력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    /// Mermaid 다이어그램
    Mermaid,
    /// DOT (Graphviz)
    Dot,
    /// 텍스트
    Text,
}

impl GraphFormat {
    /// 문자열에서 파싱
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mermaid" | "md" => Some(Self::Mermaid),
            "dot" | "graphviz" => Some(Self::Dot),
            "text" | "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

fn load_files(config: &MigrateConfig) -> Result<Vec<MigrationFile>> {
    let analyzer = MigrationAnalyzer::with_options(ParseOptions {
        strict: config.strict_lexing,
    });
    let files = analyzer.scan_directory(&config.migrations_dir)?;

    if files.is_empty() {
        return Err(ExecutorError::Config(format!(
            "no migration files found in {:?}",
            config.migrations_dir
        )));
    }
    Ok(files)
}

/// 마이그레이션 검증 실행 (처음부터 전체 디렉토리를 적용한다고 가정)
pub fn run_verify(config: &MigrateConfig, output: &OutputOptions) -> Result<bool> {
    let files = load_files(config)?;
    let report = validate_batch(&files, &[]);

    if output.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| ExecutorError::Config(format!("failed to serialize report: {}", e)))?;
        println!("{}", json);
        return Ok(report.is_valid());
    }

    println!("\n🔍 마이그레이션 검증 시작...\n");
    println!("📁 {} 개 마이그레이션 파일 발견", files.len());

    if output.verbose {
        for (i, file) in files.iter().enumerate() {
            println!(
                "   {:02}. {} ({} 문장, 테이블 {} 개)",
                i + 1,
                file.filename,
                file.statements.len(),
                file.tables_created.len()
            );
        }
        println!();
    }

    println!("{}", report);

    if output.verbose {
        let graph = build_dependency_graph(&files, &[]);
        print_graph_summary(&graph);
    }

    Ok(report.is_valid())
}

fn print_graph_summary(graph: &DependencyGraph) {
    println!("\n📊 의존성 그래프 요약");
    println!("  테이블: {} 개", graph.nodes.len());
    println!("  의존 관계: {} 개", graph.edges.len());

    let duplicates = graph.find_duplicates();
    if !duplicates.is_empty() {
        println!("\n  ⚠️ 중복 정의 테이블:");
        for (table, locations) in &duplicates {
            let locs: Vec<_> = locations
                .iter()
                .map(|l| format!("{}:{}", l.migration_file, l.line))
                .collect();
            println!("    - {}: {}", table, locs.join(", "));
        }
    }
}

/// 파일별 실행 순서 출력 (dry-run)
pub fn run_plan(config: &MigrateConfig) -> Result<bool> {
    let files = load_files(config)?;
    let mut report = ValidationReport::new();

    println!("\n📋 실행 계획\n");

    for file in &files {
        let result = validate_dependencies(file, &[], &files);
        println!("📄 {}", file.filename);

        if !result.valid {
            for error in &result.errors {
                println!("  [ERROR] {}", error);
            }
            println!("  ⛔ 검증 실패 - 실행 순서를 만들 수 없음\n");
            report.push(file, result);
            continue;
        }

        let ordered = reorder_statements(&file.statements, &file.dependencies);
        for (position, stmt) in ordered.iter().enumerate() {
            let moved = if stmt.original_index != position {
                format!("  (원래 #{})", stmt.original_index)
            } else {
                String::new()
            };
            println!(
                "  {:>3}. {:<15} {}{}",
                position + 1,
                stmt.statement_type.to_string(),
                stmt.table_name.as_deref().unwrap_or("-"),
                moved
            );
        }
        println!();
        report.push(file, result);
    }

    println!(
        "🔴 에러: {} 개  🟡 경고: {} 개",
        report.error_count(),
        report.warning_count()
    );
    Ok(report.is_valid())
}

/// 의존성 그래프 출력
pub fn run_graph(config: &MigrateConfig, output: &OutputOptions) -> Result<String> {
    let files = load_files(config)?;
    let graph = build_dependency_graph(&files, &[]);

    Ok(match output.graph_format {
        GraphFormat::Mermaid => generate_mermaid_graph(&graph, &files),
        GraphFormat::Dot => generate_dot_graph(&graph, &files),
        GraphFormat::Text => generate_text_graph(&graph, &files),
    })
}

fn node_id(name: &str) -> String {
    name.replace(['.', '-', '"', ' '], "_")
}

/// Mermaid 다이어그램 생성
fn generate_mermaid_graph(graph: &DependencyGraph, files: &[MigrationFile]) -> String {
    let mut output = String::new();

    output.push_str("```mermaid\n");
    output.push_str("graph TD\n");
    output.push_str("    subgraph \"마이그레이션 파일 의존성\"\n");

    for file in files {
        output.push_str(&format!(
            "        {}[\"{}\"]\n",
            node_id(&file.filename),
            file.filename
        ));
    }
    for (file, deps) in graph.file_dependencies() {
        for dep in deps {
            output.push_str(&format!("        {} --> {}\n", node_id(file), node_id(dep)));
        }
    }

    output.push_str("    end\n");
    output.push_str("```\n\n");

    output.push_str("```mermaid\n");
    output.push_str("graph LR\n");
    output.push_str("    subgraph \"테이블 의존성\"\n");

    for (table, referenced) in graph.adjacency() {
        for target in referenced {
            output.push_str(&format!("        {} --> {}\n", node_id(table), node_id(target)));
        }
    }
    for table in graph.find_cycles() {
        output.push_str(&format!("        style {} stroke:#d33,stroke-width:2px\n", node_id(&table)));
    }

    output.push_str("    end\n");
    output.push_str("```\n");

    output
}

/// DOT 그래프 생성
fn generate_dot_graph(graph: &DependencyGraph, files: &[MigrationFile]) -> String {
    let mut output = String::new();

    output.push_str("digraph MigrationDependencies {\n");
    output.push_str("    rankdir=LR;\n");
    output.push_str("    node [shape=box];\n\n");

    output.push_str("    subgraph cluster_files {\n");
    output.push_str("        label=\"Migration Files\";\n");
    for file in files {
        output.push_str(&format!("        \"{}\";\n", file.filename));
    }
    output.push_str("    }\n\n");

    for (file, deps) in graph.file_dependencies() {
        for dep in deps {
            output.push_str(&format!("    \"{}\" -> \"{}\";\n", file, dep));
        }
    }

    output.push_str("\n    node [shape=ellipse];\n");
    let existing: BTreeSet<&str> = graph.executed_tables.iter().map(String::as_str).collect();
    for (table, referenced) in graph.adjacency() {
        for target in referenced {
            let style = if existing.contains(target) {
                " [style=dashed]"
            } else {
                ""
            };
            output.push_str(&format!("    \"{}\" -> \"{}\"{};\n", table, target, style));
        }
    }

    output.push_str("}\n");

    output
}

/// 텍스트 그래프 생성
fn generate_text_graph(graph: &DependencyGraph, files: &[MigrationFile]) -> String {
    let mut output = String::new();
    let file_deps = graph.file_dependencies();

    output.push_str("═══════════════════════════════════════════════════════════════\n");
    output.push_str("                    마이그레이션 의존성 그래프\n");
    output.push_str("═══════════════════════════════════════════════════════════════\n\n");

    output.push_str("📁 파일별 의존성\n");
    output.push_str("───────────────────────────────────────────────────────────────\n");

    for (i, file) in files.iter().enumerate() {
        output.push_str(&format!("\n{} (순서: {})\n", file.filename, i + 1));

        match file_deps.get(file.filename.as_str()) {
            Some(deps) if !deps.is_empty() => {
                for dep in deps {
                    output.push_str(&format!("  └── {}\n", dep));
                }
            }
            _ => output.push_str("  └── (의존성 없음)\n"),
        }
    }

    output.push_str("\n\n📊 테이블 정의\n");
    output.push_str("───────────────────────────────────────────────────────────────\n");

    for (table, locations) in &graph.definitions {
        let locs: Vec<_> = locations
            .iter()
            .map(|l| format!("{}:{}", l.migration_file, l.line))
            .collect();
        output.push_str(&format!("  {} @ {}\n", table, locs.join(", ")));
    }

    let cycles = graph.find_cycles();
    if !cycles.is_empty() {
        output.push_str("\n🔴 순환 의존성\n");
        for table in cycles {
            output.push_str(&format!("  - {}\n", table));
        }
    }

    output.push_str("\n═══════════════════════════════════════════════════════════════\n");

    output
}

/// 검증 후 마이그레이션 적용
pub async fn run_apply(config: &MigrateConfig) -> Result<()> {
    println!("\n🚀 마이그레이션 적용 시작...\n");

    let files = load_files(config)?;

    println!("1️⃣ 데이터베이스 연결...");
    let store = PgMigrationStore::connect(config).await?;
    let executor = MigrationExecutor::new(store);

    println!("2️⃣ 검증 및 실행...");
    let summary = executor.run(&files).await?;

    if summary.applied.is_empty() {
        println!("\n✅ 모든 마이그레이션이 이미 적용되어 있습니다.");
    } else {
        println!("\n✅ {} 개 마이그레이션 적용 완료!", summary.applied.len());
        for filename in &summary.applied {
            println!("   - {}", filename);
        }
    }
    Ok(())
}

/// 마이그레이션 상태 확인
pub async fn run_status(config: &MigrateConfig) -> Result<()> {
    let files = load_files(config)?;
    let store = PgMigrationStore::connect(config).await?;
    let executor = MigrationExecutor::new(store);

    let applied = executor.store().applied_migrations().await?;
    let pending = executor.pending(&files).await?;

    println!("\n📊 마이그레이션 상태\n");
    for migration in &applied {
        println!(
            "  ✅ {}  ({})",
            migration.filename,
            migration.applied_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    for file in &pending {
        println!("  ⏳ {}", file.filename);
    }
    println!(
        "\n  적용: {} 개  대기: {} 개",
        applied.len(),
        pending.len()
    );

    Ok(())
}
