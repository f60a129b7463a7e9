//! 의존성 검증 SQL 마이그레이션 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 의존성 검증 (DB 불필요)
//! rota migrate verify -d migrations
//!
//! # 재정렬된 실행 순서 확인
//! rota migrate plan
//!
//! # 적용 (DATABASE_URL 또는 --db-url)
//! rota migrate apply --db-url postgres://localhost/app
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;
mod executor;
mod store;

use commands::migrate::{GraphFormat, OutputOptions};
use config::MigrateConfig;

#[derive(Parser)]
#[command(name = "rota")]
#[command(about = "Dependency-checked SQL migration runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (RUST_LOG가 없을 때 사용)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// JSON 로그 출력
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 마이그레이션 관리 (verify, plan, graph, apply, status)
    Migrate {
        /// 서브커맨드 (verify, plan, graph, apply, status)
        #[arg(value_name = "SUBCOMMAND")]
        action: String,

        /// 마이그레이션 디렉토리 (기본: MIGRATIONS_DIR 또는 migrations)
        #[arg(short, long)]
        dir: Option<String>,

        /// 상세 출력
        #[arg(long)]
        verbose: bool,

        /// 검증 보고서를 JSON으로 출력
        #[arg(long)]
        json: bool,

        /// 그래프 형식 (mermaid, dot, text)
        #[arg(long, default_value = "mermaid")]
        format: String,

        /// 데이터베이스 URL
        #[arg(long)]
        db_url: Option<String>,

        /// 대상 스키마
        #[arg(long)]
        schema: Option<String>,

        /// 닫히지 않은 달러 인용/문자열을 에러로 처리
        #[arg(long)]
        strict: bool,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rota={0},rota_core={0}", log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    // .env 로드 포함
    let mut config = MigrateConfig::from_env();

    match cli.command {
        Commands::Migrate {
            action,
            dir,
            verbose,
            json,
            format,
            db_url,
            schema,
            strict,
        } => {
            let graph_format = GraphFormat::parse(&format).with_context(|| {
                format!("Invalid format: {}. Supported: mermaid, dot, text", format)
            })?;

            if let Some(dir) = dir {
                config.migrations_dir = dir.into();
            }
            if db_url.is_some() {
                config.database_url = db_url;
            }
            if let Some(schema) = schema {
                config.schema = schema;
            }
            config.strict_lexing |= strict;

            let output = OutputOptions {
                verbose,
                json,
                graph_format,
            };

            match action.as_str() {
                "verify" => {
                    if !commands::migrate::run_verify(&config, &output)? {
                        bail!("마이그레이션 검증 실패");
                    }
                }
                "plan" => {
                    if !commands::migrate::run_plan(&config)? {
                        bail!("마이그레이션 검증 실패");
                    }
                }
                "graph" => {
                    let rendered = commands::migrate::run_graph(&config, &output)?;
                    println!("{}", rendered);
                }
                "apply" => {
                    commands::migrate::run_apply(&config).await?;
                }
                "status" => {
                    commands::migrate::run_status(&config).await?;
                }
                _ => {
                    error!("Unknown migrate action: {}", action);
                    println!("\n사용 가능한 액션:");
                    println!("  verify - 마이그레이션 의존성 검증");
                    println!("  plan   - 파일별 실행 순서 출력");
                    println!("  graph  - 의존성 그래프 출력");
                    println!("  apply  - 검증 후 마이그레이션 적용");
                    println!("  status - 적용/대기 상태");
                    bail!("Unknown action: {}", action);
                }
            }
        }
    }

    Ok(())
}
