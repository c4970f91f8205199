//! Provoke Relay - Gemini API 中继服务
//!
//! 一个极简的 HTTP 中继：接收包含 system prompt 和 user prompt 的 JSON 请求，
//! 使用服务端持有的 API key 转发给 Gemini，并原样返回上游响应（或统一格式的错误）。
//!
//! # 功能特性
//!
//! - API key 只保存在服务端，不暴露给客户端
//! - 固定的 `setup` / `task` 响应 schema
//! - 统一的错误响应格式
//! - 静态文件托管和 CORS
//!
//! # 命令行接口
//!
//! - `serve`: 启动中继服务器
//! - `test`: 向本地服务器发送测试请求
//! - `generate`: 批量生成 provocation 并写入 JSON 文件

mod commands;
mod config;
mod gateway;
mod library;
mod providers;
mod relay;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{Config, LogFormat};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Provoke Relay CLI
#[derive(Parser)]
#[command(name = "provoke-relay")]
#[command(about = "Gemini provocation relay service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// 可用的命令
#[derive(Subcommand)]
enum Commands {
    /// 启动中继服务器
    Serve,
    /// 向本地服务器发送测试请求
    Test,
    /// 批量生成 provocation
    Generate {
        /// 目标数量（包含已存在的条目）
        #[arg(short, long, default_value_t = 200)]
        count: usize,
        /// Thinker 定义文件
        #[arg(long, default_value = "thinkers.json")]
        thinkers: PathBuf,
        /// 输出文件
        #[arg(short, long, default_value = "provocations.json")]
        output: PathBuf,
        /// 两次成功请求之间的停顿（毫秒）
        #[arg(long, default_value_t = 300)]
        pause_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    if let Ok(dotenv_path) = std::env::var("RELAY_ENV_FILE") {
        dotenvy::from_path(&dotenv_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    // 初始化日志系统，RELAY_LOG_FORMAT=json 时输出 JSON
    let (text_layer, json_layer) = match LogFormat::from_env() {
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
        LogFormat::Text => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            ),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "provoke_relay=info".into()),
        )
        .with(text_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve => commands::serve_command(config).await,
        Commands::Test => commands::test_command(config).await,
        Commands::Generate {
            count,
            thinkers,
            output,
            pause_ms,
        } => {
            let options = commands::GenerateOptions {
                count,
                thinkers_file: thinkers,
                output_file: output,
                pause: std::time::Duration::from_millis(pause_ms),
            };
            commands::generate_command(config, options).await
        }
    }
}
