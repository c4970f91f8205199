//! 应用配置模块
//!
//! 负责从环境变量加载应用配置，包括：
//! - 服务器监听地址和端口
//! - Gemini API key、地址和模型
//! - 静态文件目录
//! - provocation 库文件路径
//! - 日志格式

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::library::LibraryPaths;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// 应用配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器监听地址（如 "0.0.0.0" 或 "127.0.0.1"）
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// Gemini API key，缺失时中继返回配置错误
    pub gemini_api_key: Option<String>,
    /// Gemini API 根地址
    pub gemini_base_url: String,
    /// Gemini 模型名称
    pub gemini_model: String,
    /// 静态文件目录
    pub static_dir: PathBuf,
    /// thinkers / provocations / 评分文件
    pub library: LibraryPaths,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// 读取 `RELAY_LOG_FORMAT`，在加载其它配置之前调用
    pub fn from_env() -> Self {
        Self::parse(std::env::var("RELAY_LOG_FORMAT").ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// # 环境变量
    ///
    /// - `RELAY_HOST`: 服务器监听地址（默认: "0.0.0.0"）
    /// - `PORT`: 服务器监听端口（默认: 3000）
    /// - `GEMINI_API_KEY`: Gemini API key（可选，空字符串视为未设置）
    /// - `GEMINI_API_BASE_URL`: Gemini API 根地址
    /// - `GEMINI_MODEL`: Gemini 模型名称
    /// - `RELAY_STATIC_DIR`: 静态文件目录（默认: "public"）
    /// - `RELAY_THINKERS_FILE`: thinkers 文件（默认: "thinkers.json"）
    /// - `RELAY_PROVOCATIONS_FILE`: provocations 文件（默认: "provocations.json"）
    /// - `RELAY_SCORES_FILE`: 评分文件（默认: "provocations_scores.json"）
    ///
    /// # 错误
    ///
    /// - 如果 `PORT` 不是有效的端口号
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意键值查找函数构建配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("RELAY_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a valid port number")?;

        let gemini_api_key = lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());

        let gemini_base_url = lookup("GEMINI_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        let gemini_model =
            lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let static_dir =
            PathBuf::from(lookup("RELAY_STATIC_DIR").unwrap_or_else(|| "public".into()));

        let library = LibraryPaths {
            thinkers: lookup("RELAY_THINKERS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("thinkers.json")),
            provocations: lookup("RELAY_PROVOCATIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("provocations.json")),
            scores: lookup("RELAY_SCORES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("provocations_scores.json")),
        };

        Ok(Self {
            host,
            port,
            gemini_api_key,
            gemini_base_url,
            gemini_model,
            static_dir,
            library,
        })
    }

    /// 静态文件目录，目录不存在时返回 None
    pub fn static_dir(&self) -> Option<&Path> {
        self.static_dir.is_dir().then_some(self.static_dir.as_path())
    }
}
