//! Generate 命令 - 批量生成 provocation
//!
//! 从 thinkers 文件中随机挑选 thinker 和 seed，调用上游生成 `setup` / `task`，
//! 去重后逐条写入输出文件，便于中断后继续。

use anyhow::{Context, Result};
use rand::seq::IndexedRandom;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::Config;
use crate::library::{
    load_existing_provocations, load_thinkers, save_provocations, Provocation, Thinker,
};
use crate::providers::{
    GeminiConfig, GeminiProvider, Provider, UpstreamPayload, UpstreamStatusError,
};
use crate::utils::{build_upstream_client, truncate_for_log};

/// 限流后的初始等待时间
const INITIAL_BACKOFF: Duration = Duration::from_secs(5);

/// 其它错误后的等待时间
const ERROR_PAUSE: Duration = Duration::from_secs(10);

const SYSTEM_PROMPT_RULES: &str = r#"You are a generator of small, poetic, and actionable creative provocations. You translate a dense artistic concept into a simple, everyday task. You will return a JSON object with two keys: "setup" and "task".

// --- PRIMARY DIRECTIVES ---
**1. The "Anti-Homework" Mandate:** The task must NEVER feel like homework. It must avoid long-form writing or complex research.
**2. The "Simplicity Filter":** The core task must be a single, elegant action explainable in one sentence.
**3. The "Artifact Guarantee":** Every task MUST result in a small, simple physical or digital artifact (a photo, a note, a drawing).
**4. The "Weirdness" Bias:** Favor the slightly strange or subversive option.

// --- CORE RULES ---
- The "setup" must be a single, short, poetic sentence.
- The task must be a physical, tangible action.
- Forbid abstract tasks like "imagine" or "consider".
- NEVER mention the original source, person, or use any special jargon."#;

/// Generate 命令参数
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub count: usize,
    pub thinkers_file: PathBuf,
    pub output_file: PathBuf,
    pub pause: Duration,
}

pub fn build_prompts(thinker: &Thinker, seed: &str) -> (String, String) {
    let system_prompt = format!(
        "{}\n\n**SPECIAL INSTRUCTION FOR THIS GENERATION (The 'Guiding Spirit'):**\n// {} //\n{}",
        SYSTEM_PROMPT_RULES, thinker.name, thinker.spirit_instruction
    );
    let user_prompt = format!(
        "Based on the following conceptual seed, generate a creative provocation that follows all the rules, especially the 'Guiding Spirit' instruction.\n\nCONCEPTUAL SEED: \"\"\"{}\"\"\"",
        seed
    );
    (system_prompt, user_prompt)
}

/// 去掉模型偶尔包裹的 Markdown 代码块
fn strip_code_fence(text: &str) -> &str {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").ok());

    fence
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| text.trim())
}

/// 从 generateContent 响应中取出第一段文本并解析为 Provocation
pub fn extract_provocation(body: &[u8]) -> Result<Provocation> {
    let envelope: Value = serde_json::from_slice(body).context("Invalid Gemini response")?;
    let text = envelope
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|v| v.as_str())
        .context("Gemini response contains no text")?;

    serde_json::from_str(strip_code_fence(text)).context("Generated text is not a provocation")
}

/// 指数退避，每次翻倍，成功后复位
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub struct Generator {
    provider: Arc<dyn Provider>,
    api_key: String,
    thinkers: Vec<Thinker>,
    options: GenerateOptions,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn Provider>,
        api_key: String,
        thinkers: Vec<Thinker>,
        options: GenerateOptions,
    ) -> Self {
        Self {
            provider,
            api_key,
            thinkers,
            options,
        }
    }

    fn pick_prompts(&self) -> Result<(String, String)> {
        let mut rng = rand::rng();
        let thinker = self.thinkers.choose(&mut rng).context("No thinkers loaded")?;
        let seed = thinker.seeds.choose(&mut rng).context("Thinker has no seeds")?;
        Ok(build_prompts(thinker, seed))
    }

    pub async fn generate_one(&self) -> Result<Provocation> {
        let (system_prompt, user_prompt) = self.pick_prompts()?;
        let payload = UpstreamPayload::provocation(&system_prompt, &user_prompt);
        let body = self
            .provider
            .generate_content(&self.api_key, &payload)
            .await?;
        extract_provocation(&body)
    }

    /// 生成直到达到目标数量，每条新结果立即写盘
    pub async fn run(&self, provocations: &mut Vec<Provocation>) -> Result<()> {
        let mut seen: HashSet<String> = provocations.iter().map(|p| p.task.clone()).collect();
        let mut backoff = Backoff::new(INITIAL_BACKOFF);
        let target = self.options.count;

        while provocations.len() < target {
            match self.generate_one().await {
                Ok(provocation) => {
                    if !seen.insert(provocation.task.clone()) {
                        tracing::info!("Duplicate detected. Skipping.");
                        continue;
                    }

                    tracing::info!(
                        "({}/{}) Saved: {}",
                        provocations.len() + 1,
                        target,
                        truncate_for_log(&provocation.task, 80)
                    );
                    provocations.push(provocation);
                    save_provocations(&self.options.output_file, provocations).await?;

                    backoff.reset();
                    tokio::time::sleep(self.options.pause).await;
                }
                Err(err) => {
                    let rate_limited = err
                        .downcast_ref::<UpstreamStatusError>()
                        .is_some_and(UpstreamStatusError::is_rate_limited);

                    if rate_limited {
                        let delay = backoff.next_delay();
                        tracing::warn!(
                            "Rate limit hit. Waiting for {:?} before retrying...",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::warn!(
                            "Generation failed: {:#}. Retrying after {:?}...",
                            err,
                            ERROR_PAUSE
                        );
                        tokio::time::sleep(ERROR_PAUSE).await;
                    }
                }
            }
        }

        Ok(())
    }
}

/// 执行批量生成命令
///
/// 需要配置 `GEMINI_API_KEY`；Ctrl+C 会中止生成并保存已有结果
pub async fn generate_command(config: Config, options: GenerateOptions) -> Result<()> {
    let api_key = config
        .gemini_api_key
        .clone()
        .context("GEMINI_API_KEY environment variable is required")?;

    let thinkers = load_thinkers(&options.thinkers_file).await?;
    let mut provocations = load_existing_provocations(&options.output_file).await;

    println!("Found {} existing provocations.", provocations.len());
    println!("Goal is to generate {} total.", options.count);

    let provider = GeminiProvider::new(
        build_upstream_client()?,
        GeminiConfig {
            base_url: config.gemini_base_url.clone(),
            model: config.gemini_model.clone(),
        },
    );
    let output_file = options.output_file.clone();
    let generator = Generator::new(Arc::new(provider), api_key, thinkers, options);

    let outcome = tokio::select! {
        result = generator.run(&mut provocations) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nProcess interrupted by user.");
            Ok(())
        }
    };

    println!(
        "Finalizing... saving {} provocations to '{}'...",
        provocations.len(),
        output_file.display()
    );
    save_provocations(&output_file, &provocations).await?;
    println!("Done.");

    outcome
}
