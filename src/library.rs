//! Provocation 库
//!
//! thinkers、provocations 和评分文件的读写。批量生成命令和浏览/投票接口共用这里的类型。
//! 所有文件都是 UTF-8 JSON，缺失或损坏时按空数据处理。

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Deserialize)]
pub struct Thinker {
    pub name: String,
    pub spirit_instruction: String,
    #[serde(default)]
    pub seeds: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ThinkersFile {
    thinkers: Vec<Thinker>,
}

/// 赞成 / 反对票数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub up: u64,
    pub down: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provocation {
    pub setup: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<VoteTally>,
    /// 文件中其它字段原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Provocation {
    pub fn new(setup: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            setup: setup.into(),
            task: task.into(),
            votes: None,
            extra: Map::new(),
        }
    }
}

/// 评分文件中的一条记录，`vote` 为 "up" 或 "down"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub setup: String,
    pub task: String,
    pub vote: String,
}

/// 加载 thinkers 文件，丢弃没有 seed 的条目
pub async fn load_thinkers(path: impl AsRef<Path>) -> Result<Vec<Thinker>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read thinkers file {}", path.display()))?;
    let file: ThinkersFile = serde_json::from_str(&content)
        .with_context(|| format!("Invalid thinkers file {}", path.display()))?;

    let thinkers: Vec<Thinker> = file
        .thinkers
        .into_iter()
        .filter(|t| !t.seeds.is_empty())
        .collect();

    if thinkers.is_empty() {
        bail!("No thinkers with seeds in {}", path.display());
    }
    Ok(thinkers)
}

async fn load_json_or<T>(path: &Path, fallback: T) -> T
where
    T: serde::de::DeserializeOwned,
{
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(_) => return fallback,
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
        fallback
    })
}

async fn save_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data)?;
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// 加载已有的 provocation，文件缺失或损坏时从空列表开始
pub async fn load_existing_provocations(path: impl AsRef<Path>) -> Vec<Provocation> {
    load_json_or(path.as_ref(), Vec::new()).await
}

pub async fn save_provocations(path: impl AsRef<Path>, provocations: &[Provocation]) -> Result<()> {
    save_json(path.as_ref(), provocations).await
}

/// 把 `{ "thinkers": [...] }` 转成前端使用的 name → 描述 映射
///
/// 其它结构原样返回，文件缺失时返回 `{}`
pub fn thinker_catalog(data: Value) -> Value {
    let Some(thinkers) = data.get("thinkers").and_then(Value::as_array) else {
        return data;
    };

    let catalog: Map<String, Value> = thinkers
        .iter()
        .map(|thinker| {
            let name = thinker
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();
            let description = thinker
                .get("spirit_instruction")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let entry = serde_json::json!({
                "description": description,
                "themes": [],
                "keywords": []
            });
            (name, entry)
        })
        .collect();

    Value::Object(catalog)
}

/// 投票结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    UnknownId,
}

/// 库文件路径
#[derive(Debug, Clone)]
pub struct LibraryPaths {
    pub thinkers: PathBuf,
    pub provocations: PathBuf,
    pub scores: PathBuf,
}

impl LibraryPaths {
    /// 目录下的默认文件名
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            thinkers: dir.join("thinkers.json"),
            provocations: dir.join("provocations.json"),
            scores: dir.join("provocations_scores.json"),
        }
    }
}

/// 基于文件的 provocation 库
///
/// 写操作是 读-改-写 整个文件，用互斥锁串行化
pub struct ProvocationLibrary {
    paths: LibraryPaths,
    write_lock: Mutex<()>,
}

impl ProvocationLibrary {
    pub fn new(paths: LibraryPaths) -> Self {
        Self {
            paths,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn thinker_catalog(&self) -> Value {
        let data = load_json_or(&self.paths.thinkers, Value::Object(Map::new())).await;
        thinker_catalog(data)
    }

    pub async fn provocations(&self) -> Vec<Provocation> {
        load_existing_provocations(&self.paths.provocations).await
    }

    /// 给第 `id` 条 provocation 投票，`up` 为 false 时记为反对
    pub async fn vote(&self, id: i64, up: bool) -> Result<VoteOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut provocations = self.provocations().await;

        let Some(provocation) = usize::try_from(id)
            .ok()
            .and_then(|index| provocations.get_mut(index))
        else {
            return Ok(VoteOutcome::UnknownId);
        };

        let tally = provocation.votes.get_or_insert_with(VoteTally::default);
        if up {
            tally.up += 1;
        } else {
            tally.down += 1;
        }

        save_provocations(&self.paths.provocations, &provocations).await?;
        Ok(VoteOutcome::Recorded)
    }

    pub async fn scores(&self) -> Vec<ScoreEntry> {
        load_json_or(&self.paths.scores, Vec::new()).await
    }

    /// 评分文件中还没有出现过的 provocation
    pub async fn unvoted(&self) -> Vec<Provocation> {
        let scored: HashSet<String> = self.scores().await.into_iter().map(|s| s.task).collect();
        self.provocations()
            .await
            .into_iter()
            .filter(|p| !scored.contains(&p.task))
            .collect()
    }

    pub async fn record_score(&self, entry: ScoreEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut scores = self.scores().await;
        scores.push(entry);
        save_json(&self.paths.scores, &scores).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn write(path: &Path, value: Value) {
        std::fs::write(path, value.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_load_thinkers_skips_seedless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thinkers.json");
        write(
            &path,
            json!({ "thinkers": [
                { "name": "A", "spirit_instruction": "a", "seeds": ["x"] },
                { "name": "B", "spirit_instruction": "b", "seeds": [] }
            ]}),
        );

        let thinkers = load_thinkers(&path).await.unwrap();
        assert_eq!(thinkers.len(), 1);
        assert_eq!(thinkers[0].name, "A");
    }

    #[tokio::test]
    async fn test_load_thinkers_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_thinkers(dir.path().join("nope.json")).await.is_err());
    }

    #[tokio::test]
    async fn test_existing_provocations_fallback_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provocations.json");

        assert!(load_existing_provocations(&path).await.is_empty());

        std::fs::write(&path, "not json").unwrap();
        assert!(load_existing_provocations(&path).await.is_empty());

        let items = vec![Provocation::new("Un café.", "Boire.")];
        assert_ok!(save_provocations(&path, &items).await);
        assert!(std::fs::read_to_string(&path).unwrap().contains("Un café."));
        assert_eq!(load_existing_provocations(&path).await, items);
    }

    #[tokio::test]
    async fn test_unknown_fields_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provocations.json");
        write(
            &path,
            json!([{ "setup": "s", "task": "t", "thinker": "Cage" }]),
        );

        let items = load_existing_provocations(&path).await;
        assert_eq!(items[0].extra["thinker"], "Cage");
        save_provocations(&path, &items).await.unwrap();

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved[0]["thinker"], "Cage");
    }

    #[test]
    fn test_thinker_catalog_maps_names() {
        let catalog = thinker_catalog(json!({ "thinkers": [
            { "name": "Cage", "spirit_instruction": "Listen.", "seeds": ["x"] },
            { "spirit_instruction": "Nameless." }
        ]}));

        assert_eq!(
            catalog,
            json!({
                "Cage": { "description": "Listen.", "themes": [], "keywords": [] },
                "Unknown": { "description": "Nameless.", "themes": [], "keywords": [] }
            })
        );
    }

    #[test]
    fn test_thinker_catalog_passes_other_shapes_through() {
        let data = json!({ "Cage": { "description": "Listen." } });
        assert_eq!(thinker_catalog(data.clone()), data);
    }

    #[tokio::test]
    async fn test_vote_counts_and_range_checks() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LibraryPaths::under(dir.path());
        save_provocations(&paths.provocations, &[Provocation::new("s", "t")])
            .await
            .unwrap();
        let library = ProvocationLibrary::new(paths);

        assert_eq!(library.vote(0, true).await.unwrap(), VoteOutcome::Recorded);
        assert_eq!(library.vote(0, true).await.unwrap(), VoteOutcome::Recorded);
        assert_eq!(library.vote(0, false).await.unwrap(), VoteOutcome::Recorded);
        assert_eq!(library.vote(1, true).await.unwrap(), VoteOutcome::UnknownId);
        assert_eq!(library.vote(-1, true).await.unwrap(), VoteOutcome::UnknownId);

        let votes = library.provocations().await[0].votes;
        assert_eq!(votes, Some(VoteTally { up: 2, down: 1 }));
    }

    #[tokio::test]
    async fn test_unvoted_excludes_scored_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LibraryPaths::under(dir.path());
        save_provocations(
            &paths.provocations,
            &[Provocation::new("s1", "t1"), Provocation::new("s2", "t2")],
        )
        .await
        .unwrap();
        let library = ProvocationLibrary::new(paths);

        library
            .record_score(ScoreEntry {
                setup: "s1".into(),
                task: "t1".into(),
                vote: "up".into(),
            })
            .await
            .unwrap();

        let unvoted = library.unvoted().await;
        assert_eq!(unvoted, vec![Provocation::new("s2", "t2")]);
        assert_eq!(library.scores().await.len(), 1);
    }
}
