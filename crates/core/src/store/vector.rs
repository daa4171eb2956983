//! Local append-only vector index.
//!
//! The teacher talks to a standalone Qdrant service (`storage/qdrant/mod.rs`); there is no
//! embedded-mode Qdrant, so this engine ships its own minimal index modeled on the same
//! add/remove/search/stats shape, backed by two flat files instead of a network service.
//! `vectors.idx` holds `f32` vectors back-to-back; `vectors.map` holds one
//! `"{id}\t{namespace}\t{dim}\n"` line per vector, in the same order, serving as the
//! on-disk row directory. Both are rewritten wholesale on every mutation — acceptable for
//! the personal-scale record counts this engine targets (SPEC_FULL §5).

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub namespace: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    namespace: String,
    vector: Vec<f32>,
}

pub struct VectorIndex {
    idx_path: PathBuf,
    map_path: PathBuf,
    entries: RwLock<Vec<Entry>>,
}

impl VectorIndex {
    #[tracing::instrument(name = "vector_index.open", skip(idx_path, map_path))]
    pub async fn open(idx_path: impl Into<PathBuf>, map_path: impl Into<PathBuf>) -> Result<Self> {
        let idx_path = idx_path.into();
        let map_path = map_path.into();
        let entries = load(&idx_path, &map_path)
            .await
            .context("failed to load vector index from disk")?;
        Ok(Self {
            idx_path,
            map_path,
            entries: RwLock::new(entries),
        })
    }

    pub async fn add(&self, id: &str, vector: &[f32]) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.id != id);
        let namespace = id.split_once(':').map(|(ns, _)| ns.to_string()).unwrap_or_default();
        entries.push(Entry {
            id: id.to_string(),
            namespace,
            vector: vector.to_vec(),
        });
        persist(&self.idx_path, &self.map_path, &entries).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() != before {
            persist(&self.idx_path, &self.map_path, &entries).await?;
        }
        Ok(())
    }

    pub async fn remove_namespace(&self, namespace: &str) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.namespace != namespace);
        let removed = (before - entries.len()) as u64;
        if removed > 0 {
            persist(&self.idx_path, &self.map_path, &entries).await?;
        }
        Ok(removed)
    }

    pub async fn search(&self, query: &[f32], namespace: Option<&str>, top_k: usize) -> Result<Vec<SearchHit>> {
        let entries = self.entries.read().await;
        let mut scored: Vec<SearchHit> = entries
            .iter()
            .filter(|e| namespace.is_none_or(|ns| e.namespace == ns))
            .filter(|e| e.vector.len() == query.len())
            .map(|e| SearchHit {
                id: e.id.clone(),
                namespace: e.namespace.clone(),
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    pub async fn stats(&self) -> HashMap<String, usize> {
        let entries = self.entries.read().await;
        let mut counts = HashMap::new();
        for entry in entries.iter() {
            *counts.entry(entry.namespace.clone()).or_insert(0) += 1;
        }
        counts
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

async fn load(idx_path: &PathBuf, map_path: &PathBuf) -> Result<Vec<Entry>> {
    if !map_path.exists() || !idx_path.exists() {
        return Ok(Vec::new());
    }
    let map_contents = tokio::fs::read_to_string(map_path).await.context("failed to read vectors.map")?;
    let idx_bytes = tokio::fs::read(idx_path).await.context("failed to read vectors.idx")?;

    let mut entries = Vec::new();
    let mut offset = 0usize;
    for line in map_contents.lines() {
        let mut parts = line.splitn(3, '\t');
        let id = parts.next().unwrap_or_default().to_string();
        let namespace = parts.next().unwrap_or_default().to_string();
        let dim: usize = parts
            .next()
            .unwrap_or("0")
            .parse()
            .context("corrupt vectors.map dimension field")?;
        let byte_len = dim * std::mem::size_of::<f32>();
        let slice = idx_bytes
            .get(offset..offset + byte_len)
            .context("vectors.idx shorter than vectors.map declares")?;
        let vector = slice
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        entries.push(Entry { id, namespace, vector });
        offset += byte_len;
    }
    Ok(entries)
}

async fn persist(idx_path: &PathBuf, map_path: &PathBuf, entries: &[Entry]) -> Result<()> {
    let mut idx_bytes = Vec::new();
    let mut map_lines = String::new();
    for entry in entries {
        for component in &entry.vector {
            idx_bytes.extend_from_slice(&component.to_le_bytes());
        }
        map_lines.push_str(&format!("{}\t{}\t{}\n", entry.id, entry.namespace, entry.vector.len()));
    }
    if let Some(parent) = idx_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    tokio::fs::write(idx_path, idx_bytes).await.context("failed to write vectors.idx")?;
    tokio::fs::write(map_path, map_lines).await.context("failed to write vectors.map")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_search_returns_closest_match() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("v.idx"), dir.path().join("v.map")).await.unwrap();

        index.add("lifelog:1", &[1.0, 0.0, 0.0]).await.unwrap();
        index.add("lifelog:2", &[0.0, 1.0, 0.0]).await.unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], None, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "lifelog:1");
    }

    #[tokio::test]
    async fn remove_namespace_drops_only_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path().join("v.idx"), dir.path().join("v.map")).await.unwrap();

        index.add("lifelog:1", &[1.0, 0.0]).await.unwrap();
        index.add("news:1", &[0.0, 1.0]).await.unwrap();

        let removed = index.remove_namespace("lifelog").await.unwrap();
        assert_eq!(removed, 1);
        let stats = index.stats().await;
        assert_eq!(stats.get("news"), Some(&1));
        assert_eq!(stats.get("lifelog"), None);
    }

    #[tokio::test]
    async fn persisted_index_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("v.idx");
        let map_path = dir.path().join("v.map");
        {
            let index = VectorIndex::open(&idx_path, &map_path).await.unwrap();
            index.add("lifelog:1", &[0.5, 0.5]).await.unwrap();
        }
        let reopened = VectorIndex::open(&idx_path, &map_path).await.unwrap();
        let hits = reopened.search(&[0.5, 0.5], None, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
