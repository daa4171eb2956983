//! Lifelog segmentation: split long conversational content along speaker-turn boundaries.
//! `content` stays the full text (search still matches the whole conversation); the
//! per-turn breakdown moves to `metadata.segments` for callers that want structure.

use super::Processor;
use crate::errors::IngestError;
use crate::models::Record;
use async_trait::async_trait;
use serde_json::json;

const LENGTH_THRESHOLD: usize = 2000;
const MIN_SPEAKER_LINES: usize = 3;

pub struct Segmentation {
    length_threshold: usize,
    min_speaker_lines: usize,
}

impl Default for Segmentation {
    fn default() -> Self {
        Self {
            length_threshold: LENGTH_THRESHOLD,
            min_speaker_lines: MIN_SPEAKER_LINES,
        }
    }
}

#[async_trait]
impl Processor for Segmentation {
    fn name(&self) -> &'static str {
        "segmentation"
    }

    async fn apply(&self, mut record: Record) -> Result<Option<Record>, IngestError> {
        if record.content.len() <= self.length_threshold {
            return Ok(Some(record));
        }

        let lines: Vec<&str> = record.content.lines().collect();
        let speaker_lines = lines.iter().filter(|line| is_speaker_prefixed(line)).count();
        if speaker_lines < self.min_speaker_lines {
            return Ok(Some(record));
        }

        let segments = segment_by_speaker_turns(&lines);
        record.metadata["segments"] = json!(segments);
        Ok(Some(record))
    }
}

fn is_speaker_prefixed(line: &str) -> bool {
    match line.split_once(':') {
        Some((prefix, _)) => !prefix.is_empty() && prefix.len() < 64 && !prefix.contains(' '),
        None => false,
    }
}

fn segment_by_speaker_turns(lines: &[&str]) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for line in lines {
        if is_speaker_prefixed(line) && !current.is_empty() {
            segments.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        segments.push(current.trim().to_string());
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn short_content_is_not_segmented() {
        let record = Record::new("lifelog", "1", "short", json!({}), chrono::Utc::now());
        let result = Segmentation::default().apply(record).await.unwrap().unwrap();
        assert!(result.metadata.get("segments").is_none());
    }

    #[tokio::test]
    async fn long_conversational_content_is_split_by_speaker() {
        let mut content = String::new();
        for i in 0..5 {
            content.push_str(&format!("Alice: message number {i} with some extra padding text to grow length\n"));
            content.push_str(&format!("Bob: reply number {i} with some extra padding text to grow length\n"));
        }
        while content.len() <= LENGTH_THRESHOLD {
            content.push_str("Alice: more padding to exceed the threshold for segmentation test purposes\n");
        }
        let record = Record::new("lifelog", "1", content, json!({}), chrono::Utc::now());
        let result = Segmentation::default().apply(record).await.unwrap().unwrap();
        let segments = result.metadata["segments"].as_array().unwrap();
        assert!(segments.len() > 1);
    }
}
