//! Whitespace/zero-width cleanup, the first stage of every chain.

use super::Processor;
use crate::errors::IngestError;
use crate::models::Record;
use async_trait::async_trait;
use unicode_normalization::UnicodeNormalization;

pub struct BasicCleaning;

#[async_trait]
impl Processor for BasicCleaning {
    fn name(&self) -> &'static str {
        "basic_cleaning"
    }

    async fn apply(&self, mut record: Record) -> Result<Option<Record>, IngestError> {
        let cleaned: String = record
            .content
            .nfc()
            .filter(|c| !is_zero_width(*c))
            .collect();
        record.content = collapse_whitespace(&cleaned);
        Ok(Some(record))
    }
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}')
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn collapses_runs_of_whitespace() {
        let record = Record::new("news", "1", "  a   b\n\nc  ", json!({}), chrono::Utc::now());
        let result = BasicCleaning.apply(record).await.unwrap().unwrap();
        assert_eq!(result.content, "a b c");
    }

    #[tokio::test]
    async fn strips_zero_width_characters() {
        let record = Record::new("news", "1", "a\u{200B}b", json!({}), chrono::Utc::now());
        let result = BasicCleaning.apply(record).await.unwrap().unwrap();
        assert_eq!(result.content, "ab");
    }
}
