use crate::request::GenerationResult;

/// Results of one interactive session, oldest first.
///
/// Only successful generations are appended. Entries are never edited or
/// removed individually; `clear` drops everything.
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    entries: Vec<GenerationResult>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: GenerationResult) {
        self.entries.push(result);
    }

    pub fn list(&self) -> &[GenerationResult] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GenerationResult> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&GenerationResult> {
        self.entries.last()
    }

    /// Case-insensitive match against content type, generated text and
    /// timestamp. Returns `(index, result)` pairs in chronological order.
    pub fn search(&self, term: &str) -> Vec<(usize, &GenerationResult)> {
        let needle = term.trim().to_lowercase();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, result)| needle.is_empty() || matches_term(result, &needle))
            .collect()
    }
}

fn matches_term(result: &GenerationResult, needle: &str) -> bool {
    let kind = result.request.content_type;
    kind.label().to_lowercase().contains(needle)
        || kind.name().contains(needle)
        || result.text.to_lowercase().contains(needle)
        || result.display_time().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ContentType, GenerationRequest};
    use chrono::{TimeZone, Utc};

    fn result(kind: ContentType, text: &str, day: u32) -> GenerationResult {
        GenerationResult::at(
            GenerationRequest::new(kind, "topic"),
            text,
            Utc.with_ymd_and_hms(2024, 5, day, 9, 30, 0).unwrap(),
        )
    }

    #[test]
    fn append_preserves_insertion_order() {
        let mut history = HistoryStore::new();
        assert!(history.is_empty());
        history.append(result(ContentType::BlogPost, "one", 1));
        history.append(result(ContentType::MarketingCopy, "two", 2));
        history.append(result(ContentType::Other, "three", 3));

        let texts: Vec<_> = history.list().iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        assert_eq!(history.latest().map(|r| r.text.as_str()), Some("three"));
        assert_eq!(history.get(1).map(|r| r.text.as_str()), Some("two"));
        assert!(history.get(3).is_none());
    }

    #[test]
    fn clear_empties_the_store() {
        let mut history = HistoryStore::new();
        history.append(result(ContentType::BlogPost, "one", 1));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }

    #[test]
    fn search_matches_type_text_and_date() {
        let mut history = HistoryStore::new();
        history.append(result(ContentType::BlogPost, "Rust ownership explained", 1));
        history.append(result(ContentType::SocialMedia, "Launch day!", 2));

        let hits: Vec<_> = history.search("OWNERSHIP").iter().map(|(i, _)| *i).collect();
        assert_eq!(hits, [0]);

        let hits: Vec<_> = history.search("social media").iter().map(|(i, _)| *i).collect();
        assert_eq!(hits, [1]);

        let hits: Vec<_> = history.search("2024-05-02").iter().map(|(i, _)| *i).collect();
        assert_eq!(hits, [1]);

        assert_eq!(history.search("").len(), 2);
        assert!(history.search("nothing here").is_empty());
    }
}
