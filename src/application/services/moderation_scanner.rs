use std::collections::BTreeSet;

/// Case-insensitive keyword matcher used to raise moderation flags.
#[derive(Debug, Clone, Default)]
pub struct ModerationScanner {
    keywords: Vec<String>,
}

impl ModerationScanner {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: BTreeSet<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            keywords: keywords.into_iter().collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Distinct configured keywords found anywhere in `text`, sorted.
    pub fn scan(&self, text: &str) -> Vec<String> {
        self.scan_all([text])
    }

    /// Same as [`scan`](Self::scan) over several texts, merged into one set.
    pub fn scan_all<'a, I>(&self, texts: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hits = BTreeSet::new();
        for text in texts {
            let lower = text.to_lowercase();
            for keyword in &self.keywords {
                if lower.contains(keyword.as_str()) {
                    hits.insert(keyword.clone());
                }
            }
        }
        hits.into_iter().collect()
    }
}
