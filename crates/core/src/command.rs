//! Detection of spoken end-of-conversation commands.

/// Closing phrases recognized when no deployment-specific list is configured.
pub const DEFAULT_END_PHRASES: &[&str] = &[
    "завершить диалог",
    "закончить диалог",
    "завершим диалог",
    "закончим диалог",
    "завершить разговор",
    "закончить разговор",
    "завершим разговор",
    "закончим разговор",
    "до свидания",
    "прощай",
    "пока",
    "всего доброго",
    "end the conversation",
    "end conversation",
    "goodbye",
    "good bye",
];

/// Matches transcribed utterances against a set of closing phrases.
#[derive(Debug, Clone)]
pub struct EndCommandMatcher {
    phrases: Vec<String>,
}

impl Default for EndCommandMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_END_PHRASES.iter().copied())
    }
}

impl EndCommandMatcher {
    /// Builds a matcher from phrases; blank phrases are discarded since they
    /// would match every utterance.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn matches(&self, text: &str) -> bool {
        let normalized = normalize(text);
        self.phrases.iter().any(|p| normalized.contains(p.as_str()))
    }
}

/// Checks `text` against the default closing phrases.
pub fn check_for_end_command(text: &str) -> bool {
    let normalized = normalize(text);
    DEFAULT_END_PHRASES
        .iter()
        .any(|p| normalized.contains(p))
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
