//! Local reply classification
//!
//! Small talk and questions about the assistant itself are answered locally;
//! they carry nothing the retrieval pipeline could ground.

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hiya",
    "howdy",
    "greetings",
    "yo",
    "good morning",
    "good afternoon",
    "good evening",
    "whats up",
    "sup",
];

/// Words that may follow a greeting without making it a real question
const GREETING_TAILS: &[&str] = &[
    "there",
    "everyone",
    "all",
    "assistant",
    "bot",
    "how are you",
    "there how are you",
];

const META_QUERIES: &[&str] = &[
    "help",
    "who are you",
    "what are you",
    "what is this",
    "what can you do",
    "what do you do",
    "how do you work",
    "how does this work",
    "how can you help",
    "how can you help me",
    "what can i ask",
    "what can i ask you",
    "what should i ask",
];

/// A reply produced without calling the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalReply {
    /// Greeting or small talk
    Greeting,
    /// Question about the assistant itself
    MetaQuery,
}

impl LocalReply {
    /// Canned reply text
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::Greeting => {
                "Hello! I can answer questions about the documents in your knowledge base. What would you like to know?"
            }
            Self::MetaQuery => {
                "I answer questions using the documents your team has uploaded, and I list the sources behind every answer. Try asking about a policy, a report or a process described in your files."
            }
        }
    }
}

/// Lowercase, drop punctuation, collapse whitespace
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether the text is a greeting
#[must_use]
pub fn is_greeting(text: &str) -> bool {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return false;
    }
    GREETINGS.iter().any(|greeting| {
        normalized == *greeting
            || normalized
                .strip_prefix(greeting)
                .and_then(|rest| rest.strip_prefix(' '))
                .is_some_and(|tail| GREETING_TAILS.contains(&tail))
    })
}

/// Whether the text asks about the assistant itself
#[must_use]
pub fn is_meta_query(text: &str) -> bool {
    let normalized = normalize(text);
    META_QUERIES.contains(&normalized.as_str())
}

/// Classify in order: greeting, then meta query
#[must_use]
pub fn classify(text: &str) -> Option<LocalReply> {
    if is_greeting(text) {
        Some(LocalReply::Greeting)
    } else if is_meta_query(text) {
        Some(LocalReply::MetaQuery)
    } else {
        None
    }
}
