//! Small-Talk Classifier.
//!
//! Greetings and thanks are answered locally so they never reach the model.
//! Anything mentioning the registry's vocabulary is treated as a data
//! question, even if it also contains a greeting.

use crate::query::reply::Reply;

const DOMAIN_KEYWORDS: &[&str] = &[
    "script",
    "form",
    "service",
    "field",
    "count",
    "list",
    "diagnosis",
    "progress note",
    "phd",
];

const GREETINGS: &[&str] = &["hi", "hello", "hey", "good morning", "good afternoon", "good evening"];
const THANKS: &[&str] = &["thank you", "thanks", "thx", "appreciate it"];
const HOW_ARE_YOU: &[&str] = &["how are you", "how's it going", "how are things"];

pub const GREETING_REPLY: &str = "Hello! How can I assist you with EHR scripts today?";
pub const THANKS_REPLY: &str = "You're welcome! Happy to help.";
pub const HOW_ARE_YOU_REPLY: &str =
    "I'm doing well, thanks for asking! What would you like to know about the scripts?";

/// Canned reply for small talk, `None` for everything else.
///
/// Matching is by substring on the lower-cased, trimmed utterance, so short
/// phrases like "hi" also match inside longer words ("this").
pub fn classify(utterance: &str) -> Option<Reply> {
    let text = utterance.trim().to_lowercase();

    if DOMAIN_KEYWORDS.iter().any(|k| text.contains(k)) {
        return None;
    }

    let matches = |phrases: &[&str]| phrases.iter().any(|p| text.contains(p));

    let reply = if matches(GREETINGS) {
        GREETING_REPLY
    } else if matches(THANKS) {
        THANKS_REPLY
    } else if matches(HOW_ARE_YOU) {
        HOW_ARE_YOU_REPLY
    } else {
        return None;
    };

    tracing::debug!("Small talk handled locally");
    Some(Reply::text(reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_text(utterance: &str) -> Option<String> {
        classify(utterance).and_then(|r| r.as_text().map(str::to_string))
    }

    #[test]
    fn greets() {
        assert_eq!(reply_text("Hello there").as_deref(), Some(GREETING_REPLY));
        assert_eq!(reply_text("  GOOD MORNING ").as_deref(), Some(GREETING_REPLY));
    }

    #[test]
    fn thanks() {
        assert_eq!(reply_text("thx!").as_deref(), Some(THANKS_REPLY));
        assert_eq!(reply_text("I appreciate it").as_deref(), Some(THANKS_REPLY));
    }

    #[test]
    fn how_are_you() {
        assert_eq!(reply_text("how's it going?").as_deref(), Some(HOW_ARE_YOU_REPLY));
    }

    #[test]
    fn greetings_take_priority() {
        // "hello" outranks "thanks".
        assert_eq!(reply_text("hello and thanks").as_deref(), Some(GREETING_REPLY));
    }

    #[test]
    fn domain_keywords_skip_classification() {
        assert!(classify("hi, list the scripts on diagnosis").is_none());
        assert!(classify("thanks, how many forms are there?").is_none());
        assert!(classify("PhD notes please").is_none());
    }

    #[test]
    fn unrelated_text_has_no_opinion() {
        assert!(classify("what namespaces exist?").is_none());
        assert!(classify("").is_none());
    }

    #[test]
    fn short_phrases_match_inside_words() {
        assert_eq!(reply_text("what is this").as_deref(), Some(GREETING_REPLY));
    }
}
