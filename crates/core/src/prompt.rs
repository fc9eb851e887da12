//! Prompt assembly and completion cleanup.
//!
//! Two prompt shapes share this module: the plain chat prompt used in
//! free-chat mode (which predates retrieval and still serves it) and the
//! grounded prompt with numbered source blocks. They live together because
//! both feed the same generator and share the completion extraction logic.
//!
//! Token accounting here uses the caller-supplied [`TokenCounter`] tied to
//! the generator's real context window -- not the chunker's character
//! heuristic, which exists to keep offline artifacts tokenizer-free.

use serde::{Deserialize, Serialize};

use crate::traits::TokenCounter;
use crate::{RagError, Result};

/// Context window of the target generator, in tokens.
const CONTEXT_MAX_TOKENS: usize = 512;
/// Tokens reserved for the generation itself.
const RESERVE_TOKENS: usize = 100;
/// Maximum user message length after trimming, in characters.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Role prefixes the model sometimes echoes at the start of a completion.
const ROLE_PREFIXES: [&str; 4] = ["Assistant:", "Bot:", "AI:", "GPT:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One turn of conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    fn format(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// Builds chat and grounded prompts, and cleans completions.
pub struct PromptBuilder {
    context_max: usize,
    reserve: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            context_max: CONTEXT_MAX_TOKENS,
            reserve: RESERVE_TOKENS,
        }
    }
}

impl PromptBuilder {
    pub fn new(context_max: usize, reserve: usize) -> Self {
        Self {
            context_max,
            reserve,
        }
    }

    /// Token budget available for history.
    pub fn budget(&self) -> usize {
        self.context_max.saturating_sub(self.reserve)
    }

    /// Validates a user message: non-empty and at most 2000 characters
    /// after trimming. Returns the trimmed message.
    pub fn validate_message<'a>(&self, message: &'a str) -> Result<&'a str> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(RagError::InvalidMessage("message is empty".to_string()));
        }
        if trimmed.chars().count() > MAX_MESSAGE_CHARS {
            return Err(RagError::InvalidMessage(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(trimmed)
    }

    /// Builds the free-chat prompt.
    ///
    /// History messages are formatted as `User:`/`Assistant:` lines and
    /// dropped from the front until the estimate fits the budget; the most
    /// recent message always survives, so a single oversize message can
    /// legitimately blow the budget. The generation cue
    /// `\nUser: {message}\nAssistant:` is appended last.
    pub fn build_chat_prompt(
        &self,
        history: &[ChatMessage],
        new_message: &str,
        counter: &dyn TokenCounter,
    ) -> Result<String> {
        let message = self.validate_message(new_message)?;

        let formatted: Vec<String> = history.iter().map(ChatMessage::format).collect();
        let mut start = 0;
        let mut total: usize = formatted.iter().map(|line| counter.count(line)).sum();

        while total > self.budget() && start + 1 < formatted.len() {
            total -= counter.count(&formatted[start]);
            start += 1;
        }

        let kept = &formatted[start..];
        if kept.is_empty() {
            Ok(format!("User: {}\nAssistant:", message))
        } else {
            Ok(format!(
                "{}\nUser: {}\nAssistant:",
                kept.join("\n"),
                message
            ))
        }
    }

    /// Builds the grounded prompt: instruction header, numbered source
    /// blocks in retrieval order, the question, and the cue. The header is
    /// deliberately language-neutral; the model answers in the question's
    /// language.
    pub fn build_grounded_prompt(&self, question: &str, sources: &[&str]) -> String {
        let mut prompt = String::from(
            "Answer the question using ONLY the numbered sources below. \
             If the sources do not contain the answer, say that the documents \
             do not cover it. Reply in the same language as the question.\n\n",
        );

        for (i, source) in sources.iter().enumerate() {
            prompt.push_str(&format!("[Source {}]:\n{}\n\n", i + 1, source));
        }

        prompt.push_str(&format!("Question: {}\n\nAssistant:", question));
        prompt
    }

    /// Cleans a raw completion: cut at the first turn marker, strip one
    /// echoed role prefix, trim.
    pub fn extract_response(&self, raw: &str) -> String {
        let mut text = raw;

        let cut = ["\nUser:", "\nAssistant:"]
            .iter()
            .filter_map(|marker| text.find(marker))
            .min();
        if let Some(position) = cut {
            text = &text[..position];
        }

        let mut text = text.trim();
        for prefix in ROLE_PREFIXES {
            if let Some(stripped) = text.strip_prefix(prefix) {
                text = stripped.trim();
                break;
            }
        }

        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::HeuristicTokenCounter;

    fn builder() -> PromptBuilder {
        PromptBuilder::default()
    }

    #[test]
    fn test_budget() {
        assert_eq!(builder().budget(), 412);
    }

    #[test]
    fn test_validate_message() {
        let b = builder();
        assert_eq!(b.validate_message("  hello  ").unwrap(), "hello");
        assert!(matches!(
            b.validate_message("   "),
            Err(RagError::InvalidMessage(_))
        ));
        assert!(matches!(
            b.validate_message(&"x".repeat(2001)),
            Err(RagError::InvalidMessage(_))
        ));
        // Exactly at the limit is fine.
        assert!(b.validate_message(&"x".repeat(2000)).is_ok());
    }

    #[test]
    fn test_chat_prompt_shape() {
        let history = vec![
            ChatMessage::user("Привіт!"),
            ChatMessage::assistant("Вітаю! Чим допомогти?"),
        ];
        let prompt = builder()
            .build_chat_prompt(&history, "Де знайти статут?", &HeuristicTokenCounter)
            .unwrap();

        assert_eq!(
            prompt,
            "User: Привіт!\nAssistant: Вітаю! Чим допомогти?\nUser: Де знайти статут?\nAssistant:"
        );
    }

    #[test]
    fn test_chat_prompt_empty_history() {
        let prompt = builder()
            .build_chat_prompt(&[], "Hello", &HeuristicTokenCounter)
            .unwrap();
        assert_eq!(prompt, "User: Hello\nAssistant:");
    }

    #[test]
    fn test_chat_prompt_truncates_from_front() {
        // Ten messages of ~72 tokens each (counter sees the role prefix
        // too); the 412-token budget keeps the last five.
        let content = "x".repeat(280);
        let history: Vec<ChatMessage> =
            (0..10).map(|_| ChatMessage::user(content.clone())).collect();

        let counter = HeuristicTokenCounter;
        let prompt = builder()
            .build_chat_prompt(&history, "final question", &counter)
            .unwrap();

        let kept_lines = prompt.matches("User: ").count();
        // 5 history messages + the new-message cue.
        assert_eq!(kept_lines, 6);
        assert!(prompt.ends_with("\nUser: final question\nAssistant:"));

        let history_part = prompt.rsplit_once("\nUser: final question").unwrap().0;
        assert!(counter.count(history_part) <= builder().budget());
    }

    #[test]
    fn test_chat_prompt_keeps_oversize_last_message() {
        let history = vec![
            ChatMessage::user("short"),
            ChatMessage::assistant("x".repeat(4000)), // alone over budget
        ];
        let prompt = builder()
            .build_chat_prompt(&history, "next", &HeuristicTokenCounter)
            .unwrap();

        // The oversize most-recent message is retained, the earlier one
        // dropped; the prompt may exceed the budget.
        assert!(!prompt.contains("short"));
        assert!(prompt.contains(&"x".repeat(4000)));
    }

    #[test]
    fn test_chat_prompt_rejects_invalid_message() {
        assert!(builder()
            .build_chat_prompt(&[], "", &HeuristicTokenCounter)
            .is_err());
    }

    #[test]
    fn test_grounded_prompt_numbering() {
        let prompt = builder().build_grounded_prompt(
            "Які правила проживання?",
            &["Перше джерело.", "Друге джерело."],
        );

        assert!(prompt.contains("[Source 1]:\nПерше джерело."));
        assert!(prompt.contains("[Source 2]:\nДруге джерело."));
        let s1 = prompt.find("[Source 1]").unwrap();
        let s2 = prompt.find("[Source 2]").unwrap();
        assert!(s1 < s2);
        assert!(prompt.ends_with("Question: Які правила проживання?\n\nAssistant:"));
    }

    #[test]
    fn test_grounded_prompt_no_sources() {
        let prompt = builder().build_grounded_prompt("q", &[]);
        assert!(!prompt.contains("[Source"));
        assert!(prompt.ends_with("Question: q\n\nAssistant:"));
    }

    #[test]
    fn test_extract_response_cuts_at_turn_marker() {
        let b = builder();
        assert_eq!(
            b.extract_response("The answer is 42.\nUser: what else"),
            "The answer is 42."
        );
        assert_eq!(
            b.extract_response("First.\nAssistant: Second."),
            "First."
        );
    }

    #[test]
    fn test_extract_response_cuts_at_earliest_marker() {
        let raw = "Answer.\nAssistant: echo\nUser: next";
        assert_eq!(builder().extract_response(raw), "Answer.");
    }

    #[test]
    fn test_extract_response_strips_role_prefix() {
        let b = builder();
        assert_eq!(b.extract_response("Assistant: Hello there"), "Hello there");
        assert_eq!(b.extract_response("Bot: Hi"), "Hi");
        assert_eq!(b.extract_response("AI: Yes"), "Yes");
        assert_eq!(b.extract_response("GPT: Sure"), "Sure");
    }

    #[test]
    fn test_extract_response_trims() {
        assert_eq!(builder().extract_response("  padded  "), "padded");
        assert_eq!(builder().extract_response(""), "");
    }
}
