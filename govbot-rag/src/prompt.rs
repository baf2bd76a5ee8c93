//! Prompt construction.
//!
//! The [`PromptBuilder`] turns a grounding context and a conversation into
//! the message list sent to the completion service: one system message with
//! the persona, the context block and the answering rules, followed by the
//! selected conversation turns with the last turn reinforced.

use serde::{Deserialize, Serialize};

use crate::document::{Message, Role};

/// Marker placed immediately before the grounding context.
pub const CONTEXT_START: &str = "START CONTEXT BLOCK";

/// Marker placed immediately after the grounding context.
pub const CONTEXT_END: &str = "END OF CONTEXT BLOCK";

/// The sentence the model is told to answer with when the context is silent.
pub const FALLBACK_ANSWER: &str = "I'm sorry, but I don't know the answer to that question";

/// Appended to the last conversation turn before it is sent.
pub const INSTRUCTION_SUFFIX: &str = ".Give the information only from the provided CONTEXT. \
Do not give me any information that are not mentioned in the provided CONTEXT.";

const PERSONA: &str = "\
AI assistant is a brand new, powerful, human-like artificial intelligence.
The traits of AI include expert knowledge, helpfulness, cleverness, empathy, and articulateness.
AI will introduce itself as New Mexico Government Services Bot and will ask for the user's name and call them by name henceforth.
AI will greet user automatically as \"Hello there! I am New Mexico Government Services Bot. Can you please tell me your name ?\".
AI treats and answers with empathy.
AI is a well-behaved and well-mannered individual.
AI is always friendly, kind, and inspiring to the user.
AI assistant must assume that the user is a resident of the New Mexico state in USA and answer all the questions empathetically and personally by addressing the user by their first name.";

const MARKDOWN_RULES: &str = "\
AI assistant will format every answer in Markdown, using only headings, bold and italic text, bulleted and numbered lists, and links.
AI assistant will never include images in an answer.";

/// Which conversation turns are forwarded to the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Forward only `user` turns; earlier assistant answers are dropped.
    #[default]
    UserOnly,
    /// Forward every turn as received.
    FullHistory,
}

/// Builds the message list for one completion call.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    history: HistoryPolicy,
    markdown: bool,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose which conversation turns are forwarded.
    pub fn history(mut self, policy: HistoryPolicy) -> Self {
        self.history = policy;
        self
    }

    /// Add the markdown formatting rules to the system message.
    pub fn markdown(mut self, enabled: bool) -> Self {
        self.markdown = enabled;
        self
    }

    /// The system message for `context`.
    pub fn system_message(&self, context: &str) -> Message {
        let mut rules = vec![
            "AI assistant will take into account any CONTEXT BLOCK that is provided in a conversation.".to_string(),
            format!(
                "If the context does not provide the answer to question, the AI assistant will say, \"{FALLBACK_ANSWER}\"."
            ),
            format!("If the context is empty, the AI assistant will say, \"{FALLBACK_ANSWER}\"."),
            "AI assistant will not apologize for previous responses, but instead will indicate new information was gained.".to_string(),
            "AI assistant will not invent anything that is not drawn directly from the context.".to_string(),
        ];
        if self.markdown {
            rules.push(MARKDOWN_RULES.to_string());
        }

        Message::system(format!(
            "{PERSONA}\n{CONTEXT_START}\n{context}\n{CONTEXT_END}\n{}",
            rules.join("\n")
        ))
    }

    /// Compose the messages for `conversation` grounded in `context`.
    ///
    /// The conversation is not modified; the last turn is copied with
    /// [`INSTRUCTION_SUFFIX`] appended before the history policy is applied.
    pub fn build(&self, context: &str, conversation: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(self.system_message(context));

        let last = conversation.len().saturating_sub(1);
        for (position, turn) in conversation.iter().enumerate() {
            let turn = if position == last {
                Message::new(turn.role, format!("{}{INSTRUCTION_SUFFIX}", turn.content))
            } else {
                turn.clone()
            };
            if self.history == HistoryPolicy::FullHistory || turn.role == Role::User {
                messages.push(turn);
            }
        }

        messages
    }
}
