//! Conversation history → single prompt document.
//!
//! The completion endpoint takes one text blob, not a message array, so the
//! history is flattened into a fixed layout:
//!
//! ```text
//! INSTRUCTION SYSTEME:
//! <system instruction>
//!
//! HISTORIQUE:
//! Utilisateur: ...
//! Assistant: ...
//!
//! CONSIGNE: Réponds uniquement avec la prochaine réponse de l'Assistant.
//! Assistant:
//! ```
//!
//! Only the last `max_turns` user/assistant messages are kept. Older turns
//! are dropped, not summarised.

use crate::message::{Message, Role};

/// Instruction used when the history carries no system message.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "Tu es un assistant utile et clair. Réponds en français.";

/// Number of turns kept in the transcript window by default.
pub const DEFAULT_MAX_TURNS: i64 = 12;

const INSTRUCTION_HEADER: &str = "INSTRUCTION SYSTEME:";
const TRANSCRIPT_HEADER: &str = "HISTORIQUE:";
const NEXT_TURN_DIRECTIVE: &str =
    "CONSIGNE: Réponds uniquement avec la prochaine réponse de l'Assistant.";
const ASSISTANT_CUE: &str = "Assistant:";

/// Renders conversation history into a completion prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    default_instruction: String,
    max_turns: i64,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            default_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_owned(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transcript window. Zero or negative keeps no turns.
    pub fn max_turns(mut self, max_turns: i64) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Instruction used when `messages` has no system message.
    pub fn default_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.default_instruction = instruction.into();
        self
    }

    pub fn render(&self, messages: &[Message]) -> String {
        let mut instruction = self.default_instruction.as_str();
        let mut turns: Vec<&Message> = Vec::with_capacity(messages.len());

        for msg in messages {
            match msg.role {
                Role::System => instruction = &msg.content,
                Role::User | Role::Assistant => turns.push(msg),
            }
        }

        let keep = usize::try_from(self.max_turns.max(0)).unwrap_or(usize::MAX);
        let window = &turns[turns.len().saturating_sub(keep)..];

        let mut lines: Vec<String> = Vec::with_capacity(window.len() + 7);
        lines.push(INSTRUCTION_HEADER.to_owned());
        lines.push(instruction.trim().to_owned());
        lines.push(String::new());
        lines.push(TRANSCRIPT_HEADER.to_owned());
        for msg in window {
            lines.push(format!("{}: {}", role_label(msg.role), msg.content.trim()));
        }
        lines.push(String::new());
        lines.push(NEXT_TURN_DIRECTIVE.to_owned());
        lines.push(ASSISTANT_CUE.to_owned());
        lines.join("\n")
    }
}

/// Render `messages` with the default instruction and a `max_turns` window.
pub fn build_prompt(messages: &[Message], max_turns: i64) -> String {
    PromptBuilder::new().max_turns(max_turns).render(messages)
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "Utilisateur",
        Role::Assistant => "Assistant",
        Role::System => "Systeme",
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
