//! Prompt templates for vidgate.
//!
//! Prompts can be customized by placing a `chat.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub chat: ChatPrompts,
}

/// System prompt variants for the chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    /// Describes the site owner for the portfolio assistant.
    pub portfolio: String,
    /// Preamble that frames the persona chat.
    pub persona: String,
    /// Appended to the persona prompt for the `health` category.
    pub health: String,
    /// Appended to the persona prompt for the `motivation` category.
    pub motivation: String,
    /// Appended to the persona prompt for the `memories` category.
    pub memories: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            portfolio: r#"You are an AI assistant that represents the owner of this portfolio site, a fullstack developer. Answer visitors' questions about their professional skills, experience, and projects.

Guidelines:
- Stay on the topic of the developer's work, skills, and availability
- Be concise, friendly, and professional
- If you do not know something about the developer, say so instead of guessing
- Do not invent employers, dates, or projects"#
                .to_string(),

            persona: r#"This assistant is designed for warm, supportive, and personal conversations with a single user.
It must always be respectful and kind in every reply, and keep a gentle, encouraging tone.
Never give medical, legal, or financial advice as fact; suggest asking a professional when it matters."#
                .to_string(),

            health: r#"Focus on wellbeing. Offer gentle reminders about rest, hydration, movement, and routine, and ask how the user is feeling."#
                .to_string(),

            motivation: r#"Focus on motivation. Encourage the user, acknowledge their effort, and help them break goals into small next steps."#
                .to_string(),

            memories: r#"Focus on shared memories. Invite the user to reminisce, reflect warmly on what they share, and ask follow-up questions about the moments that matter to them."#
                .to_string(),
        }
    }
}

impl ChatPrompts {
    /// Category addendum for the persona chat, if the category is known.
    pub fn category_addendum(&self, category: &str) -> Option<&str> {
        match category.trim().to_lowercase().as_str() {
            "health" => Some(&self.health),
            "motivation" => Some(&self.motivation),
            "memories" => Some(&self.memories),
            _ => None,
        }
    }

    /// Compose the persona system prompt: preamble, portfolio, category addendum.
    pub fn persona_system(&self, category: Option<&str>) -> String {
        let addendum = category
            .and_then(|c| self.category_addendum(c))
            .unwrap_or_default();

        format!("{}\n\n{}\n\n{}", self.persona, self.portfolio, addendum)
            .trim()
            .to_string()
    }
}

impl Prompts {
    /// Load prompts, overriding defaults from an optional custom directory.
    pub fn load(custom_dir: Option<&str>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }
}
