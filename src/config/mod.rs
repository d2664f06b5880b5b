//! Configuration module for vidgate.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChatPrompts, Prompts};
pub use settings::{
    DownloaderSettings, GeneralSettings, LlmSettings, PromptSettings, ReconcilerSettings,
    ServerSettings, Settings, StorageProvider, StorageSettings,
};
