//! Floating chat widget components

pub mod commands;
pub mod composer;
pub mod launcher;
pub mod manager;
pub mod transcript;

pub use commands::{SlashCommand, get_help_text, parse_slash_command};
pub use composer::{ChatComposer, ComposerResult};
pub use manager::{ChatWidget, WidgetAction};
pub use transcript::TranscriptView;
