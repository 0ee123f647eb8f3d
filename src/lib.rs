//! Terminal chat widget for webhook-driven conversational backends.

pub mod app;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod events;
pub mod logging;
pub mod normalize;
pub mod session;
pub mod storage;
pub mod transport;
pub mod ui;
pub mod widget;

pub use config::Config;
pub use controller::ChatController;
pub use conversation::{Conversation, Message, MessageOrigin};
pub use normalize::{NormalizedReply, normalize_reply};
pub use session::SessionIdProvider;
pub use transport::{TransportError, WebhookClient};
pub use ui::chat::ChatWidget;
pub use widget::{Visibility, WidgetState};
