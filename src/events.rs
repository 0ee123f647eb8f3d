use crate::conversation::Message;

/// Discrete inputs that drive the widget state machine.
///
/// User-originated events come from the keyboard; the rest are posted back
/// by background tasks when a timer fires or a request completes.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// The one-shot greeting bubble delay elapsed
    GreetingDue,

    /// User closed the greeting bubble
    DismissGreeting,

    /// Launcher activated
    Open,

    /// Minimize control
    Minimize,

    /// Maximize control or minimized header activated
    Maximize,

    /// Close control
    Close,

    /// User submitted text from the composer
    Submit(String),

    /// User activated a quick-reply suggestion
    QuickReply(String),

    /// Normalized backend reply, or the fallback error message
    ReplyReceived(Message),

    /// Normalized transcript of a previous session
    HistoryLoaded(Vec<Message>),
}

/// Side effects requested by the state machine, executed by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadHistory,
    SendMessage(String),
}
