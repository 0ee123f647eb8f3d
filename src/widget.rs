//! Widget presentation state machine.
//!
//! `WidgetState` owns everything the view shows: visibility, the greeting
//! bubble, the transcript and the composing flag. It changes only through
//! [`WidgetState::apply`]; anything that needs the network comes back out
//! as an [`Effect`].

use std::time::{Duration, Instant};

use crate::conversation::{Conversation, Message};
use crate::events::{Effect, WidgetEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Closed,
    Open,
    Minimized,
}

impl Visibility {
    pub fn is_open(self) -> bool {
        matches!(self, Visibility::Open | Visibility::Minimized)
    }
}

/// Which visual change is currently animating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Opening,
    Minimizing,
    Maximizing,
    BubbleAppearing,
}

impl TransitionKind {
    pub fn duration(self) -> Duration {
        match self {
            TransitionKind::Opening => Duration::from_millis(200),
            TransitionKind::Minimizing | TransitionKind::Maximizing => Duration::from_millis(300),
            TransitionKind::BubbleAppearing => Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub started: Instant,
}

impl Transition {
    pub fn start(kind: TransitionKind) -> Self {
        Self {
            kind,
            started: Instant::now(),
        }
    }

    /// Eased progress in `0.0..=1.0` at `now`
    pub fn progress(&self, now: Instant) -> f64 {
        let total = self.kind.duration().as_secs_f64();
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let linear = (elapsed / total).clamp(0.0, 1.0);
        // ease-out cubic
        1.0 - (1.0 - linear).powi(3)
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.kind.duration()
    }
}

#[derive(Debug, Clone)]
pub struct WidgetState {
    visibility: Visibility,
    greeting_bubble: bool,
    conversation: Conversation,
    composing: bool,
    transition: Option<Transition>,
}

impl WidgetState {
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            visibility: Visibility::Closed,
            greeting_bubble: false,
            conversation: Conversation::with_greeting(greeting),
            composing: false,
            transition: None,
        }
    }

    /// Apply one event, returning the side effect it requires, if any.
    pub fn apply(&mut self, event: WidgetEvent) -> Option<Effect> {
        match event {
            WidgetEvent::GreetingDue => {
                if self.visibility == Visibility::Closed && !self.greeting_bubble {
                    self.greeting_bubble = true;
                    self.animate(TransitionKind::BubbleAppearing);
                }
                None
            }
            WidgetEvent::DismissGreeting => {
                self.greeting_bubble = false;
                None
            }
            WidgetEvent::Open => match self.visibility {
                Visibility::Closed => {
                    self.visibility = Visibility::Open;
                    self.greeting_bubble = false;
                    self.animate(TransitionKind::Opening);
                    Some(Effect::LoadHistory)
                }
                Visibility::Minimized => self.apply(WidgetEvent::Maximize),
                Visibility::Open => None,
            },
            WidgetEvent::Minimize => {
                if self.visibility == Visibility::Open {
                    self.visibility = Visibility::Minimized;
                    self.animate(TransitionKind::Minimizing);
                }
                None
            }
            WidgetEvent::Maximize => {
                if self.visibility == Visibility::Minimized {
                    self.visibility = Visibility::Open;
                    self.animate(TransitionKind::Maximizing);
                }
                None
            }
            WidgetEvent::Close => {
                if self.visibility.is_open() {
                    self.visibility = Visibility::Closed;
                    self.transition = None;
                }
                None
            }
            WidgetEvent::Submit(text) | WidgetEvent::QuickReply(text) => {
                if text.trim().is_empty() {
                    return None;
                }
                self.conversation.push(Message::user(text.clone()));
                self.composing = true;
                Some(Effect::SendMessage(text))
            }
            WidgetEvent::ReplyReceived(message) => {
                self.conversation.push(message);
                self.composing = false;
                None
            }
            WidgetEvent::HistoryLoaded(history) => {
                if !history.is_empty() {
                    self.conversation.replace_history(history);
                }
                None
            }
        }
    }

    fn animate(&mut self, kind: TransitionKind) {
        self.transition = Some(Transition::start(kind));
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_greeting_bubble_visible(&self) -> bool {
        self.greeting_bubble && self.visibility == Visibility::Closed
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Animation in flight at `now`, if any
    pub fn transition(&self, now: Instant) -> Option<Transition> {
        self.transition.filter(|transition| !transition.is_finished(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WidgetState {
        WidgetState::new("Hello!")
    }

    #[test]
    fn starts_closed_without_bubble() {
        let state = state();
        assert_eq!(state.visibility(), Visibility::Closed);
        assert!(!state.is_greeting_bubble_visible());
        assert_eq!(state.conversation().len(), 1);
    }

    #[test]
    fn greeting_bubble_appears_and_can_be_dismissed() {
        let mut state = state();
        assert_eq!(state.apply(WidgetEvent::GreetingDue), None);
        assert!(state.is_greeting_bubble_visible());

        state.apply(WidgetEvent::DismissGreeting);
        assert!(!state.is_greeting_bubble_visible());
    }

    #[test]
    fn opening_clears_bubble_and_loads_history() {
        let mut state = state();
        state.apply(WidgetEvent::GreetingDue);

        assert_eq!(state.apply(WidgetEvent::Open), Some(Effect::LoadHistory));
        assert_eq!(state.visibility(), Visibility::Open);
        assert!(!state.is_greeting_bubble_visible());
    }

    #[test]
    fn greeting_due_while_open_is_ignored() {
        let mut state = state();
        state.apply(WidgetEvent::Open);
        state.apply(WidgetEvent::GreetingDue);
        state.apply(WidgetEvent::Close);
        assert!(!state.is_greeting_bubble_visible());
    }

    #[test]
    fn minimize_and_maximize_do_not_reload_history() {
        let mut state = state();
        state.apply(WidgetEvent::Open);

        assert_eq!(state.apply(WidgetEvent::Minimize), None);
        assert_eq!(state.visibility(), Visibility::Minimized);

        assert_eq!(state.apply(WidgetEvent::Maximize), None);
        assert_eq!(state.visibility(), Visibility::Open);

        state.apply(WidgetEvent::Minimize);
        assert_eq!(state.apply(WidgetEvent::Open), None);
        assert_eq!(state.visibility(), Visibility::Open);
    }

    #[test]
    fn close_from_any_open_state() {
        let mut state = state();
        state.apply(WidgetEvent::Open);
        state.apply(WidgetEvent::Close);
        assert_eq!(state.visibility(), Visibility::Closed);

        state.apply(WidgetEvent::Open);
        state.apply(WidgetEvent::Minimize);
        state.apply(WidgetEvent::Close);
        assert_eq!(state.visibility(), Visibility::Closed);

        // reopening loads history again
        assert_eq!(state.apply(WidgetEvent::Open), Some(Effect::LoadHistory));
    }

    #[test]
    fn minimize_while_closed_is_ignored() {
        let mut state = state();
        state.apply(WidgetEvent::Minimize);
        assert_eq!(state.visibility(), Visibility::Closed);
        state.apply(WidgetEvent::Maximize);
        assert_eq!(state.visibility(), Visibility::Closed);
    }

    #[test]
    fn blank_submit_is_a_no_op() {
        let mut state = state();
        for blank in ["", "   ", "\n\t"] {
            assert_eq!(state.apply(WidgetEvent::Submit(blank.into())), None);
        }
        assert_eq!(state.conversation().len(), 1);
        assert!(!state.is_composing());
    }

    #[test]
    fn submit_appends_user_message_and_sets_composing() {
        let mut state = state();
        let effect = state.apply(WidgetEvent::Submit("hello".into()));

        assert_eq!(effect, Some(Effect::SendMessage("hello".into())));
        assert!(state.is_composing());
        let last = state.conversation().last().unwrap();
        assert!(last.is_user());
        assert_eq!(last.text, "hello");
    }

    #[test]
    fn quick_reply_behaves_like_submit() {
        let mut state = state();
        let effect = state.apply(WidgetEvent::QuickReply("Pricing".into()));
        assert_eq!(effect, Some(Effect::SendMessage("Pricing".into())));
        assert_eq!(state.conversation().last().unwrap().text, "Pricing");
    }

    #[test]
    fn reply_clears_composing() {
        let mut state = state();
        state.apply(WidgetEvent::Submit("hello".into()));
        state.apply(WidgetEvent::ReplyReceived(Message::assistant("hi", None)));

        assert!(!state.is_composing());
        assert_eq!(state.conversation().len(), 3);
    }

    #[test]
    fn empty_history_leaves_conversation_untouched() {
        let mut state = state();
        state.apply(WidgetEvent::Submit("typed".into()));
        state.apply(WidgetEvent::HistoryLoaded(Vec::new()));
        assert_eq!(state.conversation().len(), 2);
    }

    #[test]
    fn history_replaces_everything_but_the_greeting() {
        let mut state = state();
        state.apply(WidgetEvent::Submit("typed".into()));
        state.apply(WidgetEvent::HistoryLoaded(vec![Message::assistant("old", None)]));

        let texts: Vec<_> = state.conversation().messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["Hello!", "old"]);
    }

    #[test]
    fn transition_progress_is_eased_and_clamped() {
        let transition = Transition::start(TransitionKind::Opening);
        let start = transition.started;
        assert_eq!(transition.progress(start), 0.0);
        assert!(transition.progress(start + Duration::from_millis(100)) > 0.5);
        assert_eq!(transition.progress(start + Duration::from_secs(5)), 1.0);
        assert!(transition.is_finished(start + Duration::from_millis(200)));
    }

    #[test]
    fn opening_starts_an_animation() {
        let mut state = state();
        state.apply(WidgetEvent::Open);
        let transition = state.transition(Instant::now()).unwrap();
        assert_eq!(transition.kind, TransitionKind::Opening);
    }
}
