use serde::{Deserialize, Serialize};

/// The conversation position of a session.
///
/// A closed enumeration with an explicit transition table: from the menu a
/// customer enters exactly one flow, and every flow returns to the menu or
/// terminates with a confirmed order (which deletes the session, so a new
/// order always starts fresh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    Menu,
    QuickOrder,
    Catalog,
    Cart,
    Checkout,
    Registration,
}

impl SessionStep {
    pub const INITIAL: SessionStep = SessionStep::Menu;

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(self, next: SessionStep) -> bool {
        match self {
            SessionStep::Menu => next != SessionStep::Menu,
            _ => next == SessionStep::Menu,
        }
    }

    /// Steps from which a confirmed order (the terminal action) is legal.
    pub fn can_complete_order(self) -> bool {
        matches!(self, SessionStep::Checkout | SessionStep::QuickOrder)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStep::Menu => "menu",
            SessionStep::QuickOrder => "quick_order",
            SessionStep::Catalog => "catalog",
            SessionStep::Cart => "cart",
            SessionStep::Checkout => "checkout",
            SessionStep::Registration => "registration",
        }
    }
}
