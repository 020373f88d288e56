use crate::{action::ActionId, state::State};

/// A recorded `(state, action, reward, next_state, terminal)` tuple.
///
/// Rewards are assumed to be clipped by the environment to a narrow range.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State where the action was taken.
    pub state: State,

    /// Taken action.
    pub action: ActionId,

    /// Immediate reward.
    pub reward: i8,

    /// State after the action. Unused when `terminal` is `true`.
    pub next_state: State,

    /// If the episode ended with this transition.
    pub terminal: bool,
}
