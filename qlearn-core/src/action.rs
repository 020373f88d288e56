//! Fixed ordered set of legal actions.
use crate::error::QlearnError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Identifier of an action exposed to the environment.
pub type ActionId = i64;

/// The ordered list of legal actions.
///
/// The output of a Q-function has one entry per action, in this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet(Vec<ActionId>);

impl ActionSet {
    /// Creates an action set, which must be non-empty and free of duplicates.
    pub fn new(actions: Vec<ActionId>) -> Result<Self> {
        if actions.is_empty() {
            return Err(QlearnError::InvalidConfig("action list is empty".to_string()).into());
        }
        for (i, a) in actions.iter().enumerate() {
            if actions[..i].contains(a) {
                return Err(
                    QlearnError::InvalidConfig(format!("duplicated action {}", a)).into(),
                );
            }
        }
        Ok(Self(actions))
    }

    /// The number of actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the action at the given position.
    pub fn index_to_action(&self, index: usize) -> Result<ActionId, QlearnError> {
        self.0
            .get(index)
            .copied()
            .ok_or(QlearnError::ActionIndexOutOfRange {
                index,
                n_actions: self.0.len(),
            })
    }

    /// Returns the position of the given action.
    pub fn action_to_index(&self, action: ActionId) -> Result<usize, QlearnError> {
        self.0
            .iter()
            .position(|&a| a == action)
            .ok_or(QlearnError::UnknownAction(action))
    }

    /// Actions in order.
    pub fn as_slice(&self) -> &[ActionId] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() -> Result<()> {
        let actions = ActionSet::new(vec![3, -1, 7])?;
        assert_eq!(actions.len(), 3);
        assert_eq!(actions.index_to_action(1)?, -1);
        assert_eq!(actions.action_to_index(7)?, 2);
        assert_eq!(
            actions.action_to_index(4),
            Err(QlearnError::UnknownAction(4))
        );
        assert_eq!(
            actions.index_to_action(3),
            Err(QlearnError::ActionIndexOutOfRange {
                index: 3,
                n_actions: 3
            })
        );
        Ok(())
    }

    #[test]
    fn test_invalid_sets() {
        assert!(ActionSet::new(vec![]).is_err());
        assert!(ActionSet::new(vec![0, 1, 0]).is_err());
    }
}
