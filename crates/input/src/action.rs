use std::collections::BTreeMap;

use crate::keyboard::{Key, Keyboard};

/// A discrete, high-level action triggered by a key press.
///
/// Continuous camera motion is polled directly from held keys; actions are
/// the one-shot events the frame loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// Switch between forward and deferred lighting.
    ToggleRenderMode,
    /// Leave the application.
    Quit,
}

/// Key-to-action bindings.
#[derive(Debug, Clone)]
pub struct ActionMap {
    bindings: BTreeMap<Key, Action>,
}

impl Default for ActionMap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.bind(Key::Backspace, Action::ToggleRenderMode);
        map.bind(Key::Escape, Action::Quit);
        map
    }
}

impl ActionMap {
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Bind a key, replacing any previous binding for that key.
    pub fn bind(&mut self, key: Key, action: Action) {
        self.bindings.insert(key, action);
    }

    /// Actions whose key was pressed this frame, in key order.
    pub fn triggered(&self, keyboard: &impl Keyboard) -> Vec<Action> {
        self.bindings
            .iter()
            .filter(|(key, _)| keyboard.was_key_pressed(**key))
            .map(|(_, action)| *action)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyState;

    #[test]
    fn default_bindings() {
        let map = ActionMap::default();
        let mut keys = KeyState::new();
        keys.handle_key(Key::Backspace, true);
        assert_eq!(map.triggered(&keys), vec![Action::ToggleRenderMode]);
    }

    #[test]
    fn held_key_triggers_once() {
        let map = ActionMap::default();
        let mut keys = KeyState::new();
        keys.handle_key(Key::Escape, true);
        assert_eq!(map.triggered(&keys), vec![Action::Quit]);
        keys.end_frame();
        assert!(map.triggered(&keys).is_empty());
    }

    #[test]
    fn rebinding_replaces() {
        let mut map = ActionMap::empty();
        map.bind(Key::Space, Action::Quit);
        map.bind(Key::Space, Action::ToggleRenderMode);
        let mut keys = KeyState::new();
        keys.handle_key(Key::Space, true);
        assert_eq!(map.triggered(&keys), vec![Action::ToggleRenderMode]);
    }
}
