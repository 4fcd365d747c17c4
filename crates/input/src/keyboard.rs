use std::collections::HashSet;
use std::str::FromStr;

/// Keys the renderer responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    W,
    A,
    S,
    D,
    Backspace,
    Escape,
    Space,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name: {0}")]
pub struct UnknownKey(pub String);

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.to_ascii_lowercase().as_str() {
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "w" => Key::W,
            "a" => Key::A,
            "s" => Key::S,
            "d" => Key::D,
            "backspace" | "back" => Key::Backspace,
            "escape" | "esc" => Key::Escape,
            "space" => Key::Space,
            _ => return Err(UnknownKey(s.to_string())),
        };
        Ok(key)
    }
}

/// Read-only view of the keyboard for one frame.
pub trait Keyboard {
    /// Key is currently down.
    fn is_key_held(&self, key: Key) -> bool;
    /// Key went down since the previous frame boundary.
    fn was_key_pressed(&self, key: Key) -> bool;
}

/// Keyboard state fed by window events.
#[derive(Debug, Default, Clone)]
pub struct KeyState {
    held: HashSet<Key>,
    pressed: HashSet<Key>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key transition. Auto-repeat presses of a held key do not
    /// produce a new press edge.
    pub fn handle_key(&mut self, key: Key, down: bool) {
        tracing::trace!(?key, down, "key event");
        if down {
            if self.held.insert(key) {
                self.pressed.insert(key);
            }
        } else {
            self.held.remove(&key);
        }
    }

    /// Clear per-frame press edges. Call once after the frame's update.
    pub fn end_frame(&mut self) {
        self.pressed.clear();
    }

    /// Forget everything, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held.clear();
        self.pressed.clear();
    }
}

impl Keyboard for KeyState {
    fn is_key_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    fn was_key_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_lasts_one_frame() {
        let mut keys = KeyState::new();
        keys.handle_key(Key::Backspace, true);
        assert!(keys.was_key_pressed(Key::Backspace));
        assert!(keys.is_key_held(Key::Backspace));

        keys.end_frame();
        assert!(!keys.was_key_pressed(Key::Backspace));
        assert!(keys.is_key_held(Key::Backspace));
    }

    #[test]
    fn auto_repeat_is_not_a_new_press() {
        let mut keys = KeyState::new();
        keys.handle_key(Key::W, true);
        keys.end_frame();
        keys.handle_key(Key::W, true);
        assert!(!keys.was_key_pressed(Key::W));
    }

    #[test]
    fn release_clears_held() {
        let mut keys = KeyState::new();
        keys.handle_key(Key::A, true);
        keys.handle_key(Key::A, false);
        assert!(!keys.is_key_held(Key::A));
        // The press edge still counts for this frame
        assert!(keys.was_key_pressed(Key::A));
    }

    #[test]
    fn parse_key_names() {
        assert_eq!("W".parse::<Key>().unwrap(), Key::W);
        assert_eq!("esc".parse::<Key>().unwrap(), Key::Escape);
        assert_eq!("backspace".parse::<Key>().unwrap(), Key::Backspace);
        assert!("f13".parse::<Key>().is_err());
    }
}
