//! Keyboard input polled once per frame.
//!
//! # Invariants
//! - Windowing code feeds raw key events; the camera and mode toggle only
//!   ever poll [`Keyboard`], so they never see platform types.
//! - "Pressed" edges are cleared at the end of every frame.

pub mod action;
pub mod keyboard;

pub use action::{Action, ActionMap};
pub use keyboard::{Key, KeyState, Keyboard, UnknownKey};
