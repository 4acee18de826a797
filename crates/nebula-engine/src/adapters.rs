//! Host adapters.
//!
//! Translate window-system input into [`HostEvent`]s and pointer positions
//! into the coordinate space each engine expects.

use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};

/// A key press, reduced to what the controller inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    /// Lowercase letter of the key, when it is a letter key.
    pub letter: Option<char>,
    /// Whether Alt (Option on macOS) was held.
    pub alt: bool,
}

impl KeyPress {
    /// A letter key.
    #[must_use]
    pub fn letter(letter: char, alt: bool) -> Self {
        Self {
            letter: Some(letter.to_ascii_lowercase()),
            alt,
        }
    }

    /// Whether this is the overlay chord, Alt+B.
    #[must_use]
    pub fn is_overlay_toggle(&self) -> bool {
        self.alt && self.letter == Some('b')
    }
}

/// Host input routed to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// Pointer moved, in window pixels from the top-left corner.
    PointerMove {
        /// Horizontal position.
        x: f32,
        /// Vertical position.
        y: f32,
    },
    /// The window changed size.
    Resize {
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// A key went down.
    KeyDown(KeyPress),
}

/// Window pixels to normalized device coordinates, `y` up.
#[must_use]
pub fn to_ndc(x: f32, y: f32, width: u32, height: u32) -> (f32, f32) {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    ((x / w) * 2.0 - 1.0, -(y / h) * 2.0 + 1.0)
}

/// Letter for a physical key, if it is one of `A`..`Z`.
#[must_use]
pub fn letter_of(code: KeyCode) -> Option<char> {
    const LETTERS: [(KeyCode, char); 26] = [
        (KeyCode::KeyA, 'a'),
        (KeyCode::KeyB, 'b'),
        (KeyCode::KeyC, 'c'),
        (KeyCode::KeyD, 'd'),
        (KeyCode::KeyE, 'e'),
        (KeyCode::KeyF, 'f'),
        (KeyCode::KeyG, 'g'),
        (KeyCode::KeyH, 'h'),
        (KeyCode::KeyI, 'i'),
        (KeyCode::KeyJ, 'j'),
        (KeyCode::KeyK, 'k'),
        (KeyCode::KeyL, 'l'),
        (KeyCode::KeyM, 'm'),
        (KeyCode::KeyN, 'n'),
        (KeyCode::KeyO, 'o'),
        (KeyCode::KeyP, 'p'),
        (KeyCode::KeyQ, 'q'),
        (KeyCode::KeyR, 'r'),
        (KeyCode::KeyS, 's'),
        (KeyCode::KeyT, 't'),
        (KeyCode::KeyU, 'u'),
        (KeyCode::KeyV, 'v'),
        (KeyCode::KeyW, 'w'),
        (KeyCode::KeyX, 'x'),
        (KeyCode::KeyY, 'y'),
        (KeyCode::KeyZ, 'z'),
    ];
    LETTERS
        .iter()
        .find(|(k, _)| *k == code)
        .map(|(_, letter)| *letter)
}

/// Key press from a physical key. Releases and key repeats yield `None`.
///
/// The physical key is used so that Alt+B still reads as `b` on layouts
/// where Alt composes another character.
#[must_use]
pub fn key_press(
    key: PhysicalKey,
    state: ElementState,
    repeat: bool,
    modifiers: ModifiersState,
) -> Option<KeyPress> {
    if state != ElementState::Pressed || repeat {
        return None;
    }
    let letter = match key {
        PhysicalKey::Code(code) => letter_of(code),
        PhysicalKey::Unidentified(_) => None,
    };
    Some(KeyPress {
        letter,
        alt: modifiers.alt_key(),
    })
}

/// Translates a winit window event. Events the controller has no use for
/// yield `None`.
#[must_use]
pub fn translate_window_event(event: &WindowEvent, modifiers: ModifiersState) -> Option<HostEvent> {
    match event {
        WindowEvent::CursorMoved { position, .. } => Some(HostEvent::PointerMove {
            x: position.x as f32,
            y: position.y as f32,
        }),
        WindowEvent::Resized(size) => Some(HostEvent::Resize {
            width: size.width,
            height: size.height,
        }),
        WindowEvent::KeyboardInput { event, .. } => {
            key_press(event.physical_key, event.state, event.repeat, modifiers)
                .map(HostEvent::KeyDown)
        }
        _ => None,
    }
}
