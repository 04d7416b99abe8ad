//! keyboard — PS/2 set-1 scancodes to terminal input
//!
//! Decode dikerjakan `pc_keyboard`; layer ini hanya melacak Alt/Ctrl untuk
//! dua kombinasi yang ditangani kernel sendiri (Alt+F1..F3, Ctrl+L).

use crate::config::NUM_TERMINALS;
use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, KeyEvent, KeyState, Keyboard, ScancodeSet1};

/// One keystroke as the terminal sees it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Char(u8),
    Enter,
    Backspace,
    Tab,
    ClearScreen,
    SwitchTerminal(usize),
}

pub struct KeyDecoder {
    keyboard: Keyboard<layouts::Us104Key, ScancodeSet1>,
    alt:      bool,
    ctrl:     bool,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self {
            keyboard: Keyboard::new(ScancodeSet1::new(), layouts::Us104Key, HandleControl::Ignore),
            alt:      false,
            ctrl:     false,
        }
    }

    /// Masukkan satu byte dari port 0x60.
    pub fn feed(&mut self, scancode: u8) -> Option<KeyInput> {
        let event = self.keyboard.add_byte(scancode).ok().flatten()?;
        self.track_modifiers(&event);

        if event.state == KeyState::Down && self.alt {
            if let Some(terminal) = function_key(event.code) {
                return Some(KeyInput::SwitchTerminal(terminal));
            }
        }

        match self.keyboard.process_keyevent(event)? {
            DecodedKey::Unicode(c) => self.translate(c),
            DecodedKey::RawKey(_) => None,
        }
    }

    fn track_modifiers(&mut self, event: &KeyEvent) {
        let down = event.state == KeyState::Down;
        match event.code {
            KeyCode::LAlt | KeyCode::RAltGr => self.alt = down,
            KeyCode::LControl | KeyCode::RControl => self.ctrl = down,
            _ => {}
        }
    }

    fn translate(&self, c: char) -> Option<KeyInput> {
        match c {
            '\n' | '\r' => Some(KeyInput::Enter),
            '\u{8}' => Some(KeyInput::Backspace),
            '\t' => Some(KeyInput::Tab),
            'l' | 'L' if self.ctrl => Some(KeyInput::ClearScreen),
            c if c.is_ascii() && !c.is_ascii_control() => Some(KeyInput::Char(c as u8)),
            _ => None,
        }
    }
}

impl Default for KeyDecoder {
    fn default() -> Self { Self::new() }
}

fn function_key(code: KeyCode) -> Option<usize> {
    let index = match code {
        KeyCode::F1 => 0,
        KeyCode::F2 => 1,
        KeyCode::F3 => 2,
        _ => return None,
    };
    (index < NUM_TERMINALS).then_some(index)
}
