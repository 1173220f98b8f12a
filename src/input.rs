use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single-line text field, edited at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextInput {
    value: String,
}

impl TextInput {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Applies an editing key. Returns whether the value changed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.value.push(c);
                true
            }
            KeyCode::Backspace => self.value.pop().is_some(),
            _ => false,
        }
    }

    /// The value as drawn; `masked` replaces every character with a bullet.
    pub fn display(&self, masked: bool) -> String {
        if masked {
            "•".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}
