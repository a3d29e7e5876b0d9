/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

pub const CHECKED_GLYPH: &str = "✅";
pub const UNCHECKED_GLYPH: &str = "⬜";

/// Checkbox state of a keyboard button.
///
/// `Unspecified` means the button has no checkbox at all, which is different
/// from a checkbox that is present and unticked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckState {
    #[default]
    Unspecified,
    Unchecked,
    Checked,
}

impl CheckState {
    pub fn glyph(self) -> Option<&'static str> {
        match self {
            CheckState::Unspecified => None,
            CheckState::Unchecked => Some(UNCHECKED_GLYPH),
            CheckState::Checked => Some(CHECKED_GLYPH),
        }
    }

    /// Flip a checkbox; buttons without one stay as they are.
    pub fn toggled(self) -> Self {
        match self {
            CheckState::Unspecified => CheckState::Unspecified,
            CheckState::Unchecked => CheckState::Checked,
            CheckState::Checked => CheckState::Unchecked,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub id: i32,
    pub text: String,
    pub check: CheckState,
}

impl Button {
    pub fn new(id: i32, text: impl Into<String>, check: CheckState) -> Self {
        Self {
            id,
            text: text.into(),
            check,
        }
    }

    /// Label shown on the rendered keyboard: the checkbox glyph (if any), then the text.
    pub fn label(&self) -> String {
        match self.check.glyph() {
            Some(glyph) => format!("{glyph} {}", self.text),
            None => self.text.clone(),
        }
    }

    /// Rebuild a button from a rendered label and its callback id.
    pub fn from_label(id: i32, label: &str) -> Self {
        for (glyph, check) in [
            (CHECKED_GLYPH, CheckState::Checked),
            (UNCHECKED_GLYPH, CheckState::Unchecked),
        ] {
            if let Some(rest) = label.strip_prefix(glyph) {
                let text = rest.strip_prefix(' ').unwrap_or(rest);
                return Self::new(id, text, check);
            }
        }
        Self::new(id, label, CheckState::Unspecified)
    }
}

/// Outbound (or re-rendered) chat message with an optional inline keyboard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub buttons: Vec<Button>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(text: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            text: text.into(),
            buttons,
        }
    }

    /// Checklist message: one unchecked button per item, ids starting at 1.
    pub fn checklist(header: impl Into<String>, items: &[String]) -> Self {
        let buttons = items
            .iter()
            .zip(1..)
            .map(|(item, id)| Button::new(id, item.clone(), CheckState::Unchecked))
            .collect();
        Self::with_buttons(header, buttons)
    }

    pub fn button(&self, id: i32) -> Option<&Button> {
        self.buttons.iter().find(|b| b.id == id)
    }

    /// Consume the message and return it with button `id` toggled.
    ///
    /// Returns `None` if no button has that id.
    pub fn toggle(mut self, id: i32) -> Option<Self> {
        let button = self.buttons.iter_mut().find(|b| b.id == id)?;
        button.check = button.check.toggled();
        Some(self)
    }
}
