//! Inline keyboard <-> [`Button`] conversion.
//!
//! Telegram only hands back the rendered keyboard on a callback, so the
//! checkbox state travels in the label glyph and the id in the callback data.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardButtonKind, InlineKeyboardMarkup};

use shoplist_core::{domain::Button, errors::Error, Result};

/// One button per row, in order.
pub fn render_keyboard(buttons: &[Button]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .iter()
        .map(|b| vec![InlineKeyboardButton::callback(b.label(), b.id.to_string())])
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Rebuild buttons from a keyboard we rendered earlier.
///
/// Buttons that are not callback buttons are skipped; a callback payload that
/// is not an integer id is rejected.
pub fn parse_keyboard(markup: &InlineKeyboardMarkup) -> Result<Vec<Button>> {
    let mut out = Vec::new();
    for button in markup.inline_keyboard.iter().flatten() {
        let InlineKeyboardButtonKind::CallbackData(data) = &button.kind else {
            continue;
        };
        out.push(Button::from_label(parse_button_id(data)?, &button.text));
    }
    Ok(out)
}

pub fn parse_button_id(data: &str) -> Result<i32> {
    data.trim()
        .parse::<i32>()
        .map_err(|_| Error::InvalidUpdate(format!("callback data is not a button id: {data:?}")))
}
