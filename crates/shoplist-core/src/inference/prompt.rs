use std::path::Path;

use crate::{errors::Error, Result};

/// Placeholder replaced by the user's text.
pub const INPUT_TEXT_MARKER: &str = "{input_text}";

const BUILTIN_TEMPLATE: &str = include_str!("../../assets/system_prompt.txt");

/// Prompt template with exactly one kind of substitution marker.
///
/// Validated once at startup; a template without [`INPUT_TEXT_MARKER`] is a
/// configuration error, never a per-request one.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(INPUT_TEXT_MARKER) {
            return Err(Error::Config(format!(
                "prompt template does not contain the required marker '{INPUT_TEXT_MARKER}'"
            )));
        }
        Ok(Self { template })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(BUILTIN_TEMPLATE)
    }

    /// Load the template from `path`, or use the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let txt = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to load prompt template from {}: {e}",
                path.display()
            ))
        })?;
        Self::new(txt).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn render(&self, input: &str) -> String {
        self.template.replace(INPUT_TEXT_MARKER, input)
    }
}
