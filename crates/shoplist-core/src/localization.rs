//! User-facing string tables.

use std::{collections::HashMap, path::Path};

use serde::Deserialize;

use crate::{errors::Error, Result};

/// String keys used by the handlers.
pub mod keys {
    pub const HELP_COMMAND_RESPONSE: &str = "HelpCommandResponseText";
    pub const NO_ITEMS_IN_LIST: &str = "NoItemsInListText";
    pub const SHOP_LIST_HEADER: &str = "ShopListHeaderText";
    pub const START_COMMAND_RESPONSE: &str = "StartCommandResponseText";
    pub const UNKNOWN_COMMAND_RESPONSE: &str = "UnknownCommandResponseText";
    pub const PARSE_FAILED: &str = "ParseFailedText";
}

const BUILTIN_TABLES: &str = include_str!("../assets/localization.json");

#[derive(Clone, Debug, Deserialize)]
pub struct Localization {
    default_language: String,
    languages: HashMap<String, HashMap<String, String>>,
}

impl Localization {
    /// Tables shipped with the binary (English and Russian).
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TABLES)
    }

    /// Load tables from `path`, or the built-in ones when no path is configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let txt = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read localization file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&txt)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let loc: Localization = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid localization tables: {e}")))?;
        if !loc.languages.contains_key(&loc.default_language) {
            return Err(Error::Config(format!(
                "default language '{}' has no string table",
                loc.default_language
            )));
        }
        Ok(loc)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Look `key` up in the table for `language` (the default language's table
    /// if there is none), falling back to the key itself.
    pub fn translate(&self, language: &str, key: &str) -> String {
        let table = self
            .languages
            .get(language)
            .or_else(|| self.languages.get(&self.default_language));

        table
            .and_then(|t| t.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
