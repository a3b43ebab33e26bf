//! Interface language preference, stored apart from the session.

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{KeyValueStore, LANGUAGE_KEY};

/// Languages the interface is translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    /// `en`
    #[default]
    #[serde(rename = "en")]
    English,
    /// `ar`
    #[serde(rename = "ar")]
    Arabic,
    /// `ckb` (Central Kurdish)
    #[serde(rename = "ckb")]
    Kurdish,
}

impl Language {
    /// Every supported language.
    pub const ALL: [Language; 3] = [Language::English, Language::Arabic, Language::Kurdish];

    /// Code persisted under the `language` key.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Arabic => "ar",
            Language::Kurdish => "ckb",
        }
    }

    /// Whether text runs right to left.
    pub fn is_rtl(&self) -> bool {
        matches!(self, Language::Arabic | Language::Kurdish)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|language| language.code() == needle)
            .ok_or_else(|| format!("unsupported language '{value}'"))
    }
}

/// Reads and writes the language preference.
#[derive(Clone)]
pub struct Preferences {
    storage: Arc<dyn KeyValueStore>,
    fallback: Language,
}

impl Preferences {
    /// `fallback` is returned whenever nothing usable is stored.
    pub fn new(storage: Arc<dyn KeyValueStore>, fallback: Language) -> Self {
        Self { storage, fallback }
    }

    /// Stored language, or the fallback.
    pub fn language(&self) -> Language {
        match self.storage.get(LANGUAGE_KEY) {
            Ok(Some(code)) => code.parse().unwrap_or_else(|err| {
                warn!("Ignoring stored language: {err}");
                self.fallback
            }),
            Ok(None) => self.fallback,
            Err(err) => {
                warn!("Failed to read language preference: {err:#}");
                self.fallback
            }
        }
    }

    /// Persist a new language choice.
    pub fn set_language(&self, language: Language) -> Result<()> {
        self.storage.set(LANGUAGE_KEY, language.code())
    }
}
