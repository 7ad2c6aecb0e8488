use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::classify::{MatchBand, DEFAULT_MIN_WINDOW, DEFAULT_THRESHOLD};
use crate::data::model::{ChainLength, ReferenceTable};
use crate::error::{Error, Result};
use crate::ui::prompt::TokenSet;

/// Run settings, read from an optional TOML file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Relative tie band around the closest retention-time difference.
    pub threshold: f64,
    /// Absolute floor of the tie band, in retention-time units.
    pub min_window: f64,
    /// Invalid answers tolerated per prompt before the run is aborted.
    pub max_prompt_attempts: u32,
    /// Answer meaning "skip this chain" / "none of these".
    pub skip_token: String,
    pub affirmative: Vec<String>,
    pub negative: Vec<String>,
    /// Preset reference retention times keyed by chain label; chains left
    /// out are not classified. When present, the operator is not asked to
    /// type them.
    pub reference: Option<BTreeMap<String, f64>>,
}

impl Default for Config {
    fn default() -> Self {
        let tokens = TokenSet::default();
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_window: DEFAULT_MIN_WINDOW,
            max_prompt_attempts: 5,
            skip_token: "none".to_string(),
            affirmative: tokens.affirmative,
            negative: tokens.negative,
            reference: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text).map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate; errors are human-readable.
    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        let config: Config = toml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !(self.threshold >= 0.0) {
            return Err(format!("threshold must be >= 0 (got {})", self.threshold));
        }
        if !(self.min_window >= 0.0) {
            return Err(format!("min_window must be >= 0 (got {})", self.min_window));
        }
        if self.skip_token.trim().is_empty() {
            return Err("skip_token must not be empty".to_string());
        }
        self.reference_table().map(|_| ())
    }

    pub fn band(&self) -> MatchBand {
        MatchBand {
            threshold: self.threshold,
            min_window: self.min_window,
        }
    }

    pub fn tokens(&self) -> TokenSet {
        TokenSet {
            affirmative: self.affirmative.clone(),
            negative: self.negative.clone(),
        }
    }

    /// The preset `[reference]` table, with every chain it leaves out marked
    /// unused.
    pub fn reference_table(&self) -> std::result::Result<Option<ReferenceTable>, String> {
        let Some(preset) = &self.reference else {
            return Ok(None);
        };
        let mut table: ReferenceTable = ChainLength::ALL.into_iter().map(|c| (c, None)).collect();
        for (key, rt) in preset {
            let chain: ChainLength = key.parse()?;
            table.set(chain, Some(*rt));
        }
        Ok(Some(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn reference_section_builds_a_table() {
        let config = Config::from_toml(
            r#"
threshold = 0.1
skip_token = "skip"

[reference]
C18 = 500.0
C24 = 510.5
"#,
        )
        .unwrap();
        assert_eq!(config.band().threshold, 0.1);
        assert_eq!(config.skip_token, "skip");
        let table = config.reference_table().unwrap().unwrap();
        assert_eq!(table.get(ChainLength::C18), Some(500.0));
        assert_eq!(table.get(ChainLength::C24), Some(510.5));
        assert_eq!(table.active().count(), 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml("[reference]\nC25 = 1.0\n").unwrap_err().contains("C25"));
        assert!(Config::from_toml("threshold = -1.0").is_err());
        assert!(Config::from_toml("colour = \"red\"").is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("irms.toml");
        std::fs::write(&path, "max_prompt_attempts = \"many\"").unwrap();
        match Config::load(&path).unwrap_err() {
            Error::Config { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }
    }
}
