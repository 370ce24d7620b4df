//! Invocation record for the punctuation/capitalization data-preparation tool.
//!
//! An [`InvocationConfig`] is built once, validated, and turned into the
//! argument list handed to the external program. Boolean fields map to
//! presence-only flags; everything else is rendered as `--name value`.

use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Name of the external data-preparation program.
pub const PREPARE_SCRIPT: &str = "prepare_wmt_data_for_punctuation_capitalization_task.py";

/// Fraction of the corpus held out for testing, within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct TestRatio(f64);

impl TestRatio {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(PrepError::InvalidConfig(format!(
                "test_ratio must be within [0, 1], got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for TestRatio {
    type Error = PrepError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TestRatio> for f64 {
    fn from(ratio: TestRatio) -> Self {
        ratio.0
    }
}

impl fmt::Display for TestRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything passed to one run of the data-preparation program.
///
/// Fields missing from a config file fall back to [`InvocationConfig::preset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationConfig {
    /// Source corpus file, may be home-relative (`~/...`)
    pub input_path: String,
    pub input_language: String,
    /// Destination for generated label files and model input
    pub output_dir: String,
    pub corpus_types: String,
    pub test_ratio: TestRatio,
    /// Intermediate cleaned-data location
    pub clean_data_dir: String,
    pub create_model_input: bool,
    pub autoregressive_labels: bool,
    pub bert_labels: bool,
    /// Punctuation characters the label set is restricted to
    pub allowed_punctuation: String,
    pub only_first_punctuation_character_after_word_in_autoregressive: bool,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self::preset()
    }
}

impl InvocationConfig {
    /// The fixed invocation used for the TED English corpus.
    pub fn preset() -> Self {
        Self {
            input_path: "~/data/iwslt/en-de/train.tags.en-de.en".to_string(),
            input_language: "en".to_string(),
            output_dir: "~/data/iwslt/en-de/punctuation_capitalization".to_string(),
            corpus_types: "TED".to_string(),
            test_ratio: TestRatio(0.1),
            clean_data_dir: "~/data/iwslt/en-de/clean".to_string(),
            create_model_input: true,
            autoregressive_labels: true,
            bert_labels: true,
            allowed_punctuation: ".,?".to_string(),
            only_first_punctuation_character_after_word_in_autoregressive: true,
        }
    }

    /// Enabled label-scheme flags, the ones placed before `--allowed_punctuation`.
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.create_model_input {
            flags.push("--create_model_input");
        }
        if self.autoregressive_labels {
            flags.push("--autoregressive_labels");
        }
        if self.bert_labels {
            flags.push("--bert_labels");
        }
        flags
    }

    /// Build the argument list for the external program.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.input_path.clone()];

        let mut option = |name: &str, value: String| {
            args.push(format!("--{}", name));
            args.push(value);
        };
        option("input_language", self.input_language.clone());
        option("output_dir", self.output_dir.clone());
        option("corpus_types", self.corpus_types.clone());
        option("test_ratio", self.test_ratio.to_string());
        option("clean_data_dir", self.clean_data_dir.clone());

        args.extend(self.flags().into_iter().map(String::from));

        args.push("--allowed_punctuation".to_string());
        args.push(self.allowed_punctuation.clone());

        if self.only_first_punctuation_character_after_word_in_autoregressive {
            args.push("--only_first_punctuation_character_after_word_in_autoregressive".to_string());
        }
        args
    }

    /// Check that every value field is usable. The filesystem is not consulted.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("input_path", &self.input_path),
            ("input_language", &self.input_language),
            ("output_dir", &self.output_dir),
            ("corpus_types", &self.corpus_types),
            ("clean_data_dir", &self.clean_data_dir),
            ("allowed_punctuation", &self.allowed_punctuation),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PrepError::InvalidConfig(format!("{} must not be empty", name)));
            }
        }
        // Re-check the ratio: a record built by hand can bypass TestRatio::new
        TestRatio::new(self.test_ratio.value())?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Replace a leading `~` in the path fields with `home`.
    pub fn expand_home(&self, home: &Path) -> Self {
        Self {
            input_path: expand_tilde(&self.input_path, home),
            output_dir: expand_tilde(&self.output_dir, home),
            clean_data_dir: expand_tilde(&self.clean_data_dir, home),
            ..self.clone()
        }
    }
}

fn expand_tilde(path: &str, home: &Path) -> String {
    if path == "~" {
        return home.to_string_lossy().into_owned();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest).to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}
