// Thu Oct 15 2026 - Alex

use crate::layout::{AbiConfig, BitfieldPolicy, DataModel, VirtualBasePlacement};
use crate::lexer::{ConditionalPolicy, MacroTable, PreprocessError, PreprocessorOptions};
use crate::parser::Language;
use crate::template::SpecializationOrdering;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Forces the language of every unit; `None` picks it from the file
    /// extension.
    pub language: Option<Language>,
    pub include_paths: Vec<PathBuf>,
    /// `NAME` or `NAME=VALUE`, as given to `-D`.
    pub defines: Vec<String>,
    pub conditional_policy: ConditionalPolicy,
    pub strict_includes: bool,
    pub max_expansion_depth: usize,
    pub max_include_depth: usize,
    pub data_model: DataModel,
    pub bitfield_policy: Option<BitfieldPolicy>,
    pub vbase_placement: VirtualBasePlacement,
    pub specialization_ordering: SpecializationOrdering,
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: None,
            include_paths: Vec::new(),
            defines: Vec::new(),
            conditional_policy: ConditionalPolicy::default(),
            strict_includes: false,
            max_expansion_depth: 256,
            max_include_depth: 64,
            data_model: DataModel::Lp64,
            bitfield_policy: None,
            vbase_placement: VirtualBasePlacement::default(),
            specialization_ordering: SpecializationOrdering::default(),
            threads: num_cpus::get(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate().map_err(crate::Error::Config)?;
        Ok(config)
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn with_define(mut self, define: &str) -> Self {
        self.defines.push(define.to_string());
        self
    }

    pub fn with_conditional_policy(mut self, policy: ConditionalPolicy) -> Self {
        self.conditional_policy = policy;
        self
    }

    pub fn with_strict_includes(mut self, strict: bool) -> Self {
        self.strict_includes = strict;
        self
    }

    pub fn with_data_model(mut self, model: DataModel) -> Self {
        self.data_model = model;
        self
    }

    pub fn with_bitfield_policy(mut self, policy: BitfieldPolicy) -> Self {
        self.bitfield_policy = Some(policy);
        self
    }

    pub fn with_vbase_placement(mut self, placement: VirtualBasePlacement) -> Self {
        self.vbase_placement = placement;
        self
    }

    pub fn with_specialization_ordering(mut self, ordering: SpecializationOrdering) -> Self {
        self.specialization_ordering = ordering;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.threads == 0 {
            return Err("threads must be greater than 0".to_string());
        }
        if self.max_expansion_depth == 0 {
            return Err("max_expansion_depth must be greater than 0".to_string());
        }
        if self.max_include_depth == 0 {
            return Err("max_include_depth must be greater than 0".to_string());
        }
        if let Some(bad) = self.defines.iter().find(|d| d.split('=').next().unwrap_or("").trim().is_empty()) {
            return Err(format!("invalid define '{}'", bad));
        }
        Ok(())
    }

    /// ABI preset for the data model. The bitfield policy follows the
    /// preset unless set explicitly.
    pub fn abi(&self) -> AbiConfig {
        let preset = match self.data_model {
            DataModel::Lp64 => AbiConfig::lp64(),
            DataModel::Ilp32 => AbiConfig::ilp32(),
            DataModel::Llp64 => AbiConfig::llp64(),
        };
        let policy = self.bitfield_policy.unwrap_or(preset.bitfield_policy);
        preset.with_bitfield_policy(policy).with_vbase_placement(self.vbase_placement)
    }

    pub fn preprocessor_options(&self) -> PreprocessorOptions {
        PreprocessorOptions {
            conditional_policy: self.conditional_policy,
            max_expansion_depth: self.max_expansion_depth,
            max_include_depth: self.max_include_depth,
            strict_includes: self.strict_includes,
            ..PreprocessorOptions::default()
        }
    }

    pub fn seed_macros(&self) -> Result<MacroTable, PreprocessError> {
        MacroTable::from_defines(&self.defines)
    }

    pub fn language_for(&self, unit: &str) -> Language {
        self.language.unwrap_or_else(|| Language::from_path(Path::new(unit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.abi(), AbiConfig::lp64());
        assert_eq!(config.language_for("a.c"), Language::C);
        assert_eq!(config.language_for("a.cpp"), Language::Cxx);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::new().with_threads(0).validate().is_err());
        assert!(Config::new().with_define("=1").validate().is_err());
        assert!(Config::new().with_define("CONDITION=1").validate().is_ok());
    }

    #[test]
    fn test_abi_preset_and_override() {
        let config = Config::new().with_data_model(DataModel::Llp64);
        assert_eq!(config.abi().bitfield_policy, BitfieldPolicy::Msvc);
        let config = config.with_bitfield_policy(BitfieldPolicy::Packed);
        assert_eq!(config.abi().bitfield_policy, BitfieldPolicy::Packed);
        assert_eq!(config.abi().data_model, DataModel::Llp64);
    }

    #[test]
    fn test_partial_json() {
        let config: Config = serde_json::from_str(r#"{"language": "c", "defines": ["CONDITION=1"]}"#).unwrap();
        assert_eq!(config.language, Some(Language::C));
        assert_eq!(config.defines, vec!["CONDITION=1".to_string()]);
        assert_eq!(config.max_include_depth, 64);
    }
}
