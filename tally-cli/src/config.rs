use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tally_finance::{RuleClassifier, TrainConfig};
use tally_ingest::{HeaderFallback, LoadOptions};

use crate::state::ensure_tally_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestSection,
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub rules: RulesSection,
    #[serde(default)]
    pub train: TrainConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    /// What to do when no date/description/amount header is recognized
    pub header_fallback: HeaderFallback,
    /// Drop undecodable bytes instead of failing the load
    pub lossy_decode: bool,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            header_fallback: HeaderFallback::Positional,
            lossy_decode: true,
        }
    }
}

impl IngestSection {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            header_fallback: self.header_fallback,
            lossy_decode: self.lossy_decode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Model artifact used by `analyze`
    pub path: PathBuf,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/expense_category_model.json"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesSection {
    /// TOML keyword table; built-in rules when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl RulesSection {
    /// `override_path` (from the command line) wins over the configured path.
    pub fn classifier(&self, override_path: Option<&Path>) -> Result<RuleClassifier> {
        match override_path.or(self.path.as_deref()) {
            Some(p) => RuleClassifier::from_path(p),
            None => Ok(RuleClassifier::default()),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

fn resolve(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => config_path(),
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let p = resolve(path)?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<PathBuf> {
    let p = resolve(path)?;
    if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config(path: Option<&Path>) -> Result<()> {
    let p = resolve(path)?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let written = save_config(&Config::default(), Some(&p))?;
    println!("Wrote {}", written.display());
    Ok(())
}

pub fn show_config(path: Option<&Path>) -> Result<()> {
    let cfg = load_config(path)?;
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}
