use anyhow::{bail, Context, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base: String,
    pub api_version: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub model: String,
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub transport_retries: u32,
    pub weather_base: String,
    pub forecast_days: u32,
    /// Used as the plan location when no usable boundary is given.
    pub region_center: GeoPoint,
    pub out_dir: String,
    pub auto_advance_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com".into(),
            api_version: "2023-06-01".into(),
            api_key_env: "ANTHROPIC_API_KEY".into(),
            model: "claude-3-5-sonnet-latest".into(),
            fallback_models: vec![
                "claude-3-5-haiku-latest".into(),
                "claude-3-haiku-20240307".into(),
            ],
            temperature: 0.6,
            max_tokens: 1200,
            timeout_secs: 60,
            transport_retries: 2,
            weather_base: "https://api.open-meteo.com".into(),
            forecast_days: 3,
            region_center: GeoPoint { latitude: 20.5937, longitude: 78.9629 },
            out_dir: ".agroplan".into(),
            auto_advance_ms: 350,
        }
    }
}

impl Config {
    /// Reads a TOML or YAML config file, chosen by extension. Missing keys
    /// keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
        let cfg: Config = match ext.as_str() {
            "toml" => toml::from_str(&text).with_context(|| format!("invalid TOML in {}", path.display()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))?
            }
            other => bail!("unsupported config format '{}' (use .toml, .yaml or .yml)", other),
        };
        Ok(cfg)
    }

    /// API key from the configured environment variable; blank counts as missing.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn toml_overrides_only_given_keys() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("agroplan.toml");
        std::fs::write(&p, "model = \"custom-model\"\ntimeout_secs = 5\n").unwrap();
        let cfg = Config::load(&p).unwrap();
        assert_eq!(cfg.model, "custom-model");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.max_tokens, 1200);
        assert_eq!(cfg.fallback_models.len(), 2);
    }

    #[test]
    fn yaml_is_accepted() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("agroplan.yaml");
        std::fs::write(&p, "fallback_models: [a, b, c]\nregion_center:\n  latitude: 1.5\n  longitude: 2.5\n").unwrap();
        let cfg = Config::load(&p).unwrap();
        assert_eq!(cfg.fallback_models, vec!["a", "b", "c"]);
        assert_eq!(cfg.region_center.latitude, 1.5);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("agroplan.ini");
        std::fs::write(&p, "model=x").unwrap();
        assert!(Config::load(&p).is_err());
    }
}
