use anyhow::Context;
use serde::Deserialize;
use std::{
    env,
    fs::File,
    path::{Path, PathBuf},
};

use crate::constants::DEFAULT_MODEL;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Defaults {
    pub model: Option<String>,
    pub store_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Root {
    pub defaults: Option<Defaults>,
}

/// Resolved configuration, read once at the CLI boundary and handed to the
/// client constructor. The workflow core never reads ambient process state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub store_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let api_key =
            env::var("GEMINI_API_KEY").map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;
        let root = match path {
            Some(p) => Some(Self::read_yaml(Path::new(p))?),
            None => {
                for candidate in ["fixit.yaml", "fixit.yml"] {
                    let path = Path::new(candidate);
                    if path.exists() {
                        return Self::from_yaml(Some(Self::read_yaml(path)?), api_key.clone());
                    }
                }
                None
            }
        };
        Self::from_yaml(root, api_key)
    }

    fn read_yaml(path: &Path) -> anyhow::Result<Root> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(serde_yaml::from_reader(file)?)
    }

    fn from_yaml(root: Option<Root>, api_key: String) -> anyhow::Result<Self> {
        let defaults = root.unwrap_or_default().defaults.unwrap_or_default();
        let model = env::var("FIXIT_MODEL")
            .ok()
            .or(defaults.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let store_file = env::var("FIXIT_STORE")
            .ok()
            .map(PathBuf::from)
            .or(defaults.store_file);

        Ok(Self {
            api_key,
            model,
            store_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults_section() {
        let root: Root = serde_yaml::from_str(
            "defaults:\n  model: gemini-2.5-pro\n  store_file: /tmp/fixit.json\n",
        )
        .unwrap();
        let defaults = root.defaults.unwrap();
        assert_eq!(defaults.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(
            defaults.store_file,
            Some(PathBuf::from("/tmp/fixit.json"))
        );
    }

    #[test]
    fn empty_config_is_valid() {
        let root: Root = serde_yaml::from_str("{}").unwrap();
        assert!(root.defaults.is_none());
    }
}
