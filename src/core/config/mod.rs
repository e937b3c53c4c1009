use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One RK05 slot: drive number, image path, optional write lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskSlot {
    pub drive: usize,
    pub path: String,
    #[serde(default)]
    pub write_locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub disks: Vec<DiskSlot>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            disks: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        serde_yaml::from_str(&text).map_err(|e| format!("cannot parse {}: {e}", path.display()))
    }
}
