use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub bind_addr: String,
    pub data_dir: String,
    pub currency: String,
}

pub fn load_config<T: for<'de> Deserialize<'de>>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}
