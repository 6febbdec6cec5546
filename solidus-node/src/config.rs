//! The node's configuration document (`spec.md` §6's enumerated fields),
//! deserialized from TOML the way `zebrad`'s own config layer does, and
//! threaded as an explicit value into every constructor rather than read
//! from a global (§9 "Global process state" redesign flag).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use solidus_chain::parameters::Network;

/// Which storage engine backs the chain/wallet stores.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbBackend {
    Sled,
    Memory,
}

impl Default for DbBackend {
    fn default() -> DbBackend {
        DbBackend::Sled
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub enable: bool,
}

impl Default for MiningConfig {
    fn default() -> MiningConfig {
        MiningConfig { enable: false }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub disable: bool,
    pub rescan: bool,
}

impl Default for WalletConfig {
    fn default() -> WalletConfig {
        WalletConfig { disable: false, rescan: false }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    pub listen_address: SocketAddr,
    pub seeds: Vec<SocketAddr>,
}

impl Default for P2pConfig {
    fn default() -> P2pConfig {
        P2pConfig {
            listen_address: "0.0.0.0:9000".parse().expect("valid default listen address"),
            seeds: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebsocketConfig {
    pub max_connections: usize,
}

impl Default for WebsocketConfig {
    fn default() -> WebsocketConfig {
        WebsocketConfig { max_connections: 64 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain_id: Network,
    pub db_backend: DbBackend,
    pub mining: MiningConfig,
    pub wallet: WalletConfig,
    pub p2p: P2pConfig,
    pub websocket: WebsocketConfig,
    #[serde(skip)]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            chain_id: Network::Solonet,
            db_backend: DbBackend::default(),
            mining: MiningConfig::default(),
            wallet: WalletConfig::default(),
            p2p: P2pConfig::default(),
            websocket: WebsocketConfig::default(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> color_eyre::Result<Config> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        Ok(config)
    }

    /// The directory node state (chain store, wallet store) is persisted
    /// under: `HOME` plus a per-network subdirectory, per `spec.md` §6's
    /// "HOME directory for data" environment note.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".solidus").join(self.chain_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pick_solonet_and_a_sled_backend() {
        let config = Config::default();
        assert_eq!(config.chain_id, Network::Solonet);
        assert_eq!(config.db_backend, DbBackend::Sled);
        assert!(!config.mining.enable);
    }

    #[test]
    fn a_minimal_toml_document_overrides_just_what_it_names() {
        let toml_text = "chain_id = \"mainnet\"\n[mining]\nenable = true\n";
        let config: Config = toml::from_str(toml_text).unwrap();
        assert_eq!(config.chain_id, Network::Mainnet);
        assert!(config.mining.enable);
        assert!(!config.wallet.disable);
    }
}
