use std::{fmt::Display, path::PathBuf, str::FromStr};

use rand::{thread_rng, Rng};

pub const DEFAULT_WORKING_DIR: &str = "ordledger";
pub const DEFAULT_DB_FILE_NAME: &str = "ordledger.sqlite";
pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_INGESTION_HOST: &str = "0.0.0.0";
pub const DEFAULT_INGESTION_PORT: u16 = 3099;
pub const DEFAULT_INGESTION_BODY_LIMIT: u64 = 20 * 1024 * 1024;
pub const DEFAULT_EXTERNAL_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_CHAINHOOK_NODE_RPC_URL: &str = "http://127.0.0.1:20456";
pub const DEFAULT_PREDICATE_UUID: &str = "6a1f2e7c-3b0d-4c5e-9a8f-0d2b7e4c1f93";

#[derive(Clone, Debug)]
pub struct Config {
    pub storage: StorageConfig,
    pub run_mode: RunMode,
    pub http_api: HttpApiConfig,
    pub ingestion: IngestionConfig,
    pub chainhook_node: ChainhookNodeConfig,
    pub network: BitcoinNetwork,
    pub logs: LogConfig,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub working_dir: String,
}

#[derive(Clone, Debug)]
pub struct HttpApiConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Clone, Debug)]
pub struct IngestionConfig {
    pub host: String,
    pub port: u16,
    pub body_limit: u64,
    pub external_hostname: String,
    pub auth_token: String,
}

#[derive(Clone, Debug)]
pub struct ChainhookNodeConfig {
    pub rpc_url: String,
    pub auto_predicate_registration: bool,
    pub predicate_uuid: String,
    pub start_block: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub ordinals_internals: bool,
    pub http_internals: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Default,
    ReadOnly,
    WriteOnly,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(RunMode::Default),
            "readonly" => Ok(RunMode::ReadOnly),
            "writeonly" => Ok(RunMode::WriteOnly),
            _ => Err(format!("run mode {} not supported", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitcoinNetwork {
    Mainnet,
    Testnet,
    Regtest,
    Signet,
}

impl Display for BitcoinNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let network = match self {
            BitcoinNetwork::Mainnet => "mainnet",
            BitcoinNetwork::Testnet => "testnet",
            BitcoinNetwork::Regtest => "regtest",
            BitcoinNetwork::Signet => "signet",
        };
        write!(f, "{}", network)
    }
}

impl FromStr for BitcoinNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(BitcoinNetwork::Mainnet),
            "testnet" => Ok(BitcoinNetwork::Testnet),
            "regtest" | "devnet" => Ok(BitcoinNetwork::Regtest),
            "signet" => Ok(BitcoinNetwork::Signet),
            _ => Err("network.mode not supported".to_string()),
        }
    }
}

pub fn generate_auth_token() -> String {
    let bytes: [u8; 24] = thread_rng().gen();
    hex::encode(bytes)
}

impl Config {
    pub fn expected_db_path(&self) -> PathBuf {
        let mut destination_path = PathBuf::new();
        destination_path.push(&self.storage.working_dir);
        destination_path.push(DEFAULT_DB_FILE_NAME);
        destination_path
    }

    pub fn is_ingestion_enabled(&self) -> bool {
        self.run_mode != RunMode::ReadOnly
    }

    pub fn is_read_api_enabled(&self) -> bool {
        self.run_mode != RunMode::WriteOnly
    }

    pub fn should_register_predicate(&self) -> bool {
        self.is_ingestion_enabled() && self.chainhook_node.auto_predicate_registration
    }

    /// Address the chain-event forwarder posts payloads to.
    pub fn ingestion_callback_url(&self) -> String {
        format!(
            "http://{}:{}/payload",
            self.ingestion.external_hostname, self.ingestion.port
        )
    }

    pub fn first_inscription_height(&self) -> u64 {
        match self.network {
            BitcoinNetwork::Mainnet => 767430,
            BitcoinNetwork::Regtest => 1,
            BitcoinNetwork::Testnet => 2413343,
            BitcoinNetwork::Signet => 112402,
        }
    }

    pub fn devnet_default() -> Config {
        Config::default_for_network(BitcoinNetwork::Regtest)
    }

    pub fn testnet_default() -> Config {
        Config::default_for_network(BitcoinNetwork::Testnet)
    }

    pub fn mainnet_default() -> Config {
        Config::default_for_network(BitcoinNetwork::Mainnet)
    }

    fn default_for_network(network: BitcoinNetwork) -> Config {
        Config {
            storage: StorageConfig {
                working_dir: DEFAULT_WORKING_DIR.into(),
            },
            run_mode: RunMode::Default,
            http_api: HttpApiConfig {
                host: DEFAULT_API_HOST.into(),
                port: DEFAULT_API_PORT,
                workers: 4,
            },
            ingestion: IngestionConfig {
                host: DEFAULT_INGESTION_HOST.into(),
                port: DEFAULT_INGESTION_PORT,
                body_limit: DEFAULT_INGESTION_BODY_LIMIT,
                external_hostname: DEFAULT_EXTERNAL_HOSTNAME.into(),
                auth_token: generate_auth_token(),
            },
            chainhook_node: ChainhookNodeConfig {
                rpc_url: DEFAULT_CHAINHOOK_NODE_RPC_URL.into(),
                auto_predicate_registration: network != BitcoinNetwork::Regtest,
                predicate_uuid: DEFAULT_PREDICATE_UUID.into(),
                start_block: None,
            },
            network,
            logs: LogConfig {
                ordinals_internals: true,
                http_internals: false,
            },
        }
    }
}
