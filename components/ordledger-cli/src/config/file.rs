use ordledger::config::{
    BitcoinNetwork, ChainhookNodeConfig, Config, HttpApiConfig, IngestionConfig, LogConfig,
    RunMode, StorageConfig, DEFAULT_API_HOST, DEFAULT_API_PORT, DEFAULT_CHAINHOOK_NODE_RPC_URL,
    DEFAULT_EXTERNAL_HOSTNAME, DEFAULT_INGESTION_BODY_LIMIT, DEFAULT_INGESTION_HOST,
    DEFAULT_INGESTION_PORT, DEFAULT_PREDICATE_UUID, DEFAULT_WORKING_DIR,
};
use std::fs::File;
use std::io::{BufReader, Read};

#[derive(Deserialize, Debug, Clone)]
pub struct ConfigFile {
    pub storage: Option<StorageConfigFile>,
    pub run_mode: Option<String>,
    pub http_api: Option<HttpApiConfigFile>,
    pub ingestion: IngestionConfigFile,
    pub chainhook_node: Option<ChainhookNodeConfigFile>,
    pub network: NetworkConfigFile,
    pub logs: Option<LogConfigFile>,
}

impl ConfigFile {
    pub fn from_file_path(file_path: &str) -> Result<Config, String> {
        let file = File::open(file_path)
            .map_err(|e| format!("unable to read file {}\n{:?}", file_path, e))?;
        let mut file_reader = BufReader::new(file);
        let mut file_buffer = vec![];
        file_reader
            .read_to_end(&mut file_buffer)
            .map_err(|e| format!("unable to read file {}\n{:?}", file_path, e))?;

        let config_file: ConfigFile = match toml::from_slice(&file_buffer) {
            Ok(s) => s,
            Err(e) => {
                return Err(format!("Config file malformatted {}", e));
            }
        };
        ConfigFile::from_config_file(config_file)
    }

    pub fn from_config_file(config_file: ConfigFile) -> Result<Config, String> {
        let network = config_file.network.mode.parse::<BitcoinNetwork>()?;
        let run_mode = match config_file.run_mode {
            Some(ref run_mode) => run_mode.parse::<RunMode>()?,
            None => RunMode::Default,
        };
        if config_file.ingestion.auth_token.trim().is_empty() {
            return Err("ingestion.auth_token must not be empty".to_string());
        }

        let http_api = config_file.http_api.unwrap_or_default();
        let chainhook_node = config_file.chainhook_node.unwrap_or_default();
        let logs = config_file.logs.unwrap_or_default();
        let ingestion = config_file.ingestion;

        let config = Config {
            storage: StorageConfig {
                working_dir: config_file
                    .storage
                    .and_then(|s| s.working_dir)
                    .unwrap_or(DEFAULT_WORKING_DIR.into()),
            },
            run_mode,
            http_api: HttpApiConfig {
                host: http_api.host.unwrap_or(DEFAULT_API_HOST.into()),
                port: http_api.port.unwrap_or(DEFAULT_API_PORT),
                workers: http_api
                    .workers
                    .unwrap_or(1.max(num_cpus::get().saturating_sub(1))),
            },
            ingestion: IngestionConfig {
                host: ingestion.host.unwrap_or(DEFAULT_INGESTION_HOST.into()),
                port: ingestion.port.unwrap_or(DEFAULT_INGESTION_PORT),
                body_limit: ingestion.body_limit.unwrap_or(DEFAULT_INGESTION_BODY_LIMIT),
                external_hostname: ingestion
                    .external_hostname
                    .unwrap_or(DEFAULT_EXTERNAL_HOSTNAME.into()),
                auth_token: ingestion.auth_token,
            },
            chainhook_node: ChainhookNodeConfig {
                rpc_url: chainhook_node
                    .rpc_url
                    .unwrap_or(DEFAULT_CHAINHOOK_NODE_RPC_URL.into()),
                auto_predicate_registration: chainhook_node
                    .auto_predicate_registration
                    .unwrap_or(true),
                predicate_uuid: chainhook_node
                    .predicate_uuid
                    .unwrap_or(DEFAULT_PREDICATE_UUID.into()),
                start_block: chainhook_node.start_block,
            },
            network,
            logs: LogConfig {
                ordinals_internals: logs.ordinals_internals.unwrap_or(true),
                http_internals: logs.http_internals.unwrap_or(false),
            },
        };
        Ok(config)
    }

    pub fn default(
        devnet: bool,
        testnet: bool,
        mainnet: bool,
        config_path: &Option<String>,
    ) -> Result<Config, String> {
        let config = match (devnet, testnet, mainnet, config_path) {
            (true, false, false, _) => Config::devnet_default(),
            (false, true, false, _) => Config::testnet_default(),
            (false, false, true, _) => Config::mainnet_default(),
            (false, false, false, Some(config_path)) => ConfigFile::from_file_path(config_path)?,
            _ => Err("Invalid combination of arguments".to_string())?,
        };
        Ok(config)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LogConfigFile {
    pub ordinals_internals: Option<bool>,
    pub http_internals: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageConfigFile {
    pub working_dir: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct HttpApiConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IngestionConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub body_limit: Option<u64>,
    pub external_hostname: Option<String>,
    pub auth_token: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChainhookNodeConfigFile {
    pub rpc_url: Option<String>,
    pub auto_predicate_registration: Option<bool>,
    pub predicate_uuid: Option<String>,
    pub start_block: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NetworkConfigFile {
    pub mode: String,
}
