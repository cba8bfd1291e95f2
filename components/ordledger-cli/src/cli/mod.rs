use crate::config::file::ConfigFile;
use crate::config::generator::generate_config;
use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use ordledger::config::Config;
use ordledger::db::ledger::check_ledger_integrity;
use ordledger::db::open_readonly_ordledger_db_conn;
use ordledger::db::queries::find_status;
use ordledger::service::Service;
use ordledger::utils::Context;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Generate a new configuration file
    #[clap(subcommand)]
    Config(ConfigCommand),
    /// Ingest chain events and serve the inscription ledger
    #[clap(subcommand)]
    Service(ServiceCommand),
    /// Inspect the local ledger
    #[clap(subcommand)]
    Db(LedgerDbCommand),
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
#[clap(bin_name = "config", aliases = &["config"])]
enum ConfigCommand {
    /// Generate new config
    #[clap(name = "new", bin_name = "new", aliases = &["generate"])]
    New(NewConfig),
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct NewConfig {
    /// Target Regtest network
    #[clap(
        long = "regtest",
        conflicts_with = "testnet",
        conflicts_with = "mainnet"
    )]
    pub regtest: bool,
    /// Target Testnet network
    #[clap(
        long = "testnet",
        conflicts_with = "regtest",
        conflicts_with = "mainnet"
    )]
    pub testnet: bool,
    /// Target Mainnet network
    #[clap(
        long = "mainnet",
        conflicts_with = "testnet",
        conflicts_with = "regtest"
    )]
    pub mainnet: bool,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum ServiceCommand {
    /// Start ordledger
    #[clap(name = "start", bin_name = "start")]
    Start(StartCommand),
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct StartCommand {
    /// Target Regtest network
    #[clap(
        long = "regtest",
        conflicts_with = "testnet",
        conflicts_with = "mainnet"
    )]
    pub regtest: bool,
    /// Target Testnet network
    #[clap(
        long = "testnet",
        conflicts_with = "regtest",
        conflicts_with = "mainnet"
    )]
    pub testnet: bool,
    /// Target Mainnet network
    #[clap(
        long = "mainnet",
        conflicts_with = "testnet",
        conflicts_with = "regtest"
    )]
    pub mainnet: bool,
    /// Load config file path
    #[clap(
        long = "config-path",
        conflicts_with = "mainnet",
        conflicts_with = "testnet",
        conflicts_with = "regtest"
    )]
    pub config_path: Option<String>,
    /// Block height the chainhook node should start posting from, on an empty ledger
    #[clap(long = "start-at-block")]
    pub start_at_block: Option<u64>,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum LedgerDbCommand {
    /// Display chain tip, numbering bounds and totals
    #[clap(name = "status", bin_name = "status")]
    Status(LedgerDbArgs),
    /// Check integrity
    #[clap(name = "check", bin_name = "check")]
    Check(LedgerDbArgs),
}

#[derive(Parser, PartialEq, Clone, Debug)]
struct LedgerDbArgs {
    /// Load config file path
    #[clap(long = "config-path")]
    pub config_path: Option<String>,
}

pub fn main() {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context {
        logger: Some(logger),
        tracer: false,
    };

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = hiro_system_kit::nestable_block_on(handle_command(opts, &ctx)) {
        try_error!(ctx, "{}", e);
        std::thread::sleep(std::time::Duration::from_millis(500));
        process::exit(1);
    }
}

async fn handle_command(opts: Opts, ctx: &Context) -> Result<(), String> {
    match opts.command {
        Command::Service(subcmd) => match subcmd {
            ServiceCommand::Start(cmd) => {
                let mut config: Config =
                    ConfigFile::default(cmd.regtest, cmd.testnet, cmd.mainnet, &cmd.config_path)?;
                if let Some(start_block) = cmd.start_at_block {
                    config.chainhook_node.start_block = Some(start_block);
                }
                try_info!(
                    ctx,
                    "Starting ordledger v{} ({}) on {}",
                    env!("CARGO_PKG_VERSION"),
                    env!("GIT_COMMIT"),
                    config.network
                );

                let (terminate_tx, terminate_rx) = crossbeam_channel::bounded(1);
                install_ctrlc_handler(terminate_tx, ctx.clone())?;

                let mut service = Service::new(config, ctx.clone());
                return service.run(terminate_rx).await;
            }
        },
        Command::Config(subcmd) => match subcmd {
            ConfigCommand::New(cmd) => {
                use std::fs::File;
                use std::io::Write;
                let config = ConfigFile::default(cmd.regtest, cmd.testnet, cmd.mainnet, &None)?;
                let config_content = generate_config(&config.network);
                let mut file_path = PathBuf::new();
                file_path.push("Ordledger.toml");
                let mut file = File::create(&file_path)
                    .map_err(|e| format!("unable to open file {}\n{}", file_path.display(), e))?;
                file.write_all(config_content.as_bytes())
                    .map_err(|e| format!("unable to write file {}\n{}", file_path.display(), e))?;
                println!("Created file Ordledger.toml");
            }
        },
        Command::Db(LedgerDbCommand::Status(cmd)) => {
            let config = ConfigFile::default(false, false, false, &cmd.config_path)?;
            let conn = open_readonly_ordledger_db_conn(&config.expected_db_path(), ctx)?;
            let (status, fingerprint) = find_status(&conn).map_err(|e| e.to_string())?;
            let status = serde_json::to_string_pretty(&status).map_err(|e| e.to_string())?;
            println!("{}", status);
            println!("Fingerprint: {}", fingerprint);
        }
        Command::Db(LedgerDbCommand::Check(cmd)) => {
            let config = ConfigFile::default(false, false, false, &cmd.config_path)?;
            let conn = open_readonly_ordledger_db_conn(&config.expected_db_path(), ctx)?;
            let violations = check_ledger_integrity(&conn).map_err(|e| e.to_string())?;
            if !violations.is_empty() {
                for violation in violations.iter() {
                    println!("{}", violation);
                }
                return Err(format!("{} integrity violations found", violations.len()));
            }
            println!("Ledger is consistent");
        }
    }
    Ok(())
}

pub fn install_ctrlc_handler(terminate_tx: Sender<()>, ctx: Context) -> Result<(), String> {
    ctrlc::set_handler(move || {
        try_warn!(ctx, "Manual interruption signal received");
        let _ = terminate_tx.try_send(());
    })
    .map_err(|e| format!("unable to set Ctrl-C handler: {}", e))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use test_case::test_case;

    use super::*;

    #[test_case(&["--regtest"] => (true, false, false); "regtest")]
    #[test_case(&["--testnet"] => (false, true, false); "testnet")]
    #[test_case(&["--mainnet", "--start-at-block", "767430"] => (false, false, true); "mainnet")]
    fn parses_network_flags(flags: &[&str]) -> (bool, bool, bool) {
        let args = ["ordledger", "service", "start"]
            .iter()
            .chain(flags.iter())
            .copied();
        match Opts::try_parse_from(args).unwrap().command {
            Command::Service(ServiceCommand::Start(cmd)) => (cmd.regtest, cmd.testnet, cmd.mainnet),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test_case(&["--mainnet", "--testnet"]; "two networks")]
    #[test_case(&["--mainnet", "--config-path", "Ordledger.toml"]; "network and config file")]
    #[test_case(&["--start-at-block", "tip"]; "non numeric start block")]
    fn rejects_conflicting_flags(flags: &[&str]) {
        let args = ["ordledger", "service", "start"]
            .iter()
            .chain(flags.iter())
            .copied();
        assert!(Opts::try_parse_from(args).is_err());
    }

    #[test]
    fn parses_db_commands() {
        let opts =
            Opts::try_parse_from(["ordledger", "db", "check", "--config-path", "Ordledger.toml"])
                .unwrap();
        assert_eq!(
            opts.command,
            Command::Db(LedgerDbCommand::Check(LedgerDbArgs {
                config_path: Some("Ordledger.toml".into())
            }))
        );
        let opts = Opts::try_parse_from(["ordledger", "config", "new", "--testnet"]).unwrap();
        assert!(matches!(
            opts.command,
            Command::Config(ConfigCommand::New(NewConfig { testnet: true, .. }))
        ));
    }
}
