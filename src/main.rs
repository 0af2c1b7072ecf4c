use std::env;

use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use log::{info, LevelFilter};
use web3::types::U256;

mod abi;
mod annotate;
mod apis;
mod cache;
mod client;
mod data;
mod decode;
mod error;
mod history;
mod parsing;
mod proposal;
mod render;
mod types;

use crate::{
    client::Web3Governance,
    proposal::Aggregator,
    types::{Config, Mode, DEFAULT_EXPLORER_URL, DEFAULT_RPC_URL, REGISTRY_ADDRESS},
};

/// Shows governance proposals: the active ones by default, one in detail,
/// or the history of executed proposals.
///
/// Proposal transactions are decoded against the ABIs of the core contracts
/// and the addresses in their arguments are labelled with contract or
/// account names.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// RPC URL of the node.
    #[clap(long, default_value = DEFAULT_RPC_URL)]
    network: String,
    /// Show the full report for one proposal.
    #[clap(long = "proposalID", value_name = "ID")]
    proposal_id: Option<u64>,
    /// List every executed proposal.
    #[clap(long, conflicts_with = "proposal_id")]
    history: bool,
    /// Block explorer used for links.
    #[clap(long, default_value = DEFAULT_EXPLORER_URL)]
    explorer: String,
    /// Address of the core contract registry.
    #[clap(long, default_value = REGISTRY_ADDRESS)]
    registry: String,
    /// Fetch ABIs of unknown contracts from Sourcify.
    #[clap(long)]
    sourcify: bool,
    #[clap(flatten)]
    verbose: Verbosity,
}

/// Any failure, including one inside a concurrent lookup, ends up here
/// and exits with status 1.
#[tokio::main]
async fn main() -> Result<()> {
    // For full error backtraces with anyhow.
    if env::var_os("RUST_BACKTRACE").is_none() {
        env::set_var("RUST_BACKTRACE", "full");
    }
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(
            cli.verbose
                .log_level()
                .map(|l| l.to_level_filter())
                .unwrap_or(LevelFilter::Off),
        )
        .parse_default_env()
        .init();

    let mode = if cli.sourcify {
        Mode::UseApis
    } else {
        Mode::AvoidApis
    };
    let config = Config::new(&cli.network, &cli.explorer, &cli.registry, mode)?;
    info!("Connecting to {}", config.rpc_url);
    let client = Web3Governance::connect(&config).await?;
    let mut aggregator = Aggregator::new(Box::new(client), config)?;

    match (cli.proposal_id, cli.history) {
        (Some(id), _) => println!("{}", aggregator.report(U256::from(id)).await?),
        (None, true) => println!("{}", aggregator.list_executed().await?),
        (None, false) => println!("{}", aggregator.list_active().await?),
    }
    Ok(())
}
