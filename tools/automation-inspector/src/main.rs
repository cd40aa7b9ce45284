use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_primitives::{Address, Bytes};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use market_automation::{
    AddressRegistry, ContractName, DiscoveryKey, DiscoverySnapshot, DiscoveryStatus, GraphTaskIndex,
    LedgerReader, NetworkConfig, RpcLedger, TaskCodec, TaskDiscoveryClient,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info";

/// Inspect scheduled withdrawals and the automation network a proxy account talks to.
///
/// Every subcommand is read-only.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the authoritative scheduled withdrawal for a (proxy, market) pair.
    Discover {
        #[arg(long, env = "PROXY_ADDRESS")]
        proxy: Address,

        #[arg(long)]
        market: Address,

        /// Chain id; selects the index endpoint and explorer.
        #[arg(long, env = "CHAIN_ID", default_value_t = 1)]
        chain_id: u64,

        /// Override the task index GraphQL endpoint.
        #[arg(long, env = "INDEX_URL")]
        index_url: Option<String>,

        /// Write the discovery snapshot as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Decode withdraw-action calldata (0x-prefixed hex).
    DecodeAction {
        #[arg(long)]
        data: Bytes,
    },

    /// Decode a time-condition payload (0x-prefixed hex).
    DecodeCondition {
        #[arg(long)]
        data: Bytes,
    },

    /// Report whether the automation core is an enabled module of the proxy.
    ModuleStatus {
        #[arg(long, env = "RPC_URL")]
        rpc_url: String,

        #[arg(long, env = "ADDRESS_STORAGE")]
        address_storage: Address,

        #[arg(long, env = "PROXY_ADDRESS")]
        proxy: Address,
    },

    /// Print every automation contract known to the registry.
    Resolve {
        #[arg(long, env = "RPC_URL")]
        rpc_url: String,

        #[arg(long, env = "ADDRESS_STORAGE")]
        address_storage: Address,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Discover {
            proxy,
            market,
            chain_id,
            index_url,
            output,
        } => discover(proxy, market, chain_id, index_url, output).await,
        Command::DecodeAction { data } => {
            let params = TaskCodec::decode_withdraw_params(&data)?;
            println!("{}", serde_json::to_string_pretty(&params)?);
            Ok(())
        }
        Command::DecodeCondition { data } => {
            let seconds = TaskCodec::decode_trigger_timestamp(&data)?;
            println!("{seconds} ({})", format_seconds(seconds.try_into().ok()));
            Ok(())
        }
        Command::ModuleStatus {
            rpc_url,
            address_storage,
            proxy,
        } => {
            let (ledger, registry) = connect(&rpc_url, address_storage)?;
            let codec = TaskCodec::new(registry, ledger);
            let registered = codec.is_module_registered(proxy).await?;
            let state = if registered { "enabled" } else { "not enabled" };
            println!("proxy {proxy}: automation module {state}");
            Ok(())
        }
        Command::Resolve {
            rpc_url,
            address_storage,
        } => {
            let (_, registry) = connect(&rpc_url, address_storage)?;
            let resolved = registry.resolve(&ContractName::ALL).await?;
            for name in ContractName::ALL {
                println!("{:<28} {}", name.key(), resolved.get(name)?);
            }
            Ok(())
        }
    }
}

async fn discover(
    proxy: Address,
    market: Address,
    chain_id: u64,
    index_url: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut network = NetworkConfig::for_chain(chain_id);
    if let Some(url) = index_url {
        network = network.with_index_endpoint(url);
    }
    debug!(endpoint = %network.index_endpoint, "using task index");

    let index = Arc::new(GraphTaskIndex::for_network(&network)?);
    let client = TaskDiscoveryClient::new(index, network.clone());
    let snapshot = client.sync(Some(DiscoveryKey { proxy, market })).await;

    match &snapshot.status {
        DiscoveryStatus::Error(reason) => return Err(anyhow!("discovery failed: {reason}")),
        DiscoveryStatus::Ready => {}
        other => return Err(anyhow!("discovery did not complete: {other:?}")),
    }

    match &snapshot.task {
        None => println!("no scheduled withdrawal for market {market}"),
        Some(task) => {
            println!("task      {}", task.wrapper.task.id);
            println!("status    {:?}", task.status());
            println!(
                "trigger   {}",
                format_seconds(task.trigger_datetime().map(OffsetDateTime::unix_timestamp))
            );
            if let Some(link) = &task.explorer_link {
                println!("executed  {link}");
            }
        }
    }

    if let Some(path) = output {
        write_json_atomic(&path, &discovery_report(&network, &snapshot)?)?;
        info!(path = %path.display(), "wrote discovery report");
    }
    Ok(())
}

fn discovery_report(network: &NetworkConfig, snapshot: &DiscoverySnapshot) -> Result<Value> {
    Ok(json!({
        "network": network.name,
        "chain_id": network.chain_id,
        "generated_at": OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        "snapshot": serde_json::to_value(snapshot).context("failed serialising snapshot")?,
    }))
}

/// `RUST_LOG` directives when they parse, `DEFAULT_LOG_FILTER` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn connect(
    rpc_url: &str,
    address_storage: Address,
) -> Result<(Arc<dyn LedgerReader>, Arc<AddressRegistry>)> {
    let ledger: Arc<dyn LedgerReader> = Arc::new(RpcLedger::new(rpc_url)?);
    let registry = Arc::new(AddressRegistry::new(ledger.clone(), address_storage));
    Ok((ledger, registry))
}

fn format_seconds(seconds: Option<i64>) -> String {
    seconds
        .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "out of range".to_string())
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let serialised =
        serde_json::to_string_pretty(value).context("failed serialising report JSON")?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, serialised.as_bytes())
        .with_context(|| format!("failed writing temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use market_automation::{
        mock::{withdrawal_record, StaticIndex},
        types::TaskStatus,
    };

    use super::*;

    #[test]
    fn test_cli_parses_discover() {
        let cli = Cli::try_parse_from([
            "automation-inspector",
            "discover",
            "--proxy",
            "0x9671dc03ec719ff66c561e2dc73411b041548b73",
            "--market",
            "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a",
            "--chain-id",
            "4",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Discover { chain_id: 4, output: None, .. }));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Some(1_615_248_000)), "2021-03-09T00:00:00Z");
        assert_eq!(format_seconds(None), "out of range");
    }

    #[test]
    fn test_tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path_for(Path::new("out/report.json")),
            PathBuf::from("out/report.json.tmp")
        );
    }

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert_eq!(DEFAULT_LOG_FILTER, "info");
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("debug".to_string())).to_string(), "debug");
    }

    #[tokio::test]
    async fn test_discovery_report_is_written_atomically() {
        let proxy = Address::repeat_byte(0x99);
        let market = Address::repeat_byte(0x0a);
        let network = NetworkConfig::for_chain(1);
        let index = Arc::new(StaticIndex::new(vec![withdrawal_record(
            3,
            proxy,
            market,
            TaskStatus::ExecutionSucceeded,
            100,
            1_615_248_000,
        )]));
        let client = TaskDiscoveryClient::new(index, network.clone());
        let snapshot = client.sync(Some(DiscoveryKey { proxy, market })).await;

        let report = discovery_report(&network, &snapshot).unwrap();
        assert_eq!(report["network"], "mainnet");
        assert_eq!(report["snapshot"]["status"], "Ready");
        assert!(report["snapshot"]["task"]["explorer_link"]
            .as_str()
            .unwrap()
            .starts_with("https://etherscan.io/tx/0x"));

        let dir = std::env::temp_dir().join(format!("automation-inspector-{}", std::process::id()));
        let path = dir.join("report.json");
        write_json_atomic(&path, &report).unwrap();
        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, report);
        assert!(!tmp_path_for(&path).exists());
        fs::remove_dir_all(dir).unwrap();
    }
}
