//! `evmtx`: build, sign and send EIP-1559 transactions from the command line.
//!
//! Configuration comes from an optional TOML file plus `RPC_URL`,
//! `RPC_TIMEOUT_SECS` and `CHAIN_ID`. The signing key is read from
//! `PRIVATE_KEY` only by the commands that sign.

mod exit;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use clap::{Parser, Subcommand};
use eth_core::abi::AbiValue;
use eth_core::address::{checksum_address, parse_address};
use eth_core::identity::recover_message_signer;
use eth_core::units::{format_ether, format_units, parse_units};
use eth_core::{chains, erc20, HumanAmount, Identity};
use eth_rpc::HttpChainClient;
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tx_engine::batch::BatchRead;
use tx_engine::events::{transfer_history, watch_transfers, TransferFilter};
use tx_engine::token::native_balance;
use tx_engine::{EngineConfig, TokenReader, TxEngine, TxError, TxRequest};

const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";

#[derive(Parser)]
#[command(name = "evmtx")]
#[command(about = "Build, sign and broadcast EIP-1559 transactions", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the address of the PRIVATE_KEY identity
    Address,
    /// Native balance of an address
    NativeBalance {
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// ERC-20 balance of an owner
    Balance {
        #[arg(long, value_parser = parse_address)]
        token: Address,
        #[arg(value_parser = parse_address)]
        owner: Address,
    },
    /// ERC-20 balances of several owners in one aggregated call
    BatchBalances {
        #[arg(long, value_parser = parse_address)]
        token: Address,
        #[arg(required = true, value_parser = parse_address)]
        owners: Vec<Address>,
    },
    /// Send an ERC-20 transfer
    Transfer {
        #[arg(long, value_parser = parse_address)]
        token: Address,
        #[arg(long, value_parser = parse_address)]
        to: Address,
        /// Amount in whole tokens, e.g. "10.5"
        #[arg(long)]
        amount: HumanAmount,
        /// Token decimals; read from the contract when omitted
        #[arg(long)]
        decimals: Option<u8>,
        /// Give up if not accepted within this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Send native value and/or call data; omit --to to deploy
    Send {
        #[arg(long, value_parser = parse_address)]
        to: Option<Address>,
        /// Value in ether
        #[arg(long, default_value = "0")]
        value: HumanAmount,
        /// 0x-prefixed call data or init code
        #[arg(long)]
        data: Option<String>,
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Past ERC-20 transfers within the configured lookback window
    History {
        #[arg(long, value_parser = parse_address)]
        token: Address,
        #[arg(long, value_parser = parse_address)]
        from: Option<Address>,
        #[arg(long, value_parser = parse_address)]
        to: Option<Address>,
        /// Overrides history.lookback_blocks
        #[arg(long)]
        lookback: Option<u64>,
    },
    /// Stream new ERC-20 transfers until interrupted
    Watch {
        #[arg(long, value_parser = parse_address)]
        token: Address,
        #[arg(long, value_parser = parse_address)]
        from: Option<Address>,
        #[arg(long, value_parser = parse_address)]
        to: Option<Address>,
        /// Skip transfers below this many whole tokens
        #[arg(long)]
        min_amount: Option<HumanAmount>,
        /// Token decimals for --min-amount; read from the contract when omitted
        #[arg(long, requires = "min_amount")]
        decimals: Option<u8>,
    },
    /// Chain id reported by the node and its known network details
    Network,
    /// EIP-191 personal-message signature
    SignMessage { message: String },
    /// Check that a personal-message signature was made by an address
    VerifyMessage {
        message: String,
        signature: String,
        #[arg(value_parser = parse_address)]
        address: Address,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => exit::report(&e),
    }
}

async fn run(cli: Cli) -> Result<(), TxError> {
    // Commands that never touch the network.
    match &cli.command {
        Commands::Address => {
            println!("{}", checksum_address(&load_identity()?.address()));
            return Ok(());
        }
        Commands::SignMessage { message } => {
            let signature = load_identity()?.sign_message(message.as_bytes())?;
            println!("0x{}", hex::encode(signature));
            return Ok(());
        }
        Commands::VerifyMessage { message, signature, address } => {
            let raw = decode_hex(signature)?;
            let signer = recover_message_signer(message.as_bytes(), &raw)?;
            if signer != *address {
                return Err(TxError::InvalidInput(format!(
                    "signature was made by {}",
                    checksum_address(&signer)
                )));
            }
            println!("valid");
            return Ok(());
        }
        _ => {}
    }

    let config = EngineConfig::load(cli.config.as_deref())?;
    tracing::debug!(rpc_url = %config.rpc_url, expected_chain_id = ?config.expected_chain_id, "configuration loaded");
    let client = HttpChainClient::new(&config.rpc_url, config.request_timeout())
        .map_err(|e| TxError::Configuration(e.to_string()))?;
    let engine = TxEngine::from_config(Arc::new(client), &config)?;
    if config.expected_chain_id.is_some() {
        engine.verify_chain().await?;
    }
    let client = engine.client().as_ref();

    match cli.command {
        Commands::NativeBalance { address } => {
            let wei = native_balance(client, address).await?;
            println!("{} ({wei} wei)", format_ether(wei.into()));
        }
        Commands::Balance { token, owner } => {
            let reader = TokenReader::new(client, token);
            let (balance, decimals, symbol) =
                tokio::try_join!(reader.balance_of(owner), reader.decimals(), reader.symbol())?;
            println!("{} {symbol}", format_units(balance.into(), decimals));
        }
        Commands::BatchBalances { token, owners } => {
            let mut reads = BatchRead::new();
            reads.push(token, erc20::decimals(), &[])?;
            for owner in &owners {
                reads.push(token, erc20::balance_of(), &[AbiValue::Address(*owner)])?;
            }
            let results = reads.execute(client, engine.multicall_address()).await?;

            let decimals = first_uint(&results[0])?;
            let decimals = u8::try_from(decimals)
                .map_err(|_| TxError::Decoding(format!("decimals {decimals} out of range")))?;
            for (owner, result) in owners.iter().zip(&results[1..]) {
                let balance = first_uint(result)?;
                println!("{}  {}", checksum_address(owner), format_units(balance.into(), decimals));
            }
        }
        Commands::Transfer { token, to, amount, decimals, deadline_secs } => {
            let decimals = match decimals {
                Some(d) => d,
                None => TokenReader::new(client, token).decimals().await?,
            };
            let base = parse_units(&amount, decimals)?;
            let request = TxRequest::erc20_transfer(token, to, base.value())?;
            let hash = send(&engine, &request, deadline_secs).await?;
            print_sent(&config, hash);
        }
        Commands::Send { to, value, data, deadline_secs } => {
            let value = parse_units(&value, eth_core::units::ETHER_DECIMALS)?.value();
            let data = data.as_deref().map(decode_hex).transpose()?.unwrap_or_default();
            let request = match to {
                Some(to) => TxRequest { data, ..TxRequest::native_transfer(to, value) },
                None if data.is_empty() => {
                    return Err(TxError::InvalidInput("deployment requires --data".into()));
                }
                None => TxRequest::deploy(data, value),
            };
            let hash = send(&engine, &request, deadline_secs).await?;
            print_sent(&config, hash);
        }
        Commands::History { token, from, to, lookback } => {
            let lookback = lookback.unwrap_or(config.history.lookback_blocks);
            for event in transfer_history(client, token, from, to, lookback).await? {
                println!("{}", to_json(&event)?);
            }
        }
        Commands::Network => {
            let chain_id = engine.verify_chain().await?;
            let network = chains::require_network(chain_id)?;
            println!("{} (chain id {chain_id})", network.name);
            println!("native currency: {} ({} decimals)", network.symbol, network.decimals);
            println!("explorer: {}", network.explorer_url);
        }
        Commands::Watch { token, from, to, min_amount, decimals } => {
            let min_value = match min_amount {
                Some(amount) => {
                    let decimals = match decimals {
                        Some(d) => d,
                        None => TokenReader::new(client, token).decimals().await?,
                    };
                    parse_units(&amount, decimals)?.value()
                }
                None => U256::ZERO,
            };
            let filter = TransferFilter { from, to, min_value };
            let mut watch = watch_transfers(Arc::clone(engine.client()), token, filter, config.poll_interval());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => return watch.unsubscribe().await,
                    event = watch.next() => match event {
                        Some(event) => println!("{}", to_json(&event)?),
                        None => return watch.closed().await,
                    },
                }
            }
        }
        Commands::Address | Commands::SignMessage { .. } | Commands::VerifyMessage { .. } => {}
    }
    Ok(())
}

/// Reads `PRIVATE_KEY` into a secret and derives the identity from it.
fn load_identity() -> Result<Identity, TxError> {
    let key = std::env::var(ENV_PRIVATE_KEY)
        .map(SecretString::from)
        .map_err(|_| TxError::Configuration(format!("{ENV_PRIVATE_KEY} is not set")))?;
    Ok(Identity::from_hex(key.expose_secret())?)
}

async fn send(engine: &TxEngine<HttpChainClient>, request: &TxRequest, deadline_secs: Option<u64>) -> Result<B256, TxError> {
    let identity = load_identity()?;
    match deadline_secs {
        Some(secs) => {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
            engine.send_before(&identity, request, deadline).await
        }
        None => engine.send(&identity, request).await,
    }
}

fn print_sent(config: &EngineConfig, hash: B256) {
    println!("{hash:#x}");
    if let Some(network) = config.expected_chain_id.and_then(chains::get_network) {
        println!("{}", network.explorer_tx_url(&hash));
    }
}

fn first_uint(values: &[AbiValue]) -> Result<U256, TxError> {
    values
        .first()
        .and_then(AbiValue::as_uint)
        .ok_or_else(|| TxError::Decoding("expected a uint result".into()))
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, TxError> {
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw)).map_err(|e| TxError::InvalidInput(format!("invalid hex: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, TxError> {
    serde_json::to_string(value).map_err(|e| TxError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use eth_core::units::parse_ether;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn transfer_arguments_parse() {
        let cli = Cli::try_parse_from([
            "evmtx",
            "transfer",
            "--token",
            "0x7777777777777777777777777777777777777777",
            "--to",
            "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            "--amount",
            "10.5",
            "--decimals",
            "6",
        ])
        .unwrap();
        match cli.command {
            Commands::Transfer { amount, decimals, .. } => {
                assert_eq!(parse_units(&amount, decimals.unwrap()).unwrap().value(), U256::from(10_500_000u64));
            }
            _ => panic!("expected transfer"),
        }
    }

    #[test]
    fn watch_filters_parse() {
        let cli = Cli::try_parse_from([
            "evmtx",
            "watch",
            "--token",
            "0x7777777777777777777777777777777777777777",
            "--from",
            "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
            "--min-amount",
            "2.5",
            "--decimals",
            "6",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch { from, to, min_amount, decimals, .. } => {
                assert_eq!(from, Some(Address::repeat_byte(0xbb)));
                assert_eq!(to, None);
                let min = parse_units(&min_amount.unwrap(), decimals.unwrap()).unwrap();
                assert_eq!(min.value(), U256::from(2_500_000u64));
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn watch_decimals_need_min_amount() {
        let parsed = Cli::try_parse_from([
            "evmtx",
            "watch",
            "--token",
            "0x7777777777777777777777777777777777777777",
            "--decimals",
            "6",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn bad_address_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["evmtx", "native-balance", "0x1234"]).is_err());
    }

    #[test]
    fn hex_prefix_optional() {
        assert_eq!(decode_hex("0xa9059cbb").unwrap(), vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(decode_hex("a9059cbb").unwrap(), vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(decode_hex("0xzz").unwrap_err().kind(), tx_engine::ErrorKind::InvalidInput);
    }

    #[test]
    fn ether_value_converts_exactly() {
        assert_eq!(parse_ether("0.05").unwrap().value(), U256::from(50_000_000_000_000_000u64));
    }
}
