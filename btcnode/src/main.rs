//! Command-line interface for btcnode.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Arg, ArgAction, Command};
use tokio::signal;

use btcnode::config::parse_network;
use btcnode::{
    AnchorSpec, Anchors, BlockHeaderIndex, BtcNode, BtcNodeError, CancellationToken, Config,
    LevelFilter, LogFileConfig, LoggingConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("btcnode")
        .version(btcnode::VERSION)
        .about("Reconstructs a Bitcoin header chain from a single peer")
        .arg(
            Arg::new("peer")
                .short('p')
                .long("peer")
                .value_name("ADDRESS")
                .help("Peer address to connect to (host:port)")
                .required(true),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .help("Network the peer serves")
                .default_value("mainnet"),
        )
        .arg(
            Arg::new("anchor")
                .short('a')
                .long("anchor")
                .value_name("HEIGHT:HASH")
                .help("Known block to sync from (can be used multiple times)")
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Bound on connecting and on each request")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("30"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .help("Also write logs to DIR/run.log"),
        )
        .arg(
            Arg::new("read-blocks")
                .long("read-blocks")
                .help("Fetch the full block for every reconciled header")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("follow")
                .short('f')
                .long("follow")
                .help("Keep printing newly announced blocks until Ctrl-C")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print one JSON object per line")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO);
    let _logging_guard = btcnode::init_logging(LoggingConfig {
        level: Some(log_level),
        console: true,
        file: matches.get_one::<String>("log-dir").map(|dir| LogFileConfig {
            log_dir: PathBuf::from(dir),
            max_files: 10,
        }),
    })?;

    let network = match parse_network(matches.get_one::<String>("network").map_or("mainnet", String::as_str)) {
        Ok(network) => network,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let mut anchors = Anchors::new();
    for anchor in matches.get_many::<String>("anchor").into_iter().flatten() {
        match anchor.parse::<AnchorSpec>() {
            Ok(spec) => anchors.extend([spec]),
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        }
    }

    let timeout = matches.get_one::<u64>("timeout").copied().unwrap_or(30);
    let config = Config::new(network).with_timeout(Duration::from_secs(timeout));
    let peer = matches.get_one::<String>("peer").map(String::as_str).unwrap_or_default();
    let json = matches.get_flag("json");

    tracing::info!("Starting btcnode {}", btcnode::VERSION);
    tracing::info!("Network: {:?}", network);
    tracing::info!("Anchors: {}", anchors.len());

    let mut node = match BtcNode::connect(peer, config).await {
        Ok(node) => node,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", peer, e);
            process::exit(1);
        }
    };

    if let Err(e) = node.synchronize(&anchors).await {
        eprintln!("Header synchronization failed: {}", e);
        process::exit(1);
    }

    if let Err(e) = print_chain(&mut node, matches.get_flag("read-blocks"), json).await {
        eprintln!("Failed to read block at height {}: {}", node.current_height(), e);
        process::exit(1);
    }

    if matches.get_flag("follow") {
        let shutdown = CancellationToken::new();
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, stopping");
            }
            on_signal.cancel();
        });

        loop {
            match node.wait_for_blocks(&shutdown).await {
                Ok(blocks) => {
                    for block in blocks {
                        print_block(&block, None, json);
                    }
                }
                Err(BtcNodeError::Interrupted) => break,
                Err(e) => {
                    eprintln!("Waiting for blocks failed: {}", e);
                    process::exit(1);
                }
            }
        }
    }

    node.close().await?;
    Ok(())
}

/// Walk the index from the cursor, printing each header and optionally its block.
async fn print_chain(node: &mut BtcNode, read_blocks: bool, json: bool) -> btcnode::Result<()> {
    println!(
        "{}",
        if json {
            serde_json::json!({
                "headers": node.count(),
                "start_height": node.current_height(),
            })
            .to_string()
        } else {
            format!("{} headers starting at height {}", node.count(), node.current_height())
        }
    );

    while let Some(header) = node.header() {
        let height = node.current_height();
        if read_blocks {
            let block = node.read_block().await?;
            print_block(&block, Some(height), json);
        } else if json {
            println!(
                "{}",
                serde_json::json!({
                    "height": height,
                    "hash": header.hash(),
                    "header": header,
                })
            );
        } else {
            println!("{} {}", height, header.hash());
        }

        if !node.advance() {
            break;
        }
    }
    Ok(())
}

fn print_block(block: &btcnode::Block, height: Option<u32>, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "height": height,
                "hash": block.hash(),
                "header": block.header,
                "txs": block.txs.len(),
                "witness": block.has_witness(),
            })
        );
    } else {
        match height {
            Some(height) => println!("{} {} txs={}", height, block.hash(), block.txs.len()),
            None => println!("new {} txs={}", block.hash(), block.txs.len()),
        }
    }
}
