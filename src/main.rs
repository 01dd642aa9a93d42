use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poolwatch::analysis::AnalysisEngine;
use poolwatch::config::AnalysisConfig;
use poolwatch::core::RiskTier;
use poolwatch::ingest::{self, ParsePolicy, TransferParser};
use poolwatch::nft::{NftMovementTracker, NftToken};
use poolwatch::report::{nft_documents, render_summary, ReportWriter, TokenReport};

struct Cli {
    command: Command,
    config_path: Option<String>,
    out_dir: PathBuf,
}

enum Command {
    /// Analyze a fungible token's transfer history for pooling behavior.
    Analyze { file: PathBuf, token_address: String },
    /// Reconstruct and analyze one NFT's ownership chain.
    Nft {
        file: PathBuf,
        contract_address: String,
        token_id: String,
    },
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  poolwatch analyze <transfers.json> <token_address> [--config <path>] [--out <dir>]");
    eprintln!("  poolwatch nft <transfers.json> <contract_address> <token_id> [--config <path>] [--out <dir>]");
    std::process::exit(2);
}

fn parse_cli() -> Cli {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut config_path = None;
    let mut out_dir = PathBuf::from(".");

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => match iter.next() {
                Some(path) => config_path = Some(path),
                None => usage(),
            },
            "--out" => match iter.next() {
                Some(path) => out_dir = PathBuf::from(path),
                None => usage(),
            },
            _ => positional.push(arg),
        }
    }

    let command = match positional.first().map(String::as_str) {
        Some("analyze") if positional.len() == 3 => Command::Analyze {
            file: PathBuf::from(&positional[1]),
            token_address: positional[2].clone(),
        },
        Some("nft") if positional.len() == 4 => Command::Nft {
            file: PathBuf::from(&positional[1]),
            contract_address: positional[2].clone(),
            token_id: positional[3].clone(),
        },
        _ => usage(),
    };

    Cli {
        command,
        config_path,
        out_dir,
    }
}

fn load_config(path: Option<&str>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path)),
        None => Ok(AnalysisConfig::default()),
    }
}

async fn run_token_analysis(
    config: AnalysisConfig,
    file: &Path,
    token_address: &str,
    out_dir: &Path,
) -> Result<()> {
    let document = ingest::load_transfer_document(file)
        .with_context(|| format!("failed to load transfers from {}", file.display()))?;
    if document.transfers.is_empty() {
        warn!("No transfers found for token: {}", token_address);
    }

    let parsed = TransferParser::new(ParsePolicy::SkipAndCount).parse(&document.transfers)?;
    info!(
        "📦 Loaded {} transfers for token: {} ({} skipped)",
        parsed.transfers.len(),
        token_address,
        parsed.skipped
    );

    let total_transfers = parsed.transfers.len();
    let engine = AnalysisEngine::new(config);
    let analysis = engine.analyze(parsed.transfers).await?;

    let report = TokenReport::new(
        token_address.to_string(),
        total_transfers,
        parsed.skipped,
        analysis,
    );
    ReportWriter::new(out_dir).write_token_report(&report)?;

    println!("{}", render_summary(&report));
    let tier_line = format!(
        "Risk Score {}/100: {}",
        report.analysis.risk_score,
        report.analysis.risk_tier.description()
    );
    match report.analysis.risk_tier {
        RiskTier::High => println!("{}", tier_line.as_str().red().bold()),
        RiskTier::Medium => println!("{}", tier_line.as_str().yellow().bold()),
        RiskTier::LowMedium => println!("{}", tier_line.as_str().yellow()),
        RiskTier::Low => println!("{}", tier_line.as_str().green()),
    }
    Ok(())
}

fn run_nft_analysis(
    config: AnalysisConfig,
    file: &Path,
    contract_address: &str,
    token_id: &str,
    out_dir: &Path,
) -> Result<()> {
    let document = ingest::load_transfer_document(file)
        .with_context(|| format!("failed to load transfers from {}", file.display()))?;
    if document.transfers.is_empty() {
        bail!("No transfers found for NFT: {} #{}", contract_address, token_id);
    }

    let metadata = ingest::extract_nft_metadata(&document.transfers);
    let parsed = TransferParser::new(ParsePolicy::SkipAndCount).parse(&document.transfers)?;
    info!(
        "📦 Loaded {} transfers for NFT: {} #{} ({} skipped)",
        parsed.transfers.len(),
        contract_address,
        token_id,
        parsed.skipped
    );

    let token = NftToken {
        contract_address: contract_address.to_string(),
        token_id: token_id.to_string(),
    };
    let analysis = NftMovementTracker::new(config.nft).track(&token, &parsed.transfers);

    println!("ANALYSIS SUMMARY:");
    println!("   Total transfers: {}", analysis.behavior.total_transfers);
    println!("   Unique owners: {}", analysis.behavior.unique_owners);
    println!(
        "   Rapid transfers: {}",
        analysis.behavior.rapid_transfers.len()
    );
    println!(
        "   Cyclic trades: {} 2-node, {} 3-node",
        analysis.behavior.cyclic_trades.two_node_cycles.len(),
        analysis.behavior.cyclic_trades.three_node_cycles.len()
    );
    println!(
        "   Anomalous addresses: {}",
        analysis.behavior.anomalous_addresses.len()
    );

    let (movement, behavior) = nft_documents(&token, metadata, analysis);
    ReportWriter::new(out_dir).write_nft_documents(&movement, &behavior)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = parse_cli();
    let config = load_config(cli.config_path.as_deref())?;

    match cli.command {
        Command::Analyze {
            file,
            token_address,
        } => run_token_analysis(config, &file, &token_address, &cli.out_dir).await,
        Command::Nft {
            file,
            contract_address,
            token_id,
        } => run_nft_analysis(config, &file, &contract_address, &token_id, &cli.out_dir),
    }
}
