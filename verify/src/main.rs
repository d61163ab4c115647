// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{Context, Result};
use clap::Parser;
use custody_kernel::chain::ChainFold;
use custody_kernel::checksum::ChecksumState;
use custody_kernel::types::{Block, BlockNumber};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

// Same default as the node's CUSTODY_FLOOR_BLOCK.
const DEFAULT_FLOOR: BlockNumber = 6;

#[derive(Parser, Debug)]
#[command(author, version, about = "Recompute the custody chain hash from an exported block dump", long_about = None)]
struct Args {
    /// JSON array of `{ "number", "data_hash" }` blocks
    blocks: PathBuf,

    /// First block included in the fold
    #[arg(long, default_value_t = DEFAULT_FLOOR)]
    floor: BlockNumber,

    /// Fold stops before this block. Defaults to the checksum's
    /// verified-through block, or the end of the dump.
    #[arg(long)]
    target: Option<BlockNumber>,

    /// Persisted checksum file to compare against
    #[arg(long)]
    checksum: Option<PathBuf>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct Report {
    floor: BlockNumber,
    target: BlockNumber,
    chain_hash: String,
    /// `None` when no checksum file was given.
    checksum_match: Option<bool>,
}

fn load_blocks(path: &Path) -> Result<Vec<Block>> {
    let raw = fs::read(path).context("Failed to read block dump")?;
    let mut blocks: Vec<Block> = serde_json::from_slice(&raw).context("Failed to parse block dump JSON")?;
    blocks.sort_by_key(|b| b.number);
    Ok(blocks)
}

fn load_checksum(path: &Path) -> Result<ChecksumState> {
    let raw = fs::read(path).context("Failed to read checksum file")?;
    ChecksumState::decode(&raw).map_err(|e| anyhow::anyhow!("Checksum file rejected: {}", e))
}

fn verify(blocks: &[Block], floor: BlockNumber, target: BlockNumber, checksum: Option<&ChecksumState>) -> Result<Report> {
    let mut fold = ChainFold::new(floor);
    for block in blocks.iter().filter(|b| b.number >= floor && b.number < target) {
        fold.absorb(block)
            .map_err(|e| anyhow::anyhow!("Block dump is not contiguous: {}", e))?;
    }
    if target > floor && fold.next_block() != target {
        anyhow::bail!(
            "Block dump ends at {} but the fold needs blocks up to {}",
            fold.next_block(),
            target
        );
    }

    let chain_hash = fold.finish();
    let checksum_match = checksum.map(|c| c.last_verified_block.max(floor) == target.max(floor) && c.rolling_hash == chain_hash);
    Ok(Report {
        floor,
        target,
        chain_hash,
        checksum_match,
    })
}

/// Explicit target, else the checksum's verified-through block, else one
/// past the last block in the dump.
fn default_target(explicit: Option<BlockNumber>, checksum: Option<&ChecksumState>, blocks: &[Block], floor: BlockNumber) -> BlockNumber {
    explicit
        .or_else(|| checksum.map(|c| c.last_verified_block))
        .unwrap_or_else(|| blocks.last().map(|b| b.number.saturating_add(1)).unwrap_or(floor))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let blocks = load_blocks(&args.blocks)?;
    let checksum = args.checksum.as_deref().map(load_checksum).transpose()?;

    let target = default_target(args.target, checksum.as_ref(), &blocks, args.floor);

    eprintln!("Custody Verifier v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Folding blocks {}..{} from {} entries", args.floor, target, blocks.len());

    let report = verify(&blocks, args.floor, target, checksum.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.checksum_match == Some(false) {
        std::process::exit(1);
    }
    Ok(())
}
