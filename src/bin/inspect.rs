//! Read-only inspection of a node's data directory.
//!
//! # Usage
//! ```text
//! plasma-inspect [data_dir] [OPTIONS]
//! ```
//!
//! # Arguments
//! - `data_dir`: data directory to open (defaults to `PLASMA_DATA_DIR` or `~/.plasma`)
//!
//! # Options
//! - `--owner <address>`: list the unspent outputs of an address
//! - `--block <number>`: list the transactions of a block and its Merkle root
//! - `--deposit <n>`: show the `n`th deposit block
//!
//! Without options, prints the reconciled child-block height.

use plasma_store::config::NodeConfig;
use plasma_store::core::block::deposit_block;
use plasma_store::core::transaction::Transaction;
use plasma_store::storage::ledger::ChainLedger;
use plasma_store::storage::rocksdb_storage::RocksDbStore;
use plasma_store::storage::storage_trait::{Ledger, StorageError};
use plasma_store::types::address::Address;
use plasma_store::utils::log;
use std::env;
use std::path::PathBuf;
use std::process;

enum Query {
    Height,
    Owner(Address),
    Block(u64),
}

const USAGE: &str = "\
Plasma store inspector

USAGE:
    plasma-inspect [data_dir] [OPTIONS]

OPTIONS:
    --owner <address>   List unspent outputs of an address
    --block <number>    List the transactions of a block
    --deposit <n>       List the n-th deposit block
    -h, --help          Print this message
";

fn fail(message: &str) -> ! {
    eprintln!("{message}\n");
    eprint!("{USAGE}");
    process::exit(1);
}

fn main() {
    let config = match NodeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    log::set_max_level(config.log_level);

    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut query = Query::Height;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print!("{USAGE}");
                return;
            }
            "--owner" => {
                let Some(value) = args.get(i + 1) else {
                    fail("--owner requires an argument");
                };
                match value.parse() {
                    Ok(address) => query = Query::Owner(address),
                    Err(e) => fail(&format!("Invalid address {value}: {e}")),
                }
                i += 2;
            }
            "--block" => {
                let Some(value) = args.get(i + 1) else {
                    fail("--block requires an argument");
                };
                match value.parse() {
                    Ok(n) => query = Query::Block(n),
                    Err(_) => fail(&format!("Invalid block number: {value}")),
                }
                i += 2;
            }
            "--deposit" => {
                let Some(value) = args.get(i + 1) else {
                    fail("--deposit requires an argument");
                };
                match value.parse().ok().and_then(deposit_block) {
                    Some(n) => query = Query::Block(n),
                    None => fail(&format!("Invalid deposit number: {value}")),
                }
                i += 2;
            }
            other if other.starts_with("--") => fail(&format!("Unexpected argument: {other}")),
            path if data_dir.is_none() => {
                data_dir = Some(PathBuf::from(path));
                i += 1;
            }
            other => fail(&format!("Unexpected argument: {other}")),
        }
    }

    let data_dir = data_dir.unwrap_or(config.data_dir);
    if let Err(e) = run(&data_dir, query) {
        eprintln!("{}: {e}", data_dir.display());
        process::exit(1);
    }
}

fn run(data_dir: &std::path::Path, query: Query) -> Result<(), StorageError> {
    let ledger = ChainLedger::new(RocksDbStore::open_read_only(data_dir)?);

    match query {
        Query::Height => {
            println!("reconciled height: {}", ledger.reconciled_height()?);
        }
        Query::Owner(owner) => {
            let mut count = 0usize;
            for utxo in ledger.utxos_for_owner(owner) {
                let utxo = utxo?;
                println!("{} {}", utxo.reference, utxo.amount);
                count += 1;
            }
            println!("{count} unspent outputs for {owner}");
        }
        Query::Block(blk_num) => {
            let txs = ledger.block_transactions(blk_num)?;
            for tx in &txs {
                print_transaction(tx);
            }
            println!(
                "block {blk_num}: {} transactions, merkle root {}",
                txs.len(),
                ledger.block_merkle_root(blk_num)?
            );
        }
    }
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    println!("tx {}:{} {}", tx.blk_num, tx.tx_idx, tx.hash());
    for (slot, input) in tx.used_inputs() {
        println!(
            "  in{slot}  ({}, {}, {})",
            input.blk_num, input.tx_idx, input.out_idx
        );
    }
    for (slot, output) in tx.outputs().iter().enumerate() {
        if !output.is_zero() {
            println!("  out{slot} {} {}", output.new_owner, output.amount);
        }
    }
    if !tx.fee.is_zero() {
        println!("  fee  {}", tx.fee);
    }
}
