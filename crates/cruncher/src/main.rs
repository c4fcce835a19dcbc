// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cruncher: connects to a coordinator and evaluates fixed-base windowed
//! modular exponentiations against its subscription stream, per
//! `SPEC_FULL.md` §6/§7.

use std::net::TcpStream;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cruncher::{clamp_window_bits, clamp_workers, run_dispatcher};
use cruncher_engine::{Engine, DEFAULT_EXPONENT_BITS};
use tracing::{error, info};

/// Connect to a coordinator and crunch its homomorphic computation rounds.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Coordinator host to connect to.
    host: String,
    /// Coordinator port to connect to.
    port: u16,
    /// Worker thread count (clamped to [1, 1024]).
    #[arg(short = 't', long = "threads", default_value_t = 8)]
    threads: u32,
    /// Acceleration-table window width in bits (clamped to [0, 16]; 0 disables tables).
    #[arg(short = 'z', long = "window", default_value_t = 8)]
    window_bits: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let threads = clamp_workers(args.threads) as usize;
    let window_bits = clamp_window_bits(args.window_bits);
    let address = format!("{}:{}", args.host, args.port);

    let mut reader =
        TcpStream::connect(&address).with_context(|| format!("connecting to {address}"))?;
    let mut writer = reader
        .try_clone()
        .context("cloning the coordinator connection for writing")?;
    info!(%address, threads, window_bits, "connected to coordinator");

    let engine = Engine::start(threads, DEFAULT_EXPONENT_BITS, window_bits);
    run_dispatcher(&mut reader, &mut writer, &engine).context("dispatch loop")
}
