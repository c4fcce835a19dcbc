// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The dispatch loop that drives a single connection to a coordinator:
//! decode one command, act on it against an [`Engine`], encode the reply
//! where the command calls for one (`SPEC_FULL.md` §6/§7).

use std::io::{Read, Write};
use std::sync::Arc;

use cruncher_bigint::BigInt;
use cruncher_engine::{Engine, MAX_WINDOW_BITS};
use cruncher_proto::{decode_command, encode_reply, Command, ProtoError, STATUS_BANNER};
use tracing::{debug, info, warn};

/// Smallest and largest accepted `-t` worker-pool sizes.
pub const MIN_WORKERS: u32 = 1;
pub const MAX_WORKERS: u32 = 1024;

/// Clamp a requested worker count into `[MIN_WORKERS, MAX_WORKERS]`, rather
/// than rejecting an out-of-range value outright.
pub fn clamp_workers(requested: u32) -> u32 {
    requested.clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Clamp a requested table window width into `[0, MAX_WINDOW_BITS]`.
pub fn clamp_window_bits(requested: u32) -> u32 {
    requested.min(MAX_WINDOW_BITS)
}

/// Drive `reader`/`writer` against `engine` until a clean EOF. Returns
/// `Ok(())` on EOF; any decode or I/O failure is returned for the caller to
/// turn into an exit code.
pub fn run_dispatcher<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    engine: &Arc<Engine>,
) -> Result<(), ProtoError> {
    loop {
        let Some(command) = decode_command(reader)? else {
            info!("coordinator closed the connection");
            return Ok(());
        };
        debug!(?command, "decoded command");
        match command {
            Command::Subscribe {
                sub_id,
                modulus_hex,
            } => {
                let modulus = BigInt::from_hex(&modulus_hex)?;
                engine.subscribe(sub_id, modulus);
                info!(sub_id, "subscription created");
            }
            Command::AddEntry {
                sub_id,
                stream_id,
                base_hex,
            } => {
                let base = BigInt::from_hex(&base_hex)?;
                if !engine.add_entry(sub_id, stream_id, base) {
                    warn!(sub_id, stream_id, "add_entry for an unknown subscription");
                }
            }
            Command::RemoveSubscription { sub_id } => {
                if !engine.remove_subscription(sub_id) {
                    warn!(sub_id, "remove for an unknown subscription");
                } else {
                    info!(sub_id, "subscription removed");
                }
            }
            Command::Contribute {
                stream_id,
                round,
                datum_hex,
            } => {
                let datum = BigInt::from_hex(&datum_hex)?;
                engine.submit_contribution(round, stream_id, datum);
            }
            Command::EmitResult { round } => {
                let fields = engine.emit_result(round);
                info!(round, fields = fields.len(), "round reply emitted");
                encode_reply(writer, &fields)?;
            }
            Command::Status => {
                writer.write_all(STATUS_BANNER)?;
            }
        }
    }
}
