// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire protocol codec for the command stream described in `SPEC_FULL.md`
//! §6.1: a single ASCII type byte followed by fixed `u64` fields and
//! NUL-terminated ASCII hex strings, all integers little-endian.

pub mod wire;

use std::io::{Read, Write};

use cruncher_bigint::BigIntError;

pub use wire::MAX_FIELD_LEN;

/// Errors arising while decoding the command stream or encoding a reply.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The leading type byte did not match any known command.
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),
    /// A NUL-terminated field exceeded the bounded buffer.
    #[error("field exceeded {MAX_FIELD_LEN} bytes without a terminator")]
    FieldTooLarge,
    /// A field contained bytes that were not valid UTF-8 (and so, a
    /// fortiori, not valid hex).
    #[error("field was not valid ASCII")]
    MalformedField,
    /// A hex field did not parse as a big integer.
    #[error(transparent)]
    BigInt(#[from] BigIntError),
    /// Underlying transport error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One decoded inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `s` — register or replace a subscription.
    Subscribe { sub_id: u64, modulus_hex: String },
    /// `a` — install (or replace) an entry within a subscription.
    AddEntry {
        sub_id: u64,
        stream_id: u64,
        base_hex: String,
    },
    /// `d` — remove a subscription.
    RemoveSubscription { sub_id: u64 },
    /// `c` — contribute one datum to a round.
    Contribute {
        stream_id: u64,
        round: u64,
        datum_hex: String,
    },
    /// `r` — emit the reply for a round and discard its state.
    EmitResult { round: u64 },
    /// `i` — status banner.
    Status,
}

const BYTE_SUBSCRIBE: u8 = b's';
const BYTE_ADD_ENTRY: u8 = b'a';
const BYTE_REMOVE: u8 = b'd';
const BYTE_CONTRIBUTE: u8 = b'c';
const BYTE_EMIT_RESULT: u8 = b'r';
const BYTE_STATUS: u8 = b'i';

/// The fixed banner emitted for an `i` command.
pub const STATUS_BANNER: &[u8] = b"Status.\n";

/// Decode exactly one command from `reader`.
///
/// Returns `Ok(None)` on clean EOF before any byte of a new command has been
/// read (the caller treats this as the transport-EOF case in §7); any other
/// I/O error, or a malformed command, is returned as `Err`.
pub fn decode_command<R: Read>(reader: &mut R) -> Result<Option<Command>, ProtoError> {
    let mut type_byte = [0u8; 1];
    if reader.read(&mut type_byte)? == 0 {
        return Ok(None);
    }
    let command = match type_byte[0] {
        BYTE_SUBSCRIBE => {
            let sub_id = wire::read_u64(reader)?;
            let modulus_hex = wire::read_cstr(reader)?;
            Command::Subscribe {
                sub_id,
                modulus_hex,
            }
        }
        BYTE_ADD_ENTRY => {
            let sub_id = wire::read_u64(reader)?;
            let stream_id = wire::read_u64(reader)?;
            let base_hex = wire::read_cstr(reader)?;
            Command::AddEntry {
                sub_id,
                stream_id,
                base_hex,
            }
        }
        BYTE_REMOVE => {
            let sub_id = wire::read_u64(reader)?;
            Command::RemoveSubscription { sub_id }
        }
        BYTE_CONTRIBUTE => {
            let stream_id = wire::read_u64(reader)?;
            let round = wire::read_u64(reader)?;
            let datum_hex = wire::read_cstr(reader)?;
            Command::Contribute {
                stream_id,
                round,
                datum_hex,
            }
        }
        BYTE_EMIT_RESULT => {
            let round = wire::read_u64(reader)?;
            Command::EmitResult { round }
        }
        BYTE_STATUS => Command::Status,
        other => return Err(ProtoError::UnknownCommand(other)),
    };
    Ok(Some(command))
}

/// One `(sub_id, result_hex)` field of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyField {
    pub sub_id: u64,
    pub result_hex: String,
}

/// Encode the reply to an `r` command: the field count followed by each
/// `(sub_id, result_hex)` pair, in the order given. The caller is
/// responsible for ascending-`sub_id` ordering (§6.1).
pub fn encode_reply<W: Write>(writer: &mut W, fields: &[ReplyField]) -> std::io::Result<()> {
    wire::write_u64(writer, fields.len() as u64)?;
    for field in fields {
        wire::write_u64(writer, field.sub_id)?;
        wire::write_cstr(writer, &field.result_hex)?;
    }
    Ok(())
}
