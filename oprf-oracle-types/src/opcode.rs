//! The outer connection opcode (spec §4.8/§6).

use std::fmt;

/// The first byte of every connection, selecting which protocol the
/// connection driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// `0x00` — create a new record. Bypasses proof-of-work.
    Create,
    /// `0x5a` — request a proof-of-work challenge for a wrapped request.
    ChallengeCreate,
    /// `0xa5` — submit a proof-of-work solution and dispatch the wrapped request.
    ChallengeVerify,
}

impl Opcode {
    /// `0x00`
    pub const CREATE: u8 = 0x00;
    /// `0x5a`
    pub const CHALLENGE_CREATE: u8 = 0x5a;
    /// `0xa5`
    pub const CHALLENGE_VERIFY: u8 = 0xa5;
}

impl TryFrom<u8> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            Self::CREATE => Ok(Self::Create),
            Self::CHALLENGE_CREATE => Ok(Self::ChallengeCreate),
            Self::CHALLENGE_VERIFY => Ok(Self::ChallengeVerify),
            other => Err(UnknownOpcode(other)),
        }
    }
}

/// Any byte not naming a connection-level [`Opcode`]; the driver closes
/// silently on this (spec §4.8: "Anything else: silent close").
#[derive(Debug, thiserror::Error)]
#[error("unknown connection opcode 0x{0:02x}")]
pub struct UnknownOpcode(pub u8);

/// The opcode of a *wrapped request* — the record operation a
/// challenge/verify round eventually dispatches to (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOp {
    /// `0x33` — read the host-scoped blob, authenticated.
    Read,
    /// `0x55` — undo the last committed change.
    Undo,
    /// `0x66` — fetch the OPRF response and rules, unauthenticated beyond PoW.
    Get,
    /// `0x99` — commit a pending change.
    Commit,
    /// `0xaa` — start a pending key change.
    Change,
    /// `0xff` — delete the record.
    Delete,
}

impl RecordOp {
    /// `0x33`
    pub const READ: u8 = 0x33;
    /// `0x55`
    pub const UNDO: u8 = 0x55;
    /// `0x66`
    pub const GET: u8 = 0x66;
    /// `0x99`
    pub const COMMIT: u8 = 0x99;
    /// `0xaa`
    pub const CHANGE: u8 = 0xaa;
    /// `0xff`
    pub const DELETE: u8 = 0xff;

    /// A wrapped request with this opcode carries only `id` (33 bytes
    /// total), never `alpha`. Every other opcode carries `id ‖ alpha` (65
    /// bytes total).
    pub fn is_short_form(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl TryFrom<u8> for RecordOp {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            Self::READ => Ok(Self::Read),
            Self::UNDO => Ok(Self::Undo),
            Self::GET => Ok(Self::Get),
            Self::COMMIT => Ok(Self::Commit),
            Self::CHANGE => Ok(Self::Change),
            Self::DELETE => Ok(Self::Delete),
            other => Err(UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for RecordOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "READ",
            Self::Undo => "UNDO",
            Self::Get => "GET",
            Self::Commit => "COMMIT",
            Self::Change => "CHANGE",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips() {
        assert_eq!(Opcode::try_from(0x00).unwrap(), Opcode::Create);
        assert_eq!(Opcode::try_from(0x5a).unwrap(), Opcode::ChallengeCreate);
        assert_eq!(Opcode::try_from(0xa5).unwrap(), Opcode::ChallengeVerify);
        assert!(Opcode::try_from(0x01).is_err());
    }

    #[test]
    fn record_op_round_trips() {
        assert_eq!(RecordOp::try_from(0x33).unwrap(), RecordOp::Read);
        assert_eq!(RecordOp::try_from(0xff).unwrap(), RecordOp::Delete);
        assert!(RecordOp::try_from(0x01).is_err());
    }

    #[test]
    fn only_read_is_short_form() {
        assert!(RecordOp::Read.is_short_form());
        assert!(!RecordOp::Get.is_short_form());
        assert!(!RecordOp::Delete.is_short_form());
    }
}
