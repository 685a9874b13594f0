//! Slot descriptor record.
//!
//! Each descriptor is a 96-byte little-endian record. The first 72 bytes are
//! XORed with the record's own 20-byte key on disk; the key and the trailing
//! row checksum are stored in the clear.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00   | 8    | Filler |
//! | 0x08   | 1    | Flags (`0x08` data valid, `0x10` size valid) |
//! | 0x09   | 3    | Filler |
//! | 0x0C   | 4    | Payload offset (from end of descriptor array) |
//! | 0x10   | 4    | Payload current length |
//! | 0x14   | 4    | Payload capacity |
//! | 0x18   | 4    | Filler |
//! | 0x1C   | 4    | Payload CRC-32 (informational) |
//! | 0x20   | 4    | Filler |
//! | 0x24   | 32   | Name (NUL-terminated) |
//! | 0x44   | 4    | Validity stamp (slot count) |
//! | 0x48   | 20   | Key |
//! | 0x5C   | 4    | Row checksum (unused) |

use crate::SLOT_COUNT;
use crate::name::{NAME_FIELD_LEN, SlotName};
use cryptcache_codec::xor_in_place;
use rand::RngExt;
use serde::Serialize;
use std::fmt;

/// Descriptor record size in bytes.
pub const DESCRIPTOR_SIZE: usize = 0x60;

/// Length of the obfuscated prefix of a record.
pub const OBFUSCATED_LEN: usize = DESCRIPTOR_SIZE - 24;

/// Per-slot key length.
pub const KEY_LEN: usize = 20;

/// Slot holds a live entry.
pub const FLAG_DATA_VALID: u8 = 0x08;

/// Slot owns an allocated payload region.
pub const FLAG_SIZE_VALID: u8 = 0x10;

const KEY_OFFSET: usize = 0x48;

/// Allocation state of a slot, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    /// No payload region; available for a fresh allocation.
    Empty,
    /// Payload region allocated but holding no live entry.
    Reserved,
    /// Holds a live entry.
    Live,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Reserved => "reserved",
            Self::Live => "live",
        })
    }
}

/// One descriptor of the slot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDescriptor {
    /// Filler at 0x00.
    pub filler0: [u8; 8],
    /// Flag bits; bits other than the two validity flags are preserved.
    pub flags: u8,
    /// Filler at 0x09.
    pub filler1: [u8; 3],
    /// Payload offset relative to the end of the descriptor array.
    pub payload_offset: u32,
    /// Current payload length.
    pub payload_len: u32,
    /// Reserved payload capacity.
    pub capacity: u32,
    /// Filler at 0x18.
    pub filler2: [u8; 4],
    /// CRC-32 of the last payload written (not verified on read).
    pub payload_crc: u32,
    /// Filler at 0x20.
    pub filler3: [u8; 4],
    /// Raw name field.
    pub name: [u8; NAME_FIELD_LEN],
    /// Validity stamp; must equal [`SLOT_COUNT`].
    pub stamp: u32,
    /// Obfuscation key for this descriptor and its payload.
    pub key: [u8; KEY_LEN],
    /// Row checksum field, carried but never checked.
    pub row_crc: u32,
}

impl SlotDescriptor {
    /// Create a freshly formatted, empty descriptor with random key and fillers.
    pub fn formatted<R: RngExt>(rng: &mut R) -> Self {
        Self {
            filler0: rng.random(),
            flags: 0,
            filler1: rng.random(),
            payload_offset: 0,
            payload_len: 0,
            capacity: 0,
            filler2: rng.random(),
            payload_crc: 0,
            filler3: rng.random(),
            name: [0; NAME_FIELD_LEN],
            stamp: SLOT_COUNT as u32,
            key: rng.random(),
            row_crc: 0,
        }
    }

    /// Serialize and obfuscate the record for writing.
    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[0x00..0x08].copy_from_slice(&self.filler0);
        buf[0x08] = self.flags;
        buf[0x09..0x0C].copy_from_slice(&self.filler1);
        buf[0x0C..0x10].copy_from_slice(&self.payload_offset.to_le_bytes());
        buf[0x10..0x14].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[0x14..0x18].copy_from_slice(&self.capacity.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&self.filler2);
        buf[0x1C..0x20].copy_from_slice(&self.payload_crc.to_le_bytes());
        buf[0x20..0x24].copy_from_slice(&self.filler3);
        buf[0x24..0x44].copy_from_slice(&self.name);
        buf[0x44..0x48].copy_from_slice(&self.stamp.to_le_bytes());
        buf[KEY_OFFSET..KEY_OFFSET + KEY_LEN].copy_from_slice(&self.key);
        buf[0x5C..0x60].copy_from_slice(&self.row_crc.to_le_bytes());

        xor_in_place(&mut buf[..OBFUSCATED_LEN], &self.key);
        buf
    }

    /// De-obfuscate and parse an on-disk record.
    pub fn decode(raw: &[u8; DESCRIPTOR_SIZE]) -> Self {
        let mut buf = *raw;
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&buf[KEY_OFFSET..KEY_OFFSET + KEY_LEN]);
        xor_in_place(&mut buf[..OBFUSCATED_LEN], &key);

        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let array_at = |at: usize| -> [u8; 4] { [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]] };

        let mut filler0 = [0u8; 8];
        filler0.copy_from_slice(&buf[0x00..0x08]);
        let mut name = [0u8; NAME_FIELD_LEN];
        name.copy_from_slice(&buf[0x24..0x44]);

        Self {
            filler0,
            flags: buf[0x08],
            filler1: [buf[0x09], buf[0x0A], buf[0x0B]],
            payload_offset: u32_at(0x0C),
            payload_len: u32_at(0x10),
            capacity: u32_at(0x14),
            filler2: array_at(0x18),
            payload_crc: u32_at(0x1C),
            filler3: array_at(0x20),
            name,
            stamp: u32_at(0x44),
            key,
            row_crc: u32_at(0x5C),
        }
    }

    /// Whether the validity stamp matches this table layout.
    pub fn has_valid_stamp(&self) -> bool {
        self.stamp as usize == SLOT_COUNT
    }

    /// Allocation state from the flag bits.
    pub const fn state(&self) -> SlotState {
        if self.flags & FLAG_DATA_VALID != 0 {
            SlotState::Live
        } else if self.flags & FLAG_SIZE_VALID != 0 {
            SlotState::Reserved
        } else {
            SlotState::Empty
        }
    }

    /// Whether the slot holds a live entry.
    pub const fn is_live(&self) -> bool {
        matches!(self.state(), SlotState::Live)
    }

    /// Parsed name.
    pub fn slot_name(&self) -> SlotName {
        SlotName::from_field(&self.name)
    }

    /// Whether the slot is live under `name`.
    pub fn is_live_as(&self, name: &SlotName) -> bool {
        self.is_live() && name.matches_field(&self.name)
    }

    /// Drop the live entry but keep the payload region for reuse.
    pub fn invalidate(&mut self) {
        self.flags &= !FLAG_DATA_VALID;
    }

    /// Forget both the entry and its payload region.
    pub fn reset(&mut self) {
        self.flags &= !(FLAG_DATA_VALID | FLAG_SIZE_VALID);
    }

    /// Mark the slot live under `name`.
    pub fn set_live(&mut self, name: &SlotName) {
        self.flags |= FLAG_DATA_VALID;
        self.name = *name.field();
    }

    /// Mark the slot as owning a payload region.
    pub fn set_reserved(&mut self) {
        self.flags |= FLAG_SIZE_VALID;
    }
}
