//! Flag shards and their decoding.
//!
//! The flag is never stored in plaintext. It is split into two shards and
//! masked with a one byte key: `flag[i] = shard_a[i] ^ shard_b[i] ^ key`.
//! This is an obfuscation against `strings`, not encryption.

use alloc::vec::Vec;

/// Length of the flag and of each shard.
pub const FLAG_LEN: usize = 32;

/// Key applied on top of the combined shards.
pub const FLAG_KEY: u8 = 0x17;

const SHARD_A: [u8; FLAG_LEN] = [
    0x20, 0xC7, 0x6E, 0x11, 0x3F, 0xED, 0x6C, 0x51, //
    0xD2, 0x2A, 0x94, 0xDF, 0xF9, 0xAA, 0xE6, 0x1C, //
    0xE4, 0xA7, 0x2B, 0xF9, 0x31, 0x97, 0xAD, 0xFA, //
    0x08, 0x15, 0xB9, 0x0C, 0xF8, 0x90, 0xD6, 0x0C,
];

const SHARD_B: [u8; FLAG_LEN] = [
    0x47, 0xB9, 0x1A, 0x69, 0x6B, 0xAE, 0x3D, 0x3D, //
    0xA4, 0x59, 0xF5, 0xFC, 0x80, 0xDE, 0x94, 0x6F, //
    0xAC, 0xC6, 0x51, 0xB1, 0x16, 0xE2, 0xDC, 0x98, //
    0x6C, 0x61, 0x9A, 0x6F, 0x86, 0xB7, 0xAF, 0x66,
];

/// Decodes shard data into plaintext bytes.
///
/// Pairs the shards element-wise; if their lengths differ the surplus of the
/// longer one is ignored.
pub fn decode(shard_a: &[u8], shard_b: &[u8], key: u8) -> Vec<u8> {
    shard_a
        .iter()
        .zip(shard_b)
        .map(|(a, b)| a ^ b ^ key)
        .collect()
}

/// Immutable pair of flag shards together with their key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagVault {
    shard_a: [u8; FLAG_LEN],
    shard_b: [u8; FLAG_LEN],
    key: u8,
}

impl FlagVault {
    /// The vault holding the challenge flag.
    pub const fn builtin() -> Self {
        Self::new(SHARD_A, SHARD_B, FLAG_KEY)
    }

    /// Builds a vault from existing shards.
    ///
    /// No check is made that the shards decode to anything printable; use
    /// [`seal`](Self::seal) to derive shards from a known plaintext.
    pub const fn new(shard_a: [u8; FLAG_LEN], shard_b: [u8; FLAG_LEN], key: u8) -> Self {
        Self {
            shard_a,
            shard_b,
            key,
        }
    }

    /// Splits a plaintext into a fresh pair of shards.
    ///
    /// `mask` becomes shard A verbatim; shard B is chosen so the pair decodes
    /// back to `plaintext` under `key`.
    pub fn seal(plaintext: &[u8; FLAG_LEN], mask: &[u8; FLAG_LEN], key: u8) -> Self {
        let mut shard_b = [0u8; FLAG_LEN];
        for (i, slot) in shard_b.iter_mut().enumerate() {
            *slot = plaintext[i] ^ mask[i] ^ key;
        }
        Self::new(*mask, shard_b, key)
    }

    /// First shard, as stored.
    pub fn shard_a(&self) -> &[u8; FLAG_LEN] {
        &self.shard_a
    }

    pub fn shard_b(&self) -> &[u8; FLAG_LEN] {
        &self.shard_b
    }

    /// One byte key applied after combining the shards.
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Combined shards before the key is applied, as inlined by the generator.
    pub fn combined(&self) -> impl Iterator<Item = u8> + '_ {
        self.shard_a.iter().zip(&self.shard_b).map(|(a, b)| a ^ b)
    }

    /// Plaintext flag bytes.
    pub fn decode(&self) -> Vec<u8> {
        decode(&self.shard_a, &self.shard_b, self.key)
    }
}
