//! Wire format of a signed report.
//!
//! A report is the ABI encoding of `(bytes32 rawReportContext, bytes32 rawObservers,
//! int192[] observations)`:
//!
//! ```text
//! [  0.. 32] report context: 11 zero bytes | 16 byte config digest | 4 byte epoch | 1 byte round
//! [ 32.. 64] observer index of each observation, zero padded
//! [ 64.. 96] offset of the observations array (always 0x60)
//! [ 96..128] number of observations
//! [128..   ] one sign-extended 32 byte word per observation
//! ```
use anchor_lang::prelude::*;
use arrayref::{array_ref, array_refs, mut_array_refs};

use std::convert::TryFrom;

use crate::state::{ConfigDigest, DIGEST_SIZE, MAX_ORACLES};
use crate::ErrorCode;

const WORD: usize = 32;
pub const CONTEXT_LEN: usize = WORD;
const HEADER_LEN: usize = 4 * WORD;
const OBSERVATIONS_OFFSET: usize = 3 * WORD;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReportContext {
    pub config_digest: ConfigDigest,
    pub epoch: u32,
    pub round: u8,
}

impl ReportContext {
    pub fn pack(&self) -> [u8; CONTEXT_LEN] {
        let mut raw = [0u8; CONTEXT_LEN];
        {
            let (_padding, config_digest, epoch, round) =
                mut_array_refs![&mut raw, 11, DIGEST_SIZE, 4, 1];
            config_digest.copy_from_slice(&self.config_digest);
            epoch.copy_from_slice(&self.epoch.to_be_bytes());
            round[0] = self.round;
        }
        raw
    }

    pub fn unpack(raw: &[u8; CONTEXT_LEN]) -> Result<Self> {
        let (padding, config_digest, epoch, round) = array_refs![raw, 11, DIGEST_SIZE, 4, 1];
        require!(padding.iter().all(|b| *b == 0), InvalidInput);
        Ok(Self {
            config_digest: *config_digest,
            epoch: u32::from_be_bytes(*epoch),
            round: round[0],
        })
    }

    /// Reports are ordered by epoch first, then by round within the epoch.
    pub fn epoch_and_round(&self) -> (u32, u8) {
        (self.epoch, self.round)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub raw_context: [u8; CONTEXT_LEN],
    pub context: ReportContext,
    raw_observers: [u8; WORD],
    pub observations: Vec<i128>,
}

impl Report {
    pub fn new(context: ReportContext, observers: &[u8], observations: Vec<i128>) -> Self {
        let mut raw_observers = [0u8; WORD];
        let len = observers.len().min(WORD);
        raw_observers[..len].copy_from_slice(&observers[..len]);
        Self {
            raw_context: context.pack(),
            context,
            raw_observers,
            observations,
        }
    }

    /// Decodes a report, rejecting anything that is not exactly the canonical layout.
    pub fn unpack(raw: &[u8]) -> Result<Self> {
        require!(raw.len() >= HEADER_LEN, InvalidInput);

        let header = array_ref![raw, 0, HEADER_LEN];
        #[allow(clippy::ptr_offset_with_cast)] // complains about arrayref internals
        let (raw_context, raw_observers, offset, len) = array_refs![header, WORD, WORD, WORD, WORD];

        let context = ReportContext::unpack(raw_context)?;

        let offset = decode_length(offset)?;
        require!(offset == OBSERVATIONS_OFFSET, InvalidInput);

        let len = decode_length(len)?;
        require!(len <= MAX_ORACLES, ObservationCountOutOfRange);
        require!(raw.len() == HEADER_LEN + len * WORD, InvalidInput);

        let observations = raw[HEADER_LEN..]
            .chunks_exact(WORD)
            .map(|word| decode_observation(array_ref![word, 0, WORD]))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw_context: *raw_context,
            context,
            raw_observers: *raw_observers,
            observations,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(HEADER_LEN + self.observations.len() * WORD);
        raw.extend_from_slice(&self.raw_context);
        raw.extend_from_slice(&self.raw_observers);
        raw.extend_from_slice(&encode_length(OBSERVATIONS_OFFSET));
        raw.extend_from_slice(&encode_length(self.observations.len()));
        for observation in &self.observations {
            raw.extend_from_slice(&encode_observation(*observation));
        }
        raw
    }

    /// Index of the oracle behind each observation, in observation order.
    pub fn observers(&self) -> &[u8] {
        &self.raw_observers[..self.observations.len().min(WORD)]
    }
}

/// Lower middle element of an ascending sequence.
pub fn median(sorted: &[i128]) -> Option<i128> {
    let index = sorted.len().checked_sub(1)? / 2;
    sorted.get(index).copied()
}

pub fn is_sorted(observations: &[i128]) -> bool {
    observations.windows(2).all(|pair| pair[0] <= pair[1])
}

fn decode_length(word: &[u8; WORD]) -> Result<usize> {
    let (high, low) = array_refs![word, 24, 8];
    require!(high.iter().all(|b| *b == 0), InvalidInput);
    let len = usize::try_from(u64::from_be_bytes(*low)).map_err(|_| ErrorCode::InvalidInput)?;
    Ok(len)
}

fn encode_length(len: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&(len as u64).to_be_bytes());
    word
}

// int192 values are sign extended to a full word; only the i128 range is accepted.
fn decode_observation(word: &[u8; WORD]) -> Result<i128> {
    let (high, low) = array_refs![word, 16, 16];
    let value = i128::from_be_bytes(*low);
    let sign = if value < 0 { 0xff } else { 0x00 };
    require!(high.iter().all(|b| *b == sign), InvalidInput);
    Ok(value)
}

fn encode_observation(value: i128) -> [u8; WORD] {
    let sign = if value < 0 { 0xff } else { 0x00 };
    let mut word = [sign; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}
