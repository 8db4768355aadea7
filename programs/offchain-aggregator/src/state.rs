use anchor_lang::prelude::*;
use anchor_lang::solana_program::keccak;
use static_assertions::const_assert;

use std::collections::BTreeMap;

use crate::billing::Billing;

// OCR is designed for a maximum of 31 oracles, and there are various assumptions made around this value.
pub const MAX_ORACLES: usize = 31;
const_assert!(MAX_ORACLES <= 31);
// signer bitmasks are stored in a u32
const_assert!(MAX_ORACLES < u32::BITS as usize);

pub const DIGEST_SIZE: usize = 16;

pub type ConfigDigest = [u8; DIGEST_SIZE];

/// 20 byte Ethereum address derived from an oracle's secp256k1 key.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AnchorSerialize, AnchorDeserialize,
)]
pub struct SigningKey {
    pub key: [u8; 20],
}

impl From<[u8; 20]> for SigningKey {
    fn from(key: [u8; 20]) -> Self {
        Self { key }
    }
}

/// One committee slot. The position inside `State::oracles` is the oracle index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Oracle {
    /// secp256k1 signing key for reports
    pub signer: SigningKey,
    /// Account allowed to submit reports
    pub transmitter: Pubkey,
    /// Observations attributed to this oracle under the current config
    pub observations_count: u16,
}

/// Payment bookkeeping, keyed by transmitter. Survives committee rotation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Payee {
    /// Account allowed to withdraw the transmitter's balance
    pub payee: Pubkey,
    /// will be zeroed out if empty
    pub proposed_payee: Pubkey,
    /// Accrued and not yet withdrawn, in token gwei
    pub owed_gjuels: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Config {
    pub owner: Pubkey,
    pub proposed_owner: Pubkey,

    pub min_answer: i128,
    pub max_answer: i128,

    pub description: String,
    pub decimals: u8,

    /// Maximum number of faulty oracles tolerated
    pub f: u8,
    pub epoch: u32,
    pub round: u8,
    pub latest_aggregator_round_id: u32,
    pub latest_transmitter: Pubkey,

    pub config_count: u64,
    pub latest_config_digest: ConfigDigest,
    pub latest_config_block_number: u32,

    pub encoded_config_version: u64,
    pub encoded_config: Vec<u8>,

    pub billing: Billing,
}

/// A committed round.
#[derive(Debug, Default, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Transmission {
    pub aggregator_round_id: u32,
    pub answer: i128,
    pub transmitter: Pubkey,
    pub observations: Vec<i128>,
    pub observers: Vec<u8>,
    pub epoch: u32,
    pub round: u8,
    pub timestamp: u64,
}

/// Persistent aggregator storage. Created once, mutated only by aggregator operations.
#[derive(Debug, Default, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct State {
    pub config: Config,
    pub oracles: Vec<Oracle>,
    pub payees: BTreeMap<Pubkey, Payee>,
    /// `transmissions[i]` holds aggregator round `i + 1`
    pub transmissions: Vec<Transmission>,
}

impl State {
    pub fn signer_index(&self, signer: &[u8]) -> Option<usize> {
        self.oracles
            .iter()
            .position(|oracle| oracle.signer.key[..] == *signer)
    }

    pub fn transmitter_index(&self, transmitter: &Pubkey) -> Option<usize> {
        self.oracles
            .iter()
            .position(|oracle| &oracle.transmitter == transmitter)
    }

    pub fn latest_transmission(&self) -> Option<&Transmission> {
        self.transmissions.last()
    }

    pub fn transmission(&self, aggregator_round_id: u32) -> Option<&Transmission> {
        let index = aggregator_round_id.checked_sub(1)? as usize;
        self.transmissions.get(index)
    }
}

/// Fingerprint of a committee configuration.
///
/// Pure: the same inputs always give the same digest, so oracles can agree on the
/// digest of a configuration before it is submitted.
pub fn config_digest_from_data(
    contract_address: &Pubkey,
    config_count: u64,
    signers: &[SigningKey],
    transmitters: &[Pubkey],
    f: u8,
    encoded_config_version: u64,
    encoded_config: &[u8],
) -> ConfigDigest {
    let mut data: Vec<&[u8]> = Vec::with_capacity(7 + signers.len() + transmitters.len());
    let addr = contract_address.to_bytes();
    data.push(&addr);
    let count = config_count.to_be_bytes();
    data.push(&count);
    // lengths are bounded by MAX_ORACLES so they always fit
    let n = [signers.len() as u8, transmitters.len() as u8];
    data.push(&n);
    for signer in signers {
        data.push(&signer.key);
    }
    for transmitter in transmitters {
        data.push(transmitter.as_ref());
    }
    let f = [f];
    data.push(&f);
    let version = encoded_config_version.to_be_bytes();
    data.push(&version);
    let encoded_config_len = (encoded_config.len() as u64).to_be_bytes();
    data.push(&encoded_config_len);
    data.push(encoded_config);

    let hash = keccak::hashv(&data).to_bytes();
    let mut digest = [0u8; DIGEST_SIZE];
    digest.copy_from_slice(&hash[..DIGEST_SIZE]);
    digest
}
