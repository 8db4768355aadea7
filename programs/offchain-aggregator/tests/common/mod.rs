#![allow(dead_code)]

use anchor_lang::prelude::{Pubkey, Result};
use anchor_lang::solana_program::keccak;
use libsecp256k1::{Message, PublicKey, SecretKey};

use offchain_aggregator::{
    AggregatorParams, Billing, ConfigReader, Env, ErrorCode, MemoryLedger, Report,
    ReportContext, SigningKey,
};

pub type Aggregator = offchain_aggregator::Aggregator<MemoryLedger>;

pub const MIN_ANSWER: i128 = -1_000_000_000;
pub const MAX_ANSWER: i128 = 1_000_000_000;
pub const FUNDING: u64 = 1_000_000_000_000;

pub struct OracleKeys {
    pub secret: SecretKey,
    pub signer: SigningKey,
    pub transmitter: Pubkey,
    pub payee: Pubkey,
}

impl OracleKeys {
    pub fn generate(seed: u8) -> Self {
        let secret = SecretKey::parse(&[seed; 32]).unwrap();
        Self {
            signer: SigningKey::from(eth_address(&PublicKey::from_secret_key(&secret))),
            secret,
            transmitter: Pubkey::new_unique(),
            payee: Pubkey::new_unique(),
        }
    }
}

/// 20 byte Ethereum address of a secp256k1 public key.
pub fn eth_address(public: &PublicKey) -> [u8; 20] {
    // drop the 0x04 uncompressed prefix
    let hash = keccak::hash(&public.serialize()[1..]).to_bytes();
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

pub struct Signatures {
    pub rs: Vec<[u8; 32]>,
    pub ss: Vec<[u8; 32]>,
    pub vs: [u8; 32],
}

pub fn sign(report: &[u8], signers: &[&OracleKeys]) -> Signatures {
    let message = Message::parse(&keccak::hash(report).to_bytes());
    let mut signatures = Signatures {
        rs: Vec::new(),
        ss: Vec::new(),
        vs: [0u8; 32],
    };
    for (i, oracle) in signers.iter().enumerate() {
        let (signature, recovery_id) = libsecp256k1::sign(&message, &oracle.secret);
        let raw = signature.serialize();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&raw[..32]);
        s.copy_from_slice(&raw[32..]);
        signatures.rs.push(r);
        signatures.ss.push(s);
        signatures.vs[i] = recovery_id.serialize();
    }
    signatures
}

pub fn billing() -> Billing {
    Billing {
        maximum_gas_price_gwei: 1_000,
        reasonable_gas_price_gwei: 30,
        micro_link_per_eth: 1_000_000,
        link_gwei_per_observation: 5,
        link_gwei_per_transmission: 10,
    }
}

pub fn params() -> AggregatorParams {
    AggregatorParams {
        min_answer: MIN_ANSWER,
        max_answer: MAX_ANSWER,
        decimals: 8,
        description: "ETH / USD".to_string(),
        billing: billing(),
    }
}

pub struct Setup {
    pub aggregator: Aggregator,
    pub owner: Pubkey,
    pub oracles: Vec<OracleKeys>,
    pub env: Env,
}

impl Setup {
    /// Four oracles tolerating one fault, payees assigned and the aggregator funded.
    pub fn new() -> Self {
        Self::with_oracles(4, 1)
    }

    pub fn with_oracles(n: u8, threshold: u8) -> Self {
        let owner = Pubkey::new_unique();
        let env = Env::new(owner).at_block(10, 1_600_000_000);
        let address = Pubkey::new_unique();

        let mut token = MemoryLedger::default();
        token.mint(&address, FUNDING);
        let mut aggregator = Aggregator::new(&env, address, params(), token).unwrap();

        let oracles: Vec<_> = (1..=n).map(OracleKeys::generate).collect();
        let transmitters: Vec<_> = oracles.iter().map(|o| o.transmitter).collect();
        let payees: Vec<_> = oracles.iter().map(|o| o.payee).collect();
        let signers: Vec<_> = oracles.iter().map(|o| o.signer).collect();
        aggregator.set_payees(&env, &transmitters, &payees).unwrap();
        aggregator
            .set_config(&env, &signers, &transmitters, threshold, 1, b"offchain".to_vec())
            .unwrap();

        Self {
            aggregator,
            owner,
            oracles,
            env,
        }
    }

    pub fn digest(&self) -> [u8; 16] {
        self.aggregator.latest_config_details().config_digest
    }

    pub fn report(&self, epoch: u32, round: u8, observers: &[u8], observations: Vec<i128>) -> Vec<u8> {
        let context = ReportContext {
            config_digest: self.digest(),
            epoch,
            round,
        };
        Report::new(context, observers, observations).pack()
    }

    /// Env for a call sent by oracle `index`'s transmitter.
    pub fn as_transmitter(&self, index: usize) -> Env {
        self.env.with_sender(self.oracles[index].transmitter)
    }

    /// Signs `report` with the given oracles and submits it from `sender`'s transmitter.
    pub fn submit(&mut self, report: &[u8], signers: &[usize], sender: usize) -> Result<u32> {
        let keys: Vec<_> = signers.iter().map(|i| &self.oracles[*i]).collect();
        let signatures = sign(report, &keys);
        let env = self.as_transmitter(sender);
        self.aggregator
            .transmit(&env, report, &signatures.rs, &signatures.ss, signatures.vs)
    }
}

pub fn error_code<T>(result: Result<T>) -> u32 {
    match result {
        Err(anchor_lang::error::Error::AnchorError(err)) => err.error_code_number,
        Err(err) => panic!("unexpected error: {}", err),
        Ok(_) => panic!("call succeeded"),
    }
}

pub fn assert_error<T>(result: Result<T>, expected: ErrorCode) {
    assert_eq!(error_code(result), u32::from(expected));
}
