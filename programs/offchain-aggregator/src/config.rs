use anchor_lang::prelude::*;
use tracing::info;

use std::collections::BTreeSet;

use crate::context::Env;
use crate::event::Event;
use crate::ledger::TokenLedger;
use crate::state::{config_digest_from_data, Oracle, SigningKey, MAX_ORACLES};
use crate::Aggregator;

impl<L: TokenLedger> Aggregator<L> {
    /// Replaces the committee. Signers and transmitters are index aligned: oracle
    /// `i` signs with `signers[i]` and submits from `transmitters[i]`.
    pub fn set_config(
        &mut self,
        env: &Env,
        signers: &[SigningKey],
        transmitters: &[Pubkey],
        threshold: u8,
        encoded_config_version: u64,
        encoded_config: Vec<u8>,
    ) -> Result<()> {
        self.only_owner(env)?;

        let len = signers.len();
        require!(len != 0, InvalidInput);
        require!(len <= MAX_ORACLES, TooManyOracles);
        require!(transmitters.len() == len, OracleLengthMismatch);
        require!(threshold != 0, InvalidInput);
        require!(3 * usize::from(threshold) < len, ThresholdTooHigh);

        // check for signer duplicates
        let mut unique_signers = BTreeSet::new();
        for signer in signers {
            require!(unique_signers.insert(signer.key), DuplicateSigner);
        }

        // check for transmitter duplicates
        let mut unique_transmitters = BTreeSet::new();
        for transmitter in transmitters {
            require!(unique_transmitters.insert(*transmitter), DuplicateTransmitter);
            // payees are set through set_payees before a transmitter joins
            require!(self.payee_of(transmitter) != Pubkey::default(), PayeeNotSet);
        }

        // Everything checked, commit the new committee
        let config = &mut self.state.config;
        let previous_config_block_number = config.latest_config_block_number;
        config.latest_config_block_number = env.block_number;
        config.config_count += 1;
        config.f = threshold;
        // epochs restart under the new digest
        config.epoch = 0;
        config.round = 0;
        config.encoded_config_version = encoded_config_version;
        config.encoded_config = encoded_config;

        let config_digest = config_digest_from_data(
            &self.address,
            config.config_count,
            signers,
            transmitters,
            threshold,
            encoded_config_version,
            &config.encoded_config,
        );
        config.latest_config_digest = config_digest;

        self.state.oracles = signers
            .iter()
            .zip(transmitters)
            .map(|(signer, transmitter)| Oracle {
                signer: *signer,
                transmitter: *transmitter,
                observations_count: 0,
            })
            .collect();

        let config = &self.state.config;
        info!(
            config_count = config.config_count,
            config_digest = ?config_digest,
            oracles = len,
            threshold,
            "config set"
        );
        let event = Event::ConfigSet {
            previous_config_block_number,
            config_count: config.config_count,
            config_digest,
            signers: signers.iter().map(|signer| signer.key).collect(),
            transmitters: transmitters.to_vec(),
            threshold,
            encoded_config_version,
            encoded_config: config.encoded_config.clone(),
        };
        self.emit(env, event);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.state.config.config_count != 0
    }
}
