//! Report verification and commit.
//!
//! A report is checked in full before any state is touched, so a rejected
//! transmission leaves no trace.
use anchor_lang::prelude::*;
use anchor_lang::solana_program::{keccak, secp256k1_recover::*};
use tracing::{debug, warn};

use crate::billing::{calculate_transmission_payment_gjuels, transmit_calldata_len};
use crate::context::Env;
use crate::event::Event;
use crate::ledger::TokenLedger;
use crate::report::{is_sorted, median, Report};
use crate::state::Transmission;
use crate::{Aggregator, ErrorCode};

/// Fewer than two observations can't produce a meaningful median.
pub const MIN_OBSERVATIONS: usize = 2;

struct VerifiedReport {
    report: Report,
    answer: i128,
    transmitter_index: usize,
}

impl<L: TokenLedger> Aggregator<L> {
    /// Submits a signed report. `rs[i]`, `ss[i]` and `raw_vs[i]` form the i-th
    /// signature over `keccak256(report)`, `raw_vs[i]` being its recovery id.
    ///
    /// Returns the aggregator round id assigned to the new answer.
    pub fn transmit(
        &mut self,
        env: &Env,
        report: &[u8],
        rs: &[[u8; 32]],
        ss: &[[u8; 32]],
        raw_vs: [u8; 32],
    ) -> Result<u32> {
        let verified = self.verify(env, report, rs, ss, &raw_vs)?;
        self.commit(env, report.len(), rs.len(), verified)
    }

    fn verify(
        &self,
        env: &Env,
        raw_report: &[u8],
        rs: &[[u8; 32]],
        ss: &[[u8; 32]],
        raw_vs: &[u8; 32],
    ) -> Result<VerifiedReport> {
        let report = Report::unpack(raw_report)?;
        let config = &self.state.config;
        let n = self.state.oracles.len();

        require!(self.is_configured(), NotConfigured);
        require!(
            report.context.config_digest == config.latest_config_digest,
            DigestMismatch
        );

        let observation_count = report.observations.len();
        require!(
            (MIN_OBSERVATIONS..=n).contains(&observation_count),
            ObservationCountOutOfRange
        );

        // Either newer epoch, or same epoch but higher round
        require!(
            (config.epoch, config.round) < report.context.epoch_and_round(),
            StaleReport
        );

        require!(rs.len() == ss.len(), InvalidInput);
        let signature_count = rs.len();
        require!(
            usize::from(config.f) < signature_count && signature_count <= n,
            WrongNumberOfSignatures
        );

        // Verify signatures attached to report
        let hash = keccak::hash(raw_report).to_bytes();

        // this fits MAX_ORACLES
        let mut signed: u32 = 0;

        for ((r, s), recovery_id) in rs.iter().zip(ss).zip(raw_vs.iter()) {
            let mut signature = [0u8; SECP256K1_SIGNATURE_LENGTH];
            signature[..32].copy_from_slice(r);
            signature[32..].copy_from_slice(s);

            let signer =
                secp256k1_recover(&hash, *recovery_id, &signature).map_err(|err| match err {
                    Secp256k1RecoverError::InvalidHash => ErrorCode::InvalidInput,
                    Secp256k1RecoverError::InvalidRecoveryId => ErrorCode::InvalidSignature,
                    Secp256k1RecoverError::InvalidSignature => ErrorCode::InvalidSignature,
                })?;

            // convert to a raw 20 byte Ethereum address
            let address = &keccak::hash(&signer.0).to_bytes()[12..];

            let index = self
                .state
                .signer_index(address)
                .ok_or(ErrorCode::UnauthorizedSigner)?;

            let bit = 1u32 << index;
            require!(signed & bit == 0, DuplicateSigner);
            signed |= bit;
        }

        // only the transmitter paired with one of the signers may submit
        let transmitter_index = self
            .state
            .transmitter_index(&env.sender)
            .ok_or(ErrorCode::UnauthorizedTransmitter)?;
        require!(
            signed & (1u32 << transmitter_index) != 0,
            UnauthorizedTransmitter
        );

        let mut observed: u32 = 0;
        for observer in report.observers() {
            let observer = usize::from(*observer);
            require!(observer < n, InvalidObserver);
            let bit = 1u32 << observer;
            require!(observed & bit == 0, DuplicateObserver);
            observed |= bit;
        }

        require!(is_sorted(&report.observations), ObservationsNotSorted);

        let answer = median(&report.observations).ok_or(ErrorCode::ObservationCountOutOfRange)?;
        require!(
            answer >= config.min_answer && answer <= config.max_answer,
            MedianOutOfRange
        );

        Ok(VerifiedReport {
            report,
            answer,
            transmitter_index,
        })
    }

    fn commit(
        &mut self,
        env: &Env,
        report_len: usize,
        signature_count: usize,
        verified: VerifiedReport,
    ) -> Result<u32> {
        let VerifiedReport {
            report,
            answer,
            transmitter_index,
        } = verified;

        let previous = self
            .state
            .latest_transmission()
            .map_or((0, 0), |transmission| {
                (transmission.aggregator_round_id, transmission.answer)
            });

        let round_id = self
            .state
            .config
            .latest_aggregator_round_id
            .checked_add(1)
            .ok_or(ErrorCode::Overflow)?; // this should never occur, but let's check for it anyway

        let observers = report.observers().to_vec();
        for observer in &observers {
            let oracle = &mut self.state.oracles[usize::from(*observer)];
            oracle.observations_count = oracle.observations_count.saturating_add(1);
        }

        // calculate and accrue reimbursement
        let transmitter = env.sender;
        let calldata_len = transmit_calldata_len(report_len, signature_count);
        let amount_gjuels = calculate_transmission_payment_gjuels(
            &self.state.config.billing,
            env.gas_price_gwei,
            calldata_len,
            report.observations.len(),
        );
        let payee = self.state.payees.entry(transmitter).or_default();
        payee.owed_gjuels = payee.owed_gjuels.saturating_add(amount_gjuels);

        let config = &mut self.state.config;
        config.epoch = report.context.epoch;
        config.round = report.context.round;
        config.latest_aggregator_round_id = round_id;
        config.latest_transmitter = transmitter;

        self.state.transmissions.push(Transmission {
            aggregator_round_id: round_id,
            answer,
            transmitter,
            observations: report.observations.clone(),
            observers: observers.clone(),
            epoch: report.context.epoch,
            round: report.context.round,
            timestamp: env.timestamp,
        });

        debug!(
            round_id,
            answer,
            %transmitter,
            oracle = transmitter_index,
            epoch = report.context.epoch,
            round = report.context.round,
            amount_gjuels,
            "transmission accepted"
        );

        self.emit(
            env,
            Event::NewTransmission {
                aggregator_round_id: round_id,
                answer,
                transmitter,
                observations: report.observations,
                observers,
                raw_report_context: report.raw_context,
            },
        );
        self.emit(
            env,
            Event::NewRound {
                round_id,
                started_by: transmitter,
                started_at: env.timestamp,
            },
        );
        self.emit(
            env,
            Event::AnswerUpdated {
                current: answer,
                round_id,
                updated_at: env.timestamp,
            },
        );

        self.validate_answer(previous, round_id, answer);

        Ok(round_id)
    }

    // The validator is advisory, a failure never reverts the transmission.
    fn validate_answer(&mut self, previous: (u32, i128), round_id: u32, answer: i128) {
        let aggregator = self.address;
        let validator = match self.validator.as_mut() {
            Some(validator) => validator,
            None => return,
        };

        let (previous_round_id, previous_answer) = previous;
        match validator.validate(&aggregator, previous_round_id, previous_answer, round_id, answer)
        {
            Ok(true) => (),
            Ok(false) => warn!(
                validator = %validator.address(),
                previous_answer,
                answer,
                round_id,
                "answer flagged by validator"
            ),
            Err(err) => warn!(
                validator = %validator.address(),
                round_id,
                %err,
                "validator failed"
            ),
        }
    }
}
