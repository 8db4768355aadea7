//! Off-chain reporting (OCR) aggregator.
//!
//! A fixed committee of oracles agrees off-chain on a value and submits it as a
//! single report signed by a quorum of the committee. [`Aggregator`] validates
//! those reports against the active configuration, records the median of the
//! reported observations as the new answer and reimburses the transmitter.
use anchor_lang::prelude::*;
use tracing::info;

use std::sync::Arc;

use access_controller::HasAccess;

pub mod billing;
mod config;
pub mod context;
pub mod event;
pub mod interfaces;
pub mod ledger;
pub mod params;
pub mod report;
pub mod state;
mod transmit;
pub mod validator;

pub use crate::billing::Billing;
pub use crate::context::Env;
pub use crate::event::{Cursor, Event, EventLog, LogEntry};
pub use crate::interfaces::{
    AnswerReader, ConfigDetails, ConfigReader, RoundData, RoundDataReader, RoundId,
    TransmissionDetails,
};
pub use crate::ledger::{MemoryLedger, TokenLedger};
pub use crate::params::AggregatorParams;
pub use crate::report::{Report, ReportContext};
pub use crate::state::{config_digest_from_data, ConfigDigest, SigningKey, State};
pub use crate::validator::{DeviationFlaggingValidator, Validator};

pub const VERSION: u8 = 4;
pub const TYPE_AND_VERSION: &str = "OffchainAggregator 4.0.0";

pub struct Aggregator<L> {
    address: Pubkey,
    state: State,
    events: EventLog,
    token: L,
    billing_access_controller: Option<Arc<dyn HasAccess>>,
    requester_access_controller: Option<Arc<dyn HasAccess>>,
    validator: Option<Box<dyn Validator>>,
}

impl<L: TokenLedger> Aggregator<L> {
    /// Deploys an aggregator at `address`, owned by `env.sender`.
    pub fn new(env: &Env, address: Pubkey, params: AggregatorParams, token: L) -> Result<Self> {
        params.validate()?;

        let mut state = State::default();
        let config = &mut state.config;
        config.owner = env.sender;
        config.min_answer = params.min_answer;
        config.max_answer = params.max_answer;
        config.decimals = params.decimals;
        config.description = params.description;
        config.billing = params.billing;

        let mut aggregator = Self {
            address,
            state,
            events: EventLog::default(),
            token,
            billing_access_controller: None,
            requester_access_controller: None,
            validator: None,
        };
        info!(%address, owner = %env.sender, "aggregator deployed");
        aggregator.emit(env, Event::BillingSet(params.billing));
        Ok(aggregator)
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn token(&self) -> &L {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut L {
        &mut self.token
    }

    pub fn owner(&self) -> Pubkey {
        self.state.config.owner
    }

    pub fn transfer_ownership(&mut self, env: &Env, proposed_owner: Pubkey) -> Result<()> {
        self.only_owner(env)?;
        require!(proposed_owner != Pubkey::default(), InvalidInput);
        require!(proposed_owner != env.sender, InvalidInput);

        self.state.config.proposed_owner = proposed_owner;
        self.emit(
            env,
            Event::OwnershipTransferRequested {
                from: env.sender,
                to: proposed_owner,
            },
        );
        Ok(())
    }

    pub fn accept_ownership(&mut self, env: &Env) -> Result<()> {
        let config = &mut self.state.config;
        require!(
            config.proposed_owner != Pubkey::default() && env.sender == config.proposed_owner,
            Unauthorized
        );

        let from = config.owner;
        config.owner = std::mem::take(&mut config.proposed_owner);
        self.emit(
            env,
            Event::OwnershipTransferred {
                from,
                to: env.sender,
            },
        );
        Ok(())
    }

    pub fn set_requester_access_controller(
        &mut self,
        env: &Env,
        controller: Option<Arc<dyn HasAccess>>,
    ) -> Result<()> {
        self.only_owner(env)?;

        let old = self.requester_access_controller();
        let current = controller.as_ref().map(|controller| controller.address());
        self.requester_access_controller = controller;
        if old != current {
            self.emit(env, Event::RequesterAccessControllerSet { old, current });
        }
        Ok(())
    }

    pub fn requester_access_controller(&self) -> Option<Pubkey> {
        self.requester_access_controller
            .as_ref()
            .map(|controller| controller.address())
    }

    /// Asks the committee to produce a new report outside its regular schedule.
    /// Returns the aggregator round id the next transmission will get.
    pub fn request_new_round(&mut self, env: &Env) -> Result<u32> {
        let is_owner = env.sender == self.state.config.owner;
        let has_access = is_owner
            || self
                .requester_access_controller
                .as_ref()
                .map_or(false, |controller| {
                    controller.has_access(&env.sender, b"request_new_round")
                });
        require!(has_access, Unauthorized);

        let config = &self.state.config;
        let next_round_id = config
            .latest_aggregator_round_id
            .checked_add(1)
            .ok_or(ErrorCode::Overflow)?;
        let event = Event::RoundRequested {
            requester: env.sender,
            config_digest: config.latest_config_digest,
            epoch: config.epoch,
            round: config.round,
        };
        self.emit(env, event);
        Ok(next_round_id)
    }

    pub fn set_validator(&mut self, env: &Env, validator: Option<Box<dyn Validator>>) -> Result<()> {
        self.only_owner(env)?;

        let previous = self.validator.as_ref().map(|validator| validator.address());
        let current = validator.as_ref().map(|validator| validator.address());
        self.validator = validator;
        if previous != current {
            self.emit(env, Event::ValidatorUpdated { previous, current });
        }
        Ok(())
    }

    pub fn validator(&self) -> Option<Pubkey> {
        self.validator.as_ref().map(|validator| validator.address())
    }

    fn emit(&mut self, env: &Env, event: Event) {
        self.events.push(env.block_number, event);
    }

    // -- Access control modifiers

    // Only owner access
    fn only_owner(&self, env: &Env) -> Result<()> {
        require!(env.sender == self.state.config.owner, Unauthorized);
        Ok(())
    }

    // Owner, or anyone the billing access controller admits
    fn has_billing_access(&self, env: &Env, data: &[u8]) -> Result<()> {
        let is_owner = env.sender == self.state.config.owner;

        let has_access = is_owner
            || self
                .billing_access_controller
                .as_ref()
                .map_or(false, |controller| controller.has_access(&env.sender, data));

        require!(has_access, Unauthorized);
        Ok(())
    }
}

#[error_code]
pub enum ErrorCode {
    #[msg("Unauthorized")]
    Unauthorized = 0,

    #[msg("Invalid input")]
    InvalidInput = 1,

    #[msg("Too many oracles")]
    TooManyOracles = 2,

    #[msg("Stale report")]
    StaleReport = 3,

    #[msg("Digest mismatch")]
    DigestMismatch = 4,

    #[msg("Wrong number of signatures")]
    WrongNumberOfSignatures = 5,

    #[msg("Overflow")]
    Overflow = 6,

    #[msg("Median out of range")]
    MedianOutOfRange = 7,

    #[msg("Duplicate signer")]
    DuplicateSigner,

    #[msg("Duplicate transmitter")]
    DuplicateTransmitter,

    #[msg("Payee already set")]
    PayeeAlreadySet,

    #[msg("Payee and Oracle length mismatch")]
    PayeeOracleMismatch,

    #[msg("Oracle signer key not found")]
    UnauthorizedSigner,

    #[msg("Oracle transmitter key not found")]
    UnauthorizedTransmitter,

    #[msg("Signer and transmitter length mismatch")]
    OracleLengthMismatch,

    #[msg("Fault tolerance too high for the number of oracles")]
    ThresholdTooHigh,

    #[msg("Transmitter has no payee")]
    PayeeNotSet,

    #[msg("Aggregator has no config")]
    NotConfigured,

    #[msg("Invalid signature")]
    InvalidSignature,

    #[msg("Observation count out of range")]
    ObservationCountOutOfRange,

    #[msg("Observer index out of range")]
    InvalidObserver,

    #[msg("Duplicate observer")]
    DuplicateObserver,

    #[msg("Observations not sorted")]
    ObservationsNotSorted,

    #[msg("Insufficient funds")]
    InsufficientFunds,

    #[msg("No data present")]
    NoDataPresent,

    #[msg("Flags list is full")]
    Full,
}
