//! Read-only capabilities exposed by the aggregator.
//!
//! Consumers depend on the narrowest trait they need; [`crate::Aggregator`]
//! implements all of them.
use anchor_lang::prelude::*;

use std::convert::TryFrom;

use crate::ledger::TokenLedger;
use crate::state::{ConfigDigest, Transmission};
use crate::{Aggregator, ErrorCode, TYPE_AND_VERSION, VERSION};

/// Round ids are 80 bits wide; only the low 32 bits address aggregator rounds.
pub type RoundId = u128;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: RoundId,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: RoundId,
}

impl From<&Transmission> for RoundData {
    fn from(transmission: &Transmission) -> Self {
        let round_id = RoundId::from(transmission.aggregator_round_id);
        Self {
            round_id,
            answer: transmission.answer,
            started_at: transmission.timestamp,
            updated_at: transmission.timestamp,
            answered_in_round: round_id,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDetails {
    pub config_count: u64,
    pub block_number: u32,
    pub config_digest: ConfigDigest,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionDetails {
    pub config_digest: ConfigDigest,
    pub epoch: u32,
    pub round: u8,
    pub latest_answer: i128,
    pub latest_timestamp: u64,
}

/// Latest and historical answers. The `latest_*` calls return zero before the
/// first transmission.
pub trait AnswerReader {
    fn latest_answer(&self) -> i128;
    fn latest_timestamp(&self) -> u64;
    fn latest_round(&self) -> RoundId;
    fn get_answer(&self, round_id: RoundId) -> Result<i128>;
    fn get_timestamp(&self, round_id: RoundId) -> Result<u64>;
}

pub trait RoundDataReader {
    fn decimals(&self) -> u8;
    fn description(&self) -> &str;
    fn version(&self) -> u8;
    fn get_round_data(&self, round_id: RoundId) -> Result<RoundData>;
    fn latest_round_data(&self) -> Result<RoundData>;
}

pub trait ConfigReader {
    fn latest_config_details(&self) -> ConfigDetails;
    fn transmitters(&self) -> Vec<Pubkey>;
    fn latest_transmission_details(&self) -> TransmissionDetails;
    fn type_and_version(&self) -> &'static str {
        TYPE_AND_VERSION
    }
}

impl<L: TokenLedger> Aggregator<L> {
    /// Looks up a historical round. Ids outside the recorded range have no data.
    fn round(&self, round_id: RoundId) -> Result<&Transmission> {
        let round_id = u32::try_from(round_id).map_err(|_| ErrorCode::NoDataPresent)?;
        let transmission = self
            .state
            .transmission(round_id)
            .ok_or(ErrorCode::NoDataPresent)?;
        Ok(transmission)
    }
}

impl<L: TokenLedger> AnswerReader for Aggregator<L> {
    fn latest_answer(&self) -> i128 {
        self.state
            .latest_transmission()
            .map_or(0, |transmission| transmission.answer)
    }

    fn latest_timestamp(&self) -> u64 {
        self.state
            .latest_transmission()
            .map_or(0, |transmission| transmission.timestamp)
    }

    fn latest_round(&self) -> RoundId {
        RoundId::from(self.state.config.latest_aggregator_round_id)
    }

    fn get_answer(&self, round_id: RoundId) -> Result<i128> {
        Ok(self.round(round_id)?.answer)
    }

    fn get_timestamp(&self, round_id: RoundId) -> Result<u64> {
        Ok(self.round(round_id)?.timestamp)
    }
}

impl<L: TokenLedger> RoundDataReader for Aggregator<L> {
    fn decimals(&self) -> u8 {
        self.state.config.decimals
    }

    fn description(&self) -> &str {
        &self.state.config.description
    }

    fn version(&self) -> u8 {
        VERSION
    }

    fn get_round_data(&self, round_id: RoundId) -> Result<RoundData> {
        self.round(round_id).map(RoundData::from)
    }

    fn latest_round_data(&self) -> Result<RoundData> {
        let transmission = self
            .state
            .latest_transmission()
            .ok_or(ErrorCode::NoDataPresent)?;
        Ok(RoundData::from(transmission))
    }
}

impl<L: TokenLedger> ConfigReader for Aggregator<L> {
    fn latest_config_details(&self) -> ConfigDetails {
        let config = &self.state.config;
        ConfigDetails {
            config_count: config.config_count,
            block_number: config.latest_config_block_number,
            config_digest: config.latest_config_digest,
        }
    }

    fn transmitters(&self) -> Vec<Pubkey> {
        self.state
            .oracles
            .iter()
            .map(|oracle| oracle.transmitter)
            .collect()
    }

    fn latest_transmission_details(&self) -> TransmissionDetails {
        let config = &self.state.config;
        TransmissionDetails {
            config_digest: config.latest_config_digest,
            epoch: config.epoch,
            round: config.round,
            latest_answer: self.latest_answer(),
            latest_timestamp: self.latest_timestamp(),
        }
    }
}
