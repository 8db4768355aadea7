//! Deployment parameters.
use anchor_lang::prelude::*;
use serde::{Deserialize, Serialize};

use crate::billing::Billing;

pub const MAX_DESCRIPTION_LEN: usize = 32;

/// Immutable settings chosen when an aggregator is deployed, plus the initial
/// billing parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorParams {
    /// Lowest answer that will be accepted
    pub min_answer: i128,
    /// Highest answer that will be accepted
    pub max_answer: i128,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub billing: Billing,
}

impl AggregatorParams {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<()> {
        require!(self.min_answer < self.max_answer, InvalidInput);
        require!(
            self.description.len() <= MAX_DESCRIPTION_LEN,
            InvalidInput
        );
        Ok(())
    }
}
