//! Post-transmission answer validation.
//!
//! The aggregator hands every new answer to an optional [`Validator`]. Validation
//! is advisory: a failing or flagging validator never reverts the transmission.
use anchor_lang::prelude::*;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use access_controller::HasAccess;

pub const THRESHOLD_MULTIPLIER: u128 = 100_000;
pub const MAX_FLAGS: usize = 128;

pub trait Validator {
    fn address(&self) -> Pubkey;

    /// Returns whether `answer` is considered valid given the previous round.
    fn validate(
        &mut self,
        aggregator: &Pubkey,
        previous_round_id: u32,
        previous_answer: i128,
        round_id: u32,
        answer: i128,
    ) -> Result<bool>;
}

// Lets a caller keep a handle on a validator after installing it.
impl<V: Validator + ?Sized> Validator for Rc<RefCell<V>> {
    fn address(&self) -> Pubkey {
        self.borrow().address()
    }

    fn validate(
        &mut self,
        aggregator: &Pubkey,
        previous_round_id: u32,
        previous_answer: i128,
        round_id: u32,
        answer: i128,
    ) -> Result<bool> {
        self.borrow_mut().validate(
            aggregator,
            previous_round_id,
            previous_answer,
            round_id,
            answer,
        )
    }
}

/// Raises a flag for an aggregator whenever its answer jumps by more than
/// `flagging_threshold / THRESHOLD_MULTIPLIER` relative to the previous answer.
pub struct DeviationFlaggingValidator {
    address: Pubkey,
    pub owner: Pubkey,
    pub flagging_threshold: u32,
    raising_access_controller: Option<Arc<dyn HasAccess>>,
    flags: Vec<Pubkey>,
}

impl DeviationFlaggingValidator {
    pub fn new(address: Pubkey, owner: Pubkey, flagging_threshold: u32) -> Self {
        Self {
            address,
            owner,
            flagging_threshold,
            raising_access_controller: None,
            flags: Vec::new(),
        }
    }

    /// Restricts which aggregators may raise flags. Without a controller any caller may.
    pub fn set_raising_access_controller(
        &mut self,
        authority: &Pubkey,
        controller: Option<Arc<dyn HasAccess>>,
    ) -> Result<()> {
        require!(authority == &self.owner, Unauthorized);
        self.raising_access_controller = controller;
        Ok(())
    }

    pub fn lower_flags(&mut self, authority: &Pubkey, flags: &[Pubkey]) -> Result<()> {
        require!(authority == &self.owner, Unauthorized);
        self.flags.retain(|flag| !flags.contains(flag));
        Ok(())
    }

    pub fn is_flagged(&self, address: &Pubkey) -> bool {
        self.flags.contains(address)
    }

    pub fn flags(&self) -> &[Pubkey] {
        &self.flags
    }
}

impl Validator for DeviationFlaggingValidator {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn validate(
        &mut self,
        aggregator: &Pubkey,
        _previous_round_id: u32,
        previous_answer: i128,
        _round_id: u32,
        answer: i128,
    ) -> Result<bool> {
        if let Some(controller) = &self.raising_access_controller {
            require!(controller.has_access(aggregator, b"validate"), Unauthorized);
        }

        let valid = is_valid(self.flagging_threshold, previous_answer, answer);
        if !valid && !self.is_flagged(aggregator) {
            require!(self.flags.len() < MAX_FLAGS, Full);
            self.flags.push(*aggregator);
        }
        Ok(valid)
    }
}

pub fn is_valid(flagging_threshold: u32, previous_answer: i128, answer: i128) -> bool {
    if previous_answer == 0i128 {
        return true;
    }

    fn abs_diff(slf: i128, other: i128) -> u128 {
        if slf < other {
            (other as u128).wrapping_sub(slf as u128)
        } else {
            (slf as u128).wrapping_sub(other as u128)
        }
    }
    let change = abs_diff(previous_answer, answer);
    let ratio_numerator = match change.checked_mul(THRESHOLD_MULTIPLIER) {
        Some(ratio_numerator) => ratio_numerator,
        None => return false,
    };
    let ratio = ratio_numerator / previous_answer.unsigned_abs();
    ratio <= u128::from(flagging_threshold)
}
