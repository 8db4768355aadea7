//! Transmitter reimbursement, payee management and payouts.
//!
//! All amounts are in token gwei ("gjuels"). Balances are keyed by transmitter and
//! outlive committee rotation, so an oracle that is rotated out can still withdraw.
use anchor_lang::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use std::convert::TryInto;
use std::sync::Arc;

use access_controller::HasAccess;

use crate::context::Env;
use crate::event::Event;
use crate::ledger::TokenLedger;
use crate::state::Payee;
use crate::{Aggregator, ErrorCode};

/// Gas spent on bookkeeping after the gas meter was last sampled.
pub const ACCOUNTING_GAS_COST: u64 = 6_035;
/// Gas charged per byte of call data.
pub const CALLDATA_GAS_COST: u64 = 16;

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    AnchorSerialize,
    AnchorDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Billing {
    /// Highest gas price the transmitter is reimbursed for
    pub maximum_gas_price_gwei: u32,
    /// Transmitters paying less than this get half the difference as a bonus
    pub reasonable_gas_price_gwei: u32,
    /// Exchange rate, in 1e-6 token per unit of the gas token
    pub micro_link_per_eth: u32,
    pub link_gwei_per_observation: u32,
    pub link_gwei_per_transmission: u32,
}

/// Gas price used for reimbursement. Transmitters are rewarded for undercutting the
/// reasonable price, but never paid more than the maximum.
pub fn implied_gas_price_gwei(billing: &Billing, tx_gas_price_gwei: u64) -> u64 {
    let reasonable = u64::from(billing.reasonable_gas_price_gwei);
    let mut gas_price = tx_gas_price_gwei;
    if gas_price < reasonable {
        gas_price += (reasonable - gas_price) / 2;
    }
    gas_price.min(u64::from(billing.maximum_gas_price_gwei))
}

/// Size of the ABI encoded `transmit(bytes,bytes32[],bytes32[],bytes32)` call.
pub fn transmit_calldata_len(report_len: usize, signature_count: usize) -> u64 {
    const WORD: u64 = 32;
    let padded_report = (report_len as u64 + WORD - 1) / WORD * WORD;
    // selector and four head words, then the length prefixed report, rs and ss
    4 + 4 * WORD + (WORD + padded_report) + 2 * (WORD + WORD * signature_count as u64)
}

pub fn calculate_reimbursement_gjuels(
    billing: &Billing,
    tx_gas_price_gwei: u64,
    calldata_len: u64,
) -> u64 {
    const MICRO: u128 = 1_000_000;
    let gas_price = implied_gas_price_gwei(billing, tx_gas_price_gwei);
    let gas_used = u128::from(ACCOUNTING_GAS_COST)
        + u128::from(CALLDATA_GAS_COST) * u128::from(calldata_len);
    // gas_used * gwei is in 1e-9 gas token, scaled by 1e-6 token per gas token
    let gjuels = gas_used
        .saturating_mul(u128::from(gas_price))
        .saturating_mul(u128::from(billing.micro_link_per_eth))
        / MICRO;

    // convert from u128 to u64 with saturating logic to max u64
    gjuels.try_into().unwrap_or(u64::MAX)
}

/// Total credited to the transmitter of an accepted report.
pub fn calculate_transmission_payment_gjuels(
    billing: &Billing,
    tx_gas_price_gwei: u64,
    calldata_len: u64,
    observation_count: usize,
) -> u64 {
    let observations = u64::from(billing.link_gwei_per_observation)
        .saturating_mul(observation_count as u64);
    calculate_reimbursement_gjuels(billing, tx_gas_price_gwei, calldata_len)
        .saturating_add(u64::from(billing.link_gwei_per_transmission))
        .saturating_add(observations)
}

pub fn calculate_total_link_due_gjuels<'a>(
    payees: impl IntoIterator<Item = &'a Payee>,
) -> Result<u64> {
    let due = payees
        .into_iter()
        .try_fold(0u64, |due, payee| due.checked_add(payee.owed_gjuels))
        .ok_or(ErrorCode::Overflow)?;
    Ok(due)
}

impl<L: TokenLedger> Aggregator<L> {
    pub fn set_billing(&mut self, env: &Env, billing: Billing) -> Result<()> {
        self.has_billing_access(env, b"set_billing")?;

        self.state.config.billing = billing;
        info!(?billing, "billing set");
        self.emit(env, Event::BillingSet(billing));
        Ok(())
    }

    pub fn get_billing(&self) -> Billing {
        self.state.config.billing
    }

    pub fn set_billing_access_controller(
        &mut self,
        env: &Env,
        controller: Option<Arc<dyn HasAccess>>,
    ) -> Result<()> {
        self.has_billing_access(env, b"set_billing_access_controller")?;

        let old = self.billing_access_controller();
        let current = controller.as_ref().map(|controller| controller.address());
        self.billing_access_controller = controller;
        if old != current {
            self.emit(env, Event::BillingAccessControllerSet { old, current });
        }
        Ok(())
    }

    pub fn billing_access_controller(&self) -> Option<Pubkey> {
        self.billing_access_controller
            .as_ref()
            .map(|controller| controller.address())
    }

    /// Assigns initial payees. A payee that is already set can only be changed
    /// through the transfer handshake.
    pub fn set_payees(
        &mut self,
        env: &Env,
        transmitters: &[Pubkey],
        payees: &[Pubkey],
    ) -> Result<()> {
        self.only_owner(env)?;
        require!(transmitters.len() == payees.len(), PayeeOracleMismatch);

        for (transmitter, payee) in transmitters.iter().zip(payees) {
            require!(*payee != Pubkey::default(), InvalidInput);
            let current = self.payee_of(transmitter);
            require!(
                current == Pubkey::default() || current == *payee,
                PayeeAlreadySet
            );
        }

        for (transmitter, payee) in transmitters.iter().zip(payees) {
            let entry = self.state.payees.entry(*transmitter).or_default();
            let previous = entry.payee;
            entry.payee = *payee;
            if previous != *payee {
                self.emit(
                    env,
                    Event::PayeeshipTransferred {
                        transmitter: *transmitter,
                        previous,
                        current: *payee,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn transfer_payeeship(
        &mut self,
        env: &Env,
        transmitter: &Pubkey,
        proposed: Pubkey,
    ) -> Result<()> {
        // Can't transfer to self
        require!(proposed != env.sender, InvalidInput);
        require!(proposed != Pubkey::default(), InvalidInput);

        let payee = self
            .state
            .payees
            .get_mut(transmitter)
            .ok_or(ErrorCode::Unauthorized)?;
        require!(payee.payee == env.sender, Unauthorized);

        let previous = std::mem::replace(&mut payee.proposed_payee, proposed);
        if previous != proposed {
            self.emit(
                env,
                Event::PayeeshipTransferRequested {
                    transmitter: *transmitter,
                    current: env.sender,
                    proposed,
                },
            );
        }
        Ok(())
    }

    pub fn accept_payeeship(&mut self, env: &Env, transmitter: &Pubkey) -> Result<()> {
        let payee = self
            .state
            .payees
            .get_mut(transmitter)
            .ok_or(ErrorCode::Unauthorized)?;
        require!(
            payee.proposed_payee != Pubkey::default() && payee.proposed_payee == env.sender,
            Unauthorized
        );

        let previous = payee.payee;
        payee.payee = std::mem::take(&mut payee.proposed_payee);
        self.emit(
            env,
            Event::PayeeshipTransferred {
                transmitter: *transmitter,
                previous,
                current: env.sender,
            },
        );
        Ok(())
    }

    /// Pays the transmitter's full balance to its payee. Returns the amount paid.
    pub fn withdraw_payment(&mut self, env: &Env, transmitter: &Pubkey) -> Result<u64> {
        let payee = self
            .state
            .payees
            .get(transmitter)
            .copied()
            .ok_or(ErrorCode::Unauthorized)?;
        require!(
            payee.payee != Pubkey::default() && payee.payee == env.sender,
            Unauthorized
        );

        let amount_gjuels = payee.owed_gjuels;
        if amount_gjuels == 0 {
            return Ok(0);
        }

        require!(
            self.token
                .transfer(&self.address, &payee.payee, amount_gjuels),
            InsufficientFunds
        );
        if let Some(entry) = self.state.payees.get_mut(transmitter) {
            entry.owed_gjuels = 0;
        }

        info!(%transmitter, payee = %payee.payee, amount_gjuels, "oracle paid");
        self.emit(
            env,
            Event::OraclePaid {
                transmitter: *transmitter,
                payee: payee.payee,
                amount_gjuels,
            },
        );
        Ok(amount_gjuels)
    }

    /// Moves tokens not owed to any transmitter out of the aggregator. Returns the
    /// amount actually moved, which is capped at what is available.
    pub fn withdraw_funds(&mut self, env: &Env, recipient: &Pubkey, amount_gjuels: u64) -> Result<u64> {
        self.has_billing_access(env, b"withdraw_funds")?;

        let link_due = calculate_total_link_due_gjuels(self.state.payees.values())?;
        let balance_gjuels = self.token.balance_of(&self.address);
        let available = balance_gjuels.saturating_sub(link_due);
        let amount_gjuels = amount_gjuels.min(available);

        if amount_gjuels > 0 {
            require!(
                self.token.transfer(&self.address, recipient, amount_gjuels),
                InsufficientFunds
            );
            info!(%recipient, amount_gjuels, "funds withdrawn");
        }
        Ok(amount_gjuels)
    }

    pub fn owed_payment(&self, transmitter: &Pubkey) -> u64 {
        self.state
            .payees
            .get(transmitter)
            .map_or(0, |payee| payee.owed_gjuels)
    }

    /// Token balance left after every transmitter is paid. Negative when the
    /// aggregator is underfunded.
    pub fn link_available_for_payment(&self) -> Result<i128> {
        let link_due = calculate_total_link_due_gjuels(self.state.payees.values())?;
        let balance_gjuels = self.token.balance_of(&self.address);
        Ok(i128::from(balance_gjuels) - i128::from(link_due))
    }

    /// Observations credited to the oracle under the current config.
    pub fn oracle_observation_count(&self, transmitter: &Pubkey) -> u16 {
        self.state
            .transmitter_index(transmitter)
            .map_or(0, |index| self.state.oracles[index].observations_count)
    }

    pub fn payee_of(&self, transmitter: &Pubkey) -> Pubkey {
        self.state
            .payees
            .get(transmitter)
            .map(|payee| payee.payee)
            .unwrap_or_default()
    }
}
