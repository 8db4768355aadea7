//! Access lists consulted before privileged aggregator calls.
//!
//! The aggregator only ever sees the [`HasAccess`] capability; [`AccessController`]
//! is the stock implementation: an owner-managed, sorted list of addresses.
use anchor_lang::prelude::*;
use static_assertions::const_assert;
use tracing::debug;

pub const MAX_ADDRS: usize = 64;
const_assert!(MAX_ADDRS > 0);

/// Gate consulted by the aggregator before billing or round-request calls.
pub trait HasAccess {
    /// Address the controller is registered under.
    fn address(&self) -> Pubkey;

    /// Check if `user` may perform the call described by `data`.
    fn has_access(&self, user: &Pubkey, data: &[u8]) -> bool;
}

#[derive(Debug, Clone)]
pub struct AccessController {
    address: Pubkey,
    pub owner: Pubkey,
    pub proposed_owner: Pubkey,
    // kept sorted so lookups can binary search
    access_list: Vec<Pubkey>,
}

impl AccessController {
    pub fn new(address: Pubkey, owner: Pubkey) -> Self {
        Self {
            address,
            owner,
            proposed_owner: Pubkey::default(),
            access_list: Vec::new(),
        }
    }

    pub fn transfer_ownership(&mut self, authority: &Pubkey, proposed_owner: Pubkey) -> Result<()> {
        self.only_owner(authority)?;
        require!(proposed_owner != Pubkey::default(), InvalidInput);
        self.proposed_owner = proposed_owner;
        Ok(())
    }

    pub fn accept_ownership(&mut self, authority: &Pubkey) -> Result<()> {
        require!(
            self.proposed_owner != Pubkey::default() && authority == &self.proposed_owner,
            Unauthorized
        );
        self.owner = std::mem::take(&mut self.proposed_owner);
        Ok(())
    }

    pub fn add_access(&mut self, authority: &Pubkey, address: Pubkey) -> Result<()> {
        self.only_owner(authority)?;

        match self.access_list.binary_search(&address) {
            // already present
            Ok(_i) => (),
            Err(i) => {
                require!(self.access_list.len() < MAX_ADDRS, Full);
                self.access_list.insert(i, address);
                debug!(controller = %self.address, %address, "access added");
            }
        }
        Ok(())
    }

    pub fn remove_access(&mut self, authority: &Pubkey, address: &Pubkey) -> Result<()> {
        self.only_owner(authority)?;

        if let Ok(index) = self.access_list.binary_search(address) {
            // removal keeps the list sorted
            self.access_list.remove(index);
            debug!(controller = %self.address, %address, "access removed");
        }
        Ok(())
    }

    pub fn access_list(&self) -> &[Pubkey] {
        &self.access_list
    }

    fn only_owner(&self, authority: &Pubkey) -> Result<()> {
        require!(authority == &self.owner, Unauthorized);
        Ok(())
    }
}

impl HasAccess for AccessController {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn has_access(&self, user: &Pubkey, _data: &[u8]) -> bool {
        self.access_list.binary_search(user).is_ok()
    }
}

#[error_code]
pub enum ErrorCode {
    #[msg("Unauthorized")]
    Unauthorized = 0,

    #[msg("Invalid input")]
    InvalidInput = 1,

    #[msg("Access list is full")]
    Full = 2,
}
