use anchor_lang::prelude::Pubkey;

/// What the platform knows about the call being executed.
///
/// Every state-changing operation takes one of these in place of the chain's
/// implicit caller, block and gas globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Env {
    /// Account that signed the call
    pub sender: Pubkey,
    pub block_number: u32,
    /// Unix timestamp of the block, in seconds
    pub timestamp: u64,
    /// Gas price the caller paid for the call
    pub gas_price_gwei: u64,
}

impl Env {
    pub fn new(sender: Pubkey) -> Self {
        Self {
            sender,
            block_number: 0,
            timestamp: 0,
            gas_price_gwei: 0,
        }
    }

    pub fn with_sender(self, sender: Pubkey) -> Self {
        Self { sender, ..self }
    }

    pub fn at_block(self, block_number: u32, timestamp: u64) -> Self {
        Self {
            block_number,
            timestamp,
            ..self
        }
    }

    pub fn with_gas_price(self, gas_price_gwei: u64) -> Self {
        Self {
            gas_price_gwei,
            ..self
        }
    }
}
