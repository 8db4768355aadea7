use anchor_lang::prelude::*;

use std::convert::TryFrom;

use crate::billing::Billing;
use crate::state::ConfigDigest;

#[derive(Debug, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub enum Event {
    ConfigSet {
        previous_config_block_number: u32,
        config_count: u64,
        config_digest: ConfigDigest,
        signers: Vec<[u8; 20]>,
        transmitters: Vec<Pubkey>,
        threshold: u8,
        encoded_config_version: u64,
        encoded_config: Vec<u8>,
    },
    NewTransmission {
        aggregator_round_id: u32,
        answer: i128,
        transmitter: Pubkey,
        observations: Vec<i128>,
        observers: Vec<u8>,
        raw_report_context: [u8; 32],
    },
    AnswerUpdated {
        current: i128,
        round_id: u32,
        updated_at: u64,
    },
    NewRound {
        round_id: u32,
        started_by: Pubkey,
        started_at: u64,
    },
    RoundRequested {
        requester: Pubkey,
        config_digest: ConfigDigest,
        epoch: u32,
        round: u8,
    },
    BillingSet(Billing),
    BillingAccessControllerSet {
        old: Option<Pubkey>,
        current: Option<Pubkey>,
    },
    RequesterAccessControllerSet {
        old: Option<Pubkey>,
        current: Option<Pubkey>,
    },
    ValidatorUpdated {
        previous: Option<Pubkey>,
        current: Option<Pubkey>,
    },
    OraclePaid {
        transmitter: Pubkey,
        payee: Pubkey,
        amount_gjuels: u64,
    },
    PayeeshipTransferRequested {
        transmitter: Pubkey,
        current: Pubkey,
        proposed: Pubkey,
    },
    PayeeshipTransferred {
        transmitter: Pubkey,
        previous: Pubkey,
        current: Pubkey,
    },
    OwnershipTransferRequested {
        from: Pubkey,
        to: Pubkey,
    },
    OwnershipTransferred {
        from: Pubkey,
        to: Pubkey,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct LogEntry {
    pub sequence: u64,
    pub block_number: u32,
    pub event: Event,
}

/// Append-only event log. Entries are never modified or removed.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn push(&mut self, block_number: u32, event: Event) -> u64 {
        let sequence = self.entries.len() as u64;
        self.entries.push(LogEntry {
            sequence,
            block_number,
            event,
        });
        sequence
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// A cursor positioned at the start of the log.
    pub fn cursor(&self) -> Cursor {
        Cursor::default()
    }
}

/// Read position into an [`EventLog`].
///
/// A cursor is just a sequence number, so a reader can persist it and resume
/// from the same place later.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    position: u64,
}

impl Cursor {
    pub fn from_sequence(sequence: u64) -> Self {
        Self { position: sequence }
    }

    /// Sequence number of the next entry this cursor will return.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns up to `limit` entries after the cursor and advances past them.
    pub fn next_batch<'a>(&mut self, log: &'a EventLog, limit: usize) -> &'a [LogEntry] {
        let len = log.entries.len();
        let start = usize::try_from(self.position).unwrap_or(len).min(len);
        let end = start.saturating_add(limit).min(len);
        let batch = &log.entries[start..end];
        self.position = end as u64;
        batch
    }
}
