//! # Domain Entities
//!
//! Chain-side shapes handed over by transports and the records the
//! pipeline derives from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::payload::EmergencyPayload;
use super::value_objects::{BlockHash, BlockchainRef, ProcessedEventKey, RemarkArg};

/// Pallet that owns the remark primitive.
pub const SYSTEM_PALLET: &str = "System";

/// Event emitted when a remark extrinsic executes.
pub const REMARKED_EVENT: &str = "Remarked";

/// Calls that attach a remark to a block.
pub const REMARK_CALLS: [&str; 2] = ["remark", "remark_with_event"];

/// New-head header delivered by a subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Block number.
    pub number: u64,
    /// Hash of this block.
    pub hash: BlockHash,
    /// Hash of the parent block.
    pub parent_hash: BlockHash,
}

/// Event as decoded by a transport backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Emitting pallet.
    pub pallet: String,
    /// Event name.
    pub name: String,
    /// Extrinsic that triggered the event (`ApplyExtrinsic` phase).
    pub extrinsic_index: Option<u32>,
    /// Account the event is attributed to.
    pub account: Option<String>,
    /// Remark argument, when the event carries one inline.
    pub remark: Option<RemarkArg>,
}

impl RawEvent {
    /// An arbitrary runtime event without inline remark content.
    pub fn new(
        pallet: &str,
        name: &str,
        extrinsic_index: Option<u32>,
        account: Option<&str>,
    ) -> Self {
        Self {
            pallet: pallet.to_string(),
            name: name.to_string(),
            extrinsic_index,
            account: account.map(str::to_string),
            remark: None,
        }
    }

    /// A `System.Remarked` event raised by extrinsic `extrinsic_index`.
    pub fn remarked(extrinsic_index: u32, account: &str, remark: Option<RemarkArg>) -> Self {
        Self {
            pallet: SYSTEM_PALLET.to_string(),
            name: REMARKED_EVENT.to_string(),
            extrinsic_index: Some(extrinsic_index),
            account: Some(account.to_string()),
            remark,
        }
    }

    /// Whether this is a `System.Remarked` event.
    pub fn is_remarked(&self) -> bool {
        self.pallet.eq_ignore_ascii_case(SYSTEM_PALLET)
            && self.name.eq_ignore_ascii_case(REMARKED_EVENT)
    }
}

/// Extrinsic as decoded by a transport backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtrinsic {
    /// Position within the block.
    pub index: u32,
    /// Pallet of the call.
    pub pallet: String,
    /// Call name.
    pub call: String,
    /// Signing account, for signed extrinsics.
    pub signer: Option<String>,
    /// Call arguments.
    pub args: Vec<RemarkArg>,
}

impl RawExtrinsic {
    /// A signed `System.remark_with_event` call.
    pub fn remark(index: u32, signer: &str, arg: RemarkArg) -> Self {
        Self {
            index,
            pallet: SYSTEM_PALLET.to_string(),
            call: REMARK_CALLS[1].to_string(),
            signer: Some(signer.to_string()),
            args: vec![arg],
        }
    }

    /// Whether this extrinsic is a `System.remark*` call.
    pub fn is_remark_call(&self) -> bool {
        self.pallet.eq_ignore_ascii_case(SYSTEM_PALLET)
            && REMARK_CALLS
                .iter()
                .any(|c| self.call.eq_ignore_ascii_case(c))
    }

    /// The remark argument of a remark call.
    pub fn remark_arg(&self) -> Option<&RemarkArg> {
        if self.is_remark_call() {
            self.args.first()
        } else {
            None
        }
    }
}

/// Full block body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockBody {
    /// Extrinsics in block order.
    pub extrinsics: Vec<RawExtrinsic>,
}

impl BlockBody {
    /// Extrinsic at `index`, if present.
    pub fn extrinsic(&self, index: u32) -> Option<&RawExtrinsic> {
        self.extrinsics.iter().find(|x| x.index == index)
    }
}

/// One block's worth of events, as pushed by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockNotification {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: BlockHash,
    /// Events emitted in the block; may be empty.
    pub events: Vec<RawEvent>,
}

/// One observed event.
///
/// `block_hash` and `block_number` are either both set or both unset;
/// [`ChainEventRecord::observe`] is the only constructor used by the
/// pipeline and takes them as a pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEventRecord {
    /// Emitting pallet.
    pub pallet: String,
    /// Event name.
    pub event_name: String,
    /// Containing block number.
    pub block_number: Option<u64>,
    /// Containing block hash.
    pub block_hash: Option<BlockHash>,
    /// Triggering extrinsic.
    pub extrinsic_index: Option<u32>,
    /// Attributed account.
    pub account_id: Option<String>,
    /// Opaque event payload.
    pub raw_payload: Option<RemarkArg>,
    /// Observation time.
    pub observed_at: DateTime<Utc>,
}

impl ChainEventRecord {
    /// Record an event observed in a (possibly unresolved) block.
    pub fn observe(
        event: &RawEvent,
        block: Option<(u64, BlockHash)>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let (block_number, block_hash) = match block {
            Some((n, h)) => (Some(n), Some(h)),
            None => (None, None),
        };
        Self {
            pallet: event.pallet.clone(),
            event_name: event.name.clone(),
            block_number,
            block_hash,
            extrinsic_index: event.extrinsic_index,
            account_id: event.account.clone(),
            raw_payload: event.remark.clone(),
            observed_at,
        }
    }

    /// Block position, when resolved.
    pub fn block(&self) -> Option<(u64, BlockHash)> {
        self.block_number.zip(self.block_hash)
    }
}

/// Remark text plus provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRemark {
    /// Decoded UTF-8 text.
    pub text: String,
    /// Account that submitted the remark.
    pub sender_account: String,
    /// Containing block hash.
    pub block_hash: BlockHash,
    /// Containing block number.
    pub block_number: u64,
    /// Position of the remark extrinsic; unknown only for events raised
    /// outside the extrinsic phase.
    pub extrinsic_index: Option<u32>,
}

impl NormalizedRemark {
    /// On-chain location of the remark, when the extrinsic is known.
    pub fn blockchain_ref(&self) -> Option<BlockchainRef> {
        self.extrinsic_index.map(|extrinsic_index| BlockchainRef {
            block_hash: self.block_hash,
            extrinsic_index,
            block_number: self.block_number,
        })
    }

    /// Dedup identity: the chain location, or the emergency id when the
    /// location is incomplete.
    pub fn dedup_key(&self, emergency_id: &str) -> ProcessedEventKey {
        match self.blockchain_ref() {
            Some(r) => ProcessedEventKey::Chain(r),
            None => ProcessedEventKey::Emergency(emergency_id.to_string()),
        }
    }
}

/// What gets written to the emergency store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyRecord {
    /// Parsed payload.
    pub payload: EmergencyPayload,
    /// On-chain location of the remark.
    pub blockchain_ref: Option<BlockchainRef>,
    /// Account that submitted the remark.
    pub sender_account: String,
}

/// Listener session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Never started.
    Idle,
    /// Establishing a transport.
    Starting,
    /// Receiving notifications.
    Listening,
    /// Stopped by the caller.
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Listening => write!(f, "listening"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Transport backend currently feeding a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// New-head subscription.
    Streaming,
    /// Interval polling of the latest block number.
    Polling,
}
