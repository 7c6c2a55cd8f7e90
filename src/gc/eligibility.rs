//! Chain eligibility policies.
//!
//! The reclaimer only trims chains that represent a settled leader-successor
//! sequence. What counts as settled is policy, injected through
//! [`ChainEligibility`].

use crate::models::{GenerationRecord, QueueMappingDetail, leader};

/// Decides whether a chain may have its oldest generation reclaimed.
pub trait ChainEligibility: Send + Sync {
    /// Returns `true` if `chain`, hosted in `detail`, is eligible.
    fn is_eligible(&self, chain: &[GenerationRecord], detail: &QueueMappingDetail) -> bool;
}

/// A chain is eligible when this broker hosts its leader.
///
/// Only the leader's broker has authority over the chain's history; a chain
/// whose tail points elsewhere is left to the stale-leader reconciler.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaderTailPolicy;

impl ChainEligibility for LeaderTailPolicy {
    fn is_eligible(&self, chain: &[GenerationRecord], detail: &QueueMappingDetail) -> bool {
        leader(chain).is_some_and(|record| record.bname == detail.bname)
    }
}

/// Stricter policy: the leader is local, generations strictly increase and
/// every record before the leader has been sealed with an end offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedHistoryPolicy;

impl ChainEligibility for SealedHistoryPolicy {
    fn is_eligible(&self, chain: &[GenerationRecord], detail: &QueueMappingDetail) -> bool {
        if !LeaderTailPolicy.is_eligible(chain, detail) {
            return false;
        }
        let ordered = chain
            .windows(2)
            .all(|pair| pair[0].generation < pair[1].generation);
        let sealed = chain[..chain.len() - 1]
            .iter()
            .all(|record| !record.is_open());
        ordered && sealed
    }
}
