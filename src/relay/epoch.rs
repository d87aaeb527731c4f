//! Difficulty-epoch classification of header batches.

use alloy::primitives::Bytes;

use crate::bitcoin::{Header, RETARGET_INTERVAL};

/// How a batch must be submitted to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchPlan {
    /// Entirely within one epoch.
    Ordinary(Vec<Header>),
    /// Starts exactly on an epoch boundary.
    Retarget(Vec<Header>),
    /// Crosses a boundary: the tail of the old epoch, then the head of
    /// the new one.
    Split {
        pre_change: Vec<Header>,
        post_change: Vec<Header>,
    },
}

/// Classify a contiguous, ascending batch. `None` for an empty batch.
pub fn classify(batch: Vec<Header>) -> Option<BatchPlan> {
    let first = batch.first()?.epoch_offset();
    let last = batch.last()?.epoch_offset();

    let plan = if first == 0 {
        BatchPlan::Retarget(batch)
    } else if first > last {
        let (pre_change, post_change) = batch.into_iter().partition(|h| h.epoch_offset() >= first);
        BatchPlan::Split {
            pre_change,
            post_change,
        }
    } else {
        BatchPlan::Ordinary(batch)
    };
    Some(plan)
}

/// Heights of the first and last header of the epoch before the one that
/// begins at `boundary`. `None` if there is no previous epoch.
pub fn previous_epoch_bounds(boundary: u64) -> Option<(u64, u64)> {
    let start = boundary.checked_sub(RETARGET_INTERVAL)?;
    Some((start, start + RETARGET_INTERVAL - 1))
}

/// Concatenate the serialized headers in order.
pub fn concat_raw(headers: &[Header]) -> Bytes {
    headers
        .iter()
        .flat_map(|h| h.raw.iter().copied())
        .collect::<Vec<u8>>()
        .into()
}
