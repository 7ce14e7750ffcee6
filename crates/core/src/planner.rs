//! Partitioning of id lists into request batches.

use std::time::Duration;

use crate::models::AppId;

/// Planned batch with its position in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position in the plan.
    pub index: usize,
    /// Ids submitted together in one request.
    pub ids: Vec<AppId>,
}

impl Batch {
    /// Start offset under a per-index stagger.
    pub fn start_offset(&self, stagger: Duration) -> Duration {
        stagger.saturating_mul(u32::try_from(self.index).unwrap_or(u32::MAX))
    }
}

/// Stateless batch planner.
pub struct BatchPlanner;

impl BatchPlanner {
    /// Split `ids` into consecutive batches of at most `batch_size` ids.
    ///
    /// Order is preserved and every id appears exactly once. A `batch_size`
    /// of zero is treated as one.
    pub fn plan(ids: &[AppId], batch_size: usize) -> Vec<Batch> {
        ids.chunks(batch_size.max(1))
            .enumerate()
            .map(|(index, chunk)| Batch {
                index,
                ids: chunk.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_plan(len: usize, batch_size: usize) {
        let ids: Vec<AppId> = (1..=len as AppId).collect();
        let batches = BatchPlanner::plan(&ids, batch_size);

        assert_eq!(batches.len(), len.div_ceil(batch_size), "len={len} size={batch_size}");
        assert!(batches.iter().all(|b| !b.ids.is_empty() && b.ids.len() <= batch_size));
        assert!(batches.iter().enumerate().all(|(i, b)| b.index == i));

        let flattened: Vec<AppId> = batches.into_iter().flat_map(|b| b.ids).collect();
        assert_eq!(flattened, ids);
    }

    #[test]
    fn batches_cover_ids_in_order() {
        for len in [0, 1, 2, 5, 19, 20, 21, 300] {
            for batch_size in [1, 2, 3, 20] {
                check_plan(len, batch_size);
            }
        }
    }

    #[test]
    fn zero_batch_size_falls_back_to_one() {
        let batches = BatchPlanner::plan(&[1, 2, 3], 0);
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn stagger_scales_with_index() {
        let batches = BatchPlanner::plan(&[1, 2, 3, 4, 5], 2);
        let stagger = Duration::from_millis(100);
        let offsets: Vec<_> = batches.iter().map(|b| b.start_offset(stagger)).collect();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200)
            ]
        );
    }
}
