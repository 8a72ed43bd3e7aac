//! Cut-till limits: reference-counted LSN watermarks.

use crate::error::{CoreError, CoreResult};
use crate::types::Lsn;
use std::collections::BTreeMap;

/// Multiset of LSNs that must stay readable.
///
/// Each registration of the same LSN bumps its count; removal decrements and
/// forgets the LSN at zero. The smallest registered LSN bounds how far the
/// log may be cut.
#[derive(Debug, Default, Clone)]
pub(crate) struct CutTillLimits {
    limits: BTreeMap<Lsn, usize>,
}

impl CutTillLimits {
    pub(crate) fn add(&mut self, lsn: Lsn) {
        *self.limits.entry(lsn).or_insert(0) += 1;
    }

    pub(crate) fn remove(&mut self, lsn: Lsn) -> CoreResult<()> {
        let Some(count) = self.limits.get_mut(&lsn) else {
            return Err(CoreError::invalid_operation(format!(
                "no cut-till limit registered at {lsn}"
            )));
        };
        *count -= 1;
        if *count == 0 {
            self.limits.remove(&lsn);
        }
        Ok(())
    }

    pub(crate) fn min(&self) -> Option<Lsn> {
        self.limits.keys().next().copied()
    }

    /// Lowest segment that may survive a cut requested below `segment`.
    pub(crate) fn floor(&self, segment: u64, active_segment: u64) -> u64 {
        let mut floor = segment.min(active_segment);
        if let Some(limit) = self.min() {
            floor = floor.min(limit.segment());
        }
        floor
    }
}
