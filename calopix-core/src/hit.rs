//! Calibrated calorimeter hit records.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position of a hit inside the per-event hit slice handed to the clustering.
///
/// Crystals and output clusters refer back to their hit through this index
/// instead of holding a reference, so clusters can outlive the borrow of the
/// input slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitIndex(pub usize);

impl HitIndex {
    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// One calibrated hit in a clustering detector.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterHit {
    /// Detector channel (element) id.
    pub channel: u32,
    /// Deposited energy. `NaN` means the readout carried no energy information.
    pub energy: f64,
    /// Hit time. Carried through to the output, never interpreted.
    pub time: f64,
}

impl ClusterHit {
    /// Creates a new hit.
    #[inline]
    #[must_use]
    pub fn new(channel: u32, energy: f64, time: f64) -> Self {
        Self {
            channel,
            energy,
            time,
        }
    }

    /// Creates a hit that only carries timing information.
    #[inline]
    #[must_use]
    pub fn without_energy(channel: u32, time: f64) -> Self {
        Self::new(channel, f64::NAN, time)
    }

    /// Returns true if the hit has a single, usable energy value.
    ///
    /// Only such hits take part in clustering.
    #[inline]
    #[must_use]
    pub fn has_energy(&self) -> bool {
        self.energy.is_finite() && self.energy >= 0.0
    }
}
