//! Output cluster records.

use std::ops::BitOr;

use crate::geometry::{DetectorType, Vec3};
use crate::hit::HitIndex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bit set of cluster properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterFlags(u8);

impl ClusterFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Cluster was produced by splitting a connected group of crystals.
    pub const SPLIT: Self = Self(1);
    /// Central element borders a hole in the acceptance.
    pub const TOUCHES_HOLE_CENTRAL: Self = Self(1 << 1);
    /// At least one constituent borders a hole in the acceptance.
    pub const TOUCHES_HOLE_CRYSTAL: Self = Self(1 << 2);

    /// Returns true if all flags in `other` are set.
    #[inline]
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets or clears the flags in `other`.
    #[inline]
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for ClusterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One hit's contribution to a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Constituent {
    /// Index of the originating hit in the event's hit slice.
    pub hit: HitIndex,
    /// Channel of the originating hit.
    pub channel: u32,
    /// Effective energy assigned to this cluster.
    pub energy: f64,
    /// Share of the hit's energy assigned to this cluster (1.0 unless shared).
    pub fraction: f64,
    /// Time of the originating hit.
    pub time: f64,
}

impl Constituent {
    /// Returns true if the hit's energy was divided between several clusters.
    #[inline]
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.fraction < 1.0
    }
}

/// A reconstructed shower.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Log-energy weighted position.
    pub position: Vec3,
    /// Sum of constituent energies.
    pub energy: f64,
    /// Time of the central element's hit.
    pub time: f64,
    /// Detector the cluster was found in.
    pub detector: DetectorType,
    /// Channel of the highest-energy constituent.
    pub central_element: u32,
    /// Cluster properties.
    pub flags: ClusterFlags,
    /// Constituents sorted by decreasing effective energy.
    pub hits: Vec<Constituent>,
}

impl Cluster {
    /// Number of constituents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the cluster has no constituents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns true if the cluster came out of bump splitting.
    #[must_use]
    pub fn is_split(&self) -> bool {
        self.flags.contains(ClusterFlags::SPLIT)
    }

    /// Iterates over the constituents.
    pub fn iter(&self) -> impl Iterator<Item = &Constituent> {
        self.hits.iter()
    }

    /// Looks up the constituent for a channel.
    #[must_use]
    pub fn constituent(&self, channel: u32) -> Option<&Constituent> {
        self.hits.iter().find(|c| c.channel == channel)
    }
}
