//! Crystal working unit and the shared weighting functions.

use calopix_core::geometry::{Element, Vec3};
use calopix_core::hit::HitIndex;

/// One hit paired with its geometry element for the duration of an event.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Crystal<'g> {
    /// Effective energy (attenuated when shared between bumps).
    pub energy: f64,
    /// Share of the originating hit's energy carried by this copy.
    pub fraction: f64,
    pub element: &'g Element,
    pub hit: HitIndex,
}

impl<'g> Crystal<'g> {
    pub fn new(energy: f64, element: &'g Element, hit: HitIndex) -> Self {
        Self {
            energy,
            fraction: 1.0,
            element,
            hit,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.element.position
    }

    #[inline]
    pub fn channel(&self) -> u32 {
        self.element.channel
    }

    /// Copy of this crystal carrying `share` of its energy.
    pub fn attenuated(&self, energy: f64, share: f64) -> Self {
        Self {
            energy,
            fraction: self.fraction * share,
            ..*self
        }
    }
}

/// Sorts by decreasing energy. Equal energies keep their relative order.
pub(crate) fn sort_by_energy(crystals: &mut [Crystal<'_>]) {
    crystals.sort_by(|a, b| b.energy.total_cmp(&a.energy));
}

pub(crate) fn total_energy(crystals: &[Crystal<'_>]) -> f64 {
    crystals.iter().map(|c| c.energy).sum()
}

/// Soft log-energy position weight `max(0, offset + ln(energy / total))`.
///
/// Crystals below `exp(-offset)` of the total get no weight at all.
#[inline]
pub(crate) fn energy_weight(energy: f64, total: f64, offset: f64) -> f64 {
    let w = offset + (energy / total).ln();
    // NaN (0/0) and -inf (ln 0) both end up at zero here
    if w > 0.0 {
        w
    } else {
        0.0
    }
}

/// Accumulates a log-energy weighted centroid.
///
/// Falls back to the plain energy-weighted centroid when every log weight is
/// zero, and to the arithmetic mean when all energies are zero.
pub(crate) struct CentroidAccumulator {
    total: f64,
    offset: f64,
    log_sum: Vec3,
    log_weight: f64,
    energy_sum: Vec3,
    energy_weight: f64,
    plain_sum: Vec3,
    count: usize,
}

impl CentroidAccumulator {
    pub fn new(total: f64, offset: f64) -> Self {
        Self {
            total,
            offset,
            log_sum: Vec3::ZERO,
            log_weight: 0.0,
            energy_sum: Vec3::ZERO,
            energy_weight: 0.0,
            plain_sum: Vec3::ZERO,
            count: 0,
        }
    }

    pub fn add(&mut self, position: Vec3, energy: f64) {
        let w = energy_weight(energy, self.total, self.offset);
        self.log_sum += position * w;
        self.log_weight += w;
        self.energy_sum += position * energy;
        self.energy_weight += energy;
        self.plain_sum += position;
        self.count += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn finish(self) -> Vec3 {
        if self.log_weight > 0.0 {
            self.log_sum * (1.0 / self.log_weight)
        } else if self.energy_weight > 0.0 {
            self.energy_sum * (1.0 / self.energy_weight)
        } else if self.count > 0 {
            self.plain_sum * (1.0 / self.count as f64)
        } else {
            Vec3::ZERO
        }
    }
}
