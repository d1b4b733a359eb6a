//! Detector geometry types and the geometry provider seam.
//!
//! The clustering code never owns geometry. It borrows a [`ClusterGeometry`]
//! handle for the duration of one call, so a single geometry loaded at start-up
//! can be shared by every event (and every thread) without global state.

use std::collections::HashMap;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::sync::Arc;

use crate::error::GeometryError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cartesian position in geometry length units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).magnitude()
    }

    /// Returns true if all components are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Calorimeter the hits and clusters belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetectorType {
    /// Central ball calorimeter.
    CrystalBall,
    /// Forward wall calorimeter.
    Taps,
    /// Any other clustering detector, identified by a user-chosen number.
    Other(u16),
}

/// One detector element (crystal) as described by the static geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Element {
    /// Channel id, unique within one detector.
    pub channel: u32,
    /// Centre of the crystal.
    pub position: Vec3,
    /// Channel ids of geometrically adjacent elements.
    pub neighbours: Vec<u32>,
    /// Characteristic lateral shower spread for this crystal's material.
    pub moliere_radius: f64,
    /// Element borders a gap in the detector acceptance.
    #[cfg_attr(feature = "serde", serde(default))]
    pub touches_hole: bool,
}

impl Element {
    /// Creates an element without neighbours.
    #[must_use]
    pub fn new(channel: u32, position: Vec3, moliere_radius: f64) -> Self {
        Self {
            channel,
            position,
            neighbours: Vec::new(),
            moliere_radius,
            touches_hole: false,
        }
    }

    /// Sets the neighbour list.
    #[must_use]
    pub fn with_neighbours(mut self, neighbours: Vec<u32>) -> Self {
        self.neighbours = neighbours;
        self
    }

    /// Marks the element as bordering a hole.
    #[must_use]
    pub fn with_touches_hole(mut self, touches_hole: bool) -> Self {
        self.touches_hole = touches_hole;
        self
    }

    /// Returns true if `channel` is listed as a neighbour.
    #[inline]
    #[must_use]
    pub fn is_neighbour(&self, channel: u32) -> bool {
        self.neighbours.contains(&channel)
    }
}

/// Read-only geometry provider for one clustering detector.
///
/// Implementations must be cheap to query; the clustering looks up every hit's
/// element once per event.
pub trait ClusterGeometry: Send + Sync {
    /// Detector these elements belong to.
    fn detector_type(&self) -> DetectorType;

    /// Looks up the element for a channel.
    fn element(&self, channel: u32) -> Option<&Element>;
}

impl<G: ClusterGeometry + ?Sized> ClusterGeometry for &G {
    fn detector_type(&self) -> DetectorType {
        (**self).detector_type()
    }

    fn element(&self, channel: u32) -> Option<&Element> {
        (**self).element(channel)
    }
}

impl<G: ClusterGeometry + ?Sized> ClusterGeometry for Arc<G> {
    fn detector_type(&self) -> DetectorType {
        (**self).detector_type()
    }

    fn element(&self, channel: u32) -> Option<&Element> {
        (**self).element(channel)
    }
}

/// Serializable form of a [`StaticGeometry`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometryDescription {
    /// Detector type.
    pub detector_type: DetectorType,
    /// All elements of the detector.
    pub elements: Vec<Element>,
}

/// In-memory geometry backed by a vector of elements and a channel index.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "GeometryDescription", into = "GeometryDescription")
)]
pub struct StaticGeometry {
    detector_type: DetectorType,
    elements: Vec<Element>,
    index: HashMap<u32, usize>,
}

impl StaticGeometry {
    /// Builds a geometry, validating channels, radii, positions and self-references.
    ///
    /// Neighbour ids that are not part of the geometry are accepted; they simply
    /// never match a hit. Use [`StaticGeometry::new_strict`] to reject them.
    ///
    /// # Errors
    /// Returns a [`GeometryError`] describing the first invalid element.
    pub fn new(detector_type: DetectorType, elements: Vec<Element>) -> Result<Self, GeometryError> {
        let mut index = HashMap::with_capacity(elements.len());
        for (i, element) in elements.iter().enumerate() {
            if index.insert(element.channel, i).is_some() {
                return Err(GeometryError::DuplicateChannel(element.channel));
            }
            if !(element.moliere_radius.is_finite() && element.moliere_radius > 0.0) {
                return Err(GeometryError::InvalidMoliereRadius {
                    channel: element.channel,
                    radius: element.moliere_radius,
                });
            }
            if !element.position.is_finite() {
                return Err(GeometryError::NonFinitePosition(element.channel));
            }
            if element.is_neighbour(element.channel) {
                return Err(GeometryError::SelfNeighbour(element.channel));
            }
        }

        Ok(Self {
            detector_type,
            elements,
            index,
        })
    }

    /// Like [`StaticGeometry::new`], but also rejects unknown neighbour ids.
    ///
    /// # Errors
    /// Returns a [`GeometryError`] describing the first invalid element.
    pub fn new_strict(
        detector_type: DetectorType,
        elements: Vec<Element>,
    ) -> Result<Self, GeometryError> {
        let geometry = Self::new(detector_type, elements)?;
        for element in &geometry.elements {
            if let Some(&neighbour) = element
                .neighbours
                .iter()
                .find(|n| !geometry.index.contains_key(n))
            {
                return Err(GeometryError::UnknownNeighbour {
                    channel: element.channel,
                    neighbour,
                });
            }
        }
        Ok(geometry)
    }

    /// Builds a flat `nx` x `ny` grid of crystals in the z = 0 plane with
    /// 8-connectivity.
    ///
    /// Channel ids are `iy * nx + ix`; positions are `(ix * pitch, iy * pitch, 0)`.
    ///
    /// # Errors
    /// Returns an error if `nx * ny` channel ids do not fit in a `u32`, if
    /// `moliere_radius` is not positive or if `pitch` is not finite.
    #[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
    pub fn square_grid(
        detector_type: DetectorType,
        nx: u32,
        ny: u32,
        pitch: f64,
        moliere_radius: f64,
    ) -> Result<Self, GeometryError> {
        // Every channel id is below the element count once that fits
        let count = nx
            .checked_mul(ny)
            .ok_or(GeometryError::GridTooLarge { nx, ny })?;
        let mut elements = Vec::with_capacity(count as usize);
        for iy in 0..ny {
            for ix in 0..nx {
                let mut neighbours = Vec::with_capacity(8);
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let (x, y) = (ix as i64 + dx, iy as i64 + dy);
                        if x < 0 || y < 0 || x >= nx as i64 || y >= ny as i64 {
                            continue;
                        }
                        neighbours.push((y * nx as i64 + x) as u32);
                    }
                }
                let position = Vec3::new(ix as f64 * pitch, iy as f64 * pitch, 0.0);
                elements.push(
                    Element::new(iy * nx + ix, position, moliere_radius)
                        .with_neighbours(neighbours),
                );
            }
        }
        Self::new(detector_type, elements)
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the geometry has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates over all elements in description order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }
}

impl ClusterGeometry for StaticGeometry {
    fn detector_type(&self) -> DetectorType {
        self.detector_type
    }

    fn element(&self, channel: u32) -> Option<&Element> {
        self.index.get(&channel).map(|&i| &self.elements[i])
    }
}

impl TryFrom<GeometryDescription> for StaticGeometry {
    type Error = GeometryError;

    fn try_from(description: GeometryDescription) -> Result<Self, Self::Error> {
        Self::new(description.detector_type, description.elements)
    }
}

impl From<StaticGeometry> for GeometryDescription {
    fn from(geometry: StaticGeometry) -> Self {
        Self {
            detector_type: geometry.detector_type,
            elements: geometry.elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vec3_distance() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 6.0, 3.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!((b - a).magnitude(), 5.0);
        assert_eq!(a + b, Vec3::new(5.0, 8.0, 6.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_square_grid_neighbours() {
        let geometry = StaticGeometry::square_grid(DetectorType::Taps, 3, 3, 1.0, 2.0).unwrap();
        assert_eq!(geometry.len(), 9);

        // Centre crystal touches all others
        let centre = geometry.element(4).unwrap();
        assert_eq!(centre.neighbours.len(), 8);

        // Corner crystal has three neighbours
        let corner = geometry.element(0).unwrap();
        assert_eq!(corner.neighbours, vec![1, 3, 4]);
        assert_eq!(corner.position, Vec3::ZERO);

        assert!(corner.is_neighbour(4) && centre.is_neighbour(0));
        assert!(!corner.is_neighbour(8));
    }

    #[test]
    fn test_square_grid_too_large() {
        let err =
            StaticGeometry::square_grid(DetectorType::Taps, u32::MAX, 2, 1.0, 1.0).unwrap_err();
        assert_eq!(err, GeometryError::GridTooLarge { nx: u32::MAX, ny: 2 });

        // Largest channel id still fits
        let strip = StaticGeometry::square_grid(DetectorType::Taps, 1, 3, 1.0, 1.0).unwrap();
        assert!(strip.element(2).is_some());
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let elements = vec![
            Element::new(7, Vec3::ZERO, 1.0),
            Element::new(7, Vec3::new(1.0, 0.0, 0.0), 1.0),
        ];
        let err = StaticGeometry::new(DetectorType::CrystalBall, elements).unwrap_err();
        assert_eq!(err, GeometryError::DuplicateChannel(7));
    }

    #[test]
    fn test_invalid_moliere_radius_rejected() {
        let elements = vec![Element::new(1, Vec3::ZERO, 0.0)];
        let err = StaticGeometry::new(DetectorType::CrystalBall, elements).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::InvalidMoliereRadius { channel: 1, .. }
        ));
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let elements = vec![Element::new(3, Vec3::new(f64::NAN, 0.0, 0.0), 1.0)];
        let err = StaticGeometry::new(DetectorType::CrystalBall, elements).unwrap_err();
        assert_eq!(err, GeometryError::NonFinitePosition(3));
    }

    #[test]
    fn test_self_neighbour_rejected() {
        let elements = vec![Element::new(2, Vec3::ZERO, 1.0).with_neighbours(vec![2])];
        let err = StaticGeometry::new(DetectorType::CrystalBall, elements).unwrap_err();
        assert_eq!(err, GeometryError::SelfNeighbour(2));
    }

    #[test]
    fn test_unknown_neighbour_only_rejected_in_strict_mode() {
        let elements = vec![
            Element::new(1, Vec3::ZERO, 1.0).with_neighbours(vec![2, 99]),
            Element::new(2, Vec3::new(1.0, 0.0, 0.0), 1.0).with_neighbours(vec![1]),
        ];
        assert!(StaticGeometry::new(DetectorType::Taps, elements.clone()).is_ok());

        let err = StaticGeometry::new_strict(DetectorType::Taps, elements).unwrap_err();
        assert_eq!(
            err,
            GeometryError::UnknownNeighbour {
                channel: 1,
                neighbour: 99
            }
        );
    }

    #[test]
    fn test_geometry_through_reference_and_arc() {
        let geometry = StaticGeometry::square_grid(DetectorType::Taps, 2, 2, 1.0, 1.0).unwrap();
        let shared = Arc::new(geometry);
        fn lookup<G: ClusterGeometry>(g: G) -> Option<u32> {
            g.element(3).map(|e| e.channel)
        }
        assert_eq!(lookup(&*shared), Some(3));
        assert_eq!(lookup(Arc::clone(&shared)), Some(3));
        assert_eq!(shared.detector_type(), DetectorType::Taps);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_geometry_from_json() {
        let json = r#"{
            "detector_type": "CrystalBall",
            "elements": [
                {"channel": 0, "position": {"x": 0.0, "y": 0.0, "z": 0.0},
                 "neighbours": [1], "moliere_radius": 4.8},
                {"channel": 1, "position": {"x": 5.0, "y": 0.0, "z": 0.0},
                 "neighbours": [0], "moliere_radius": 4.8, "touches_hole": true}
            ]
        }"#;
        let geometry: StaticGeometry = serde_json::from_str(json).unwrap();
        assert_eq!(geometry.len(), 2);
        assert!(geometry.element(1).unwrap().touches_hole);
        assert!(!geometry.element(0).unwrap().touches_hole);

        let invalid = json.replace("4.8, \"touches_hole\"", "-1.0, \"touches_hole\"");
        assert!(serde_json::from_str::<StaticGeometry>(&invalid).is_err());
    }
}
