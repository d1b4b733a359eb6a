//! Error types for calopix-core.

use thiserror::Error;

/// Result type alias for calopix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for calopix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry description error.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Clustering configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while validating a detector geometry description.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Two elements share a channel id.
    #[error("duplicate channel {0}")]
    DuplicateChannel(u32),

    /// Moliere radius is zero, negative or not finite.
    #[error("invalid Moliere radius {radius} for channel {channel}")]
    InvalidMoliereRadius { channel: u32, radius: f64 },

    /// Element position has a non-finite component.
    #[error("non-finite position for channel {0}")]
    NonFinitePosition(u32),

    /// Element lists itself among its neighbours.
    #[error("channel {0} lists itself as a neighbour")]
    SelfNeighbour(u32),

    /// Element lists a neighbour channel that is not part of the geometry.
    #[error("channel {channel} lists unknown neighbour {neighbour}")]
    UnknownNeighbour { channel: u32, neighbour: u32 },

    /// Grid has more crystals than there are channel ids.
    #[error("{nx} x {ny} grid exceeds the channel id range")]
    GridTooLarge { nx: u32, ny: u32 },
}

/// Errors raised by [`ClusteringConfig::validate`](crate::ClusteringConfig::validate).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Position convergence epsilon must be positive and finite.
    #[error("position epsilon must be positive and finite, got {0}")]
    InvalidEpsilon(f64),

    /// The convergence loop needs at least one round.
    #[error("maximum iterations must be at least 1")]
    InvalidIterations,

    /// Moliere decay factor must be positive and finite.
    #[error("Moliere decay factor must be positive and finite, got {0}")]
    InvalidDecay(f64),

    /// Energy weight offset must be finite.
    #[error("energy weight offset must be finite, got {0}")]
    InvalidWeightOffset(f64),
}
