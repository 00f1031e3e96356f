use std::fmt::{Display, Formatter};
use std::ops::Range;

/// Path-cost formula used by the forest growth pass.
///
/// All formulas take the maximum of the running path cost and an arc term
/// built from the Euclidean distance between the tree's mean color and the
/// candidate pixel's color. Functions 2-6 additionally weight the arc term
/// by the candidate's gradient and the tree's gradient coefficient of
/// variation, with different normalizations.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PathCostFunction {
    /// `max(cost, arc)` - dynamic color distance, no gradient term.
    ColorDistance = 1,
    /// `max(cost, arc * grad^(1/alpha) / beta)`, `beta = max(1, alpha*c2, cv)`.
    GradientCost = 2,
    /// `max(cost, arc + grad^(1/alpha) / beta)`, same beta as `GradientCost`.
    SumGradientCost = 3,
    /// Like `GradientCost` with `beta = max(1, alpha*c2, cv / tree_size)`.
    CvTreeNorm = 4,
    /// Like `GradientCost` with `beta = max(1, alpha*c2, cv) / tree_size`.
    BetaNorm = 5,
    /// Like `SumGradientCost` with the `BetaNorm` beta.
    SumBetaNorm = 6,
}

impl TryFrom<u8> for PathCostFunction {
    type Error = Error;

    fn try_from(id: u8) -> Result<Self> {
        match id {
            1 => Ok(PathCostFunction::ColorDistance),
            2 => Ok(PathCostFunction::GradientCost),
            3 => Ok(PathCostFunction::SumGradientCost),
            4 => Ok(PathCostFunction::CvTreeNorm),
            5 => Ok(PathCostFunction::BetaNorm),
            6 => Ok(PathCostFunction::SumBetaNorm),
            _ => Err(Error::InvalidCostFunction(id)),
        }
    }
}

/// Main config for a segmentation run.
///
/// `num_grid_seeds` is the requested amount of grid-sampled seeds (`n0`);
/// the effective amount depends on the scribbles and the relocation
/// heuristic. `num_superpixels` (`nf`) only drives the relevance mode, and
/// `iterations` only the class mode.
#[derive(Clone, Debug)]
pub struct Config {
    /// Requested amount of grid seeds (>= 0).
    pub num_grid_seeds: usize,
    /// Final superpixel count the relevance mode converges to.
    pub num_superpixels: usize,
    /// Maximum amount of growth passes in class mode (>= 1).
    pub iterations: usize,
    /// Path-cost formula for the growth pass.
    pub path_cost: PathCostFunction,
    /// If true, the border mask gets every inter-tree border; otherwise only
    /// borders between differing output classes.
    pub all_borders: bool,
    /// Shift grid seeds to their lowest-gradient neighbor. On by default;
    /// turning it off places seeds exactly on the stride lattice.
    pub relocate_seeds: bool,
    /// Parameter of cost functions 2-6, interval (0, 1]. Non-positive values
    /// fall back to 0.7.
    pub c1: f64,
    /// Parameter of cost functions 2-6, interval (0, 1]. Non-positive values
    /// fall back to 0.8.
    pub c2: f64,
    /// How many of the leading markers are foreground ("object") scribbles.
    pub obj_markers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_grid_seeds: 8000,
            num_superpixels: 2,
            iterations: 5,
            path_cost: PathCostFunction::ColorDistance,
            all_borders: false,
            relocate_seeds: true,
            c1: 0.7,
            c2: 0.8,
            obj_markers: 1,
        }
    }
}

impl Config {
    /// Effective c1/c2 with the documented fallbacks applied.
    pub(crate) fn cost_params(&self) -> (f64, f64) {
        let c1 = if self.c1 <= 0.0 { 0.7 } else { self.c1 };
        let c2 = if self.c2 <= 0.0 { 0.8 } else { self.c2 };
        (c1, c2)
    }
}

/// Fatal error conditions. Any of these aborts the whole run; there are no
/// partial results.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// A sample value exceeded the 16-bit range.
    UnsupportedSampleDepth(u32),
    /// Cost function id outside 1..=6.
    InvalidCostFunction(u8),
    /// Class mode needs `iterations >= 1`.
    InvalidIterations,
    /// Class mode needs at least one marker.
    NoMarkers,
    /// The requested grid is denser than one seed per pixel pair.
    SeedsTooDense,
    /// Priority queue capacity exhausted.
    QueueFull,
    /// Pixel buffer length does not match rows * cols * channels.
    DimensionMismatch,
    /// Malformed scribble text.
    MarkerFormat(String),
    /// A scribble coordinate fell outside the image.
    MarkerOutOfBounds { x: i32, y: i32 },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnsupportedSampleDepth(v) => {
                write!(f, "sample value {v} exceeds 16-bit range")
            }
            Error::InvalidCostFunction(id) => {
                write!(f, "path-cost function id {id} is not in 1..=6")
            }
            Error::InvalidIterations => write!(f, "iterations must be at least 1"),
            Error::NoMarkers => write!(f, "class mode needs at least one marker"),
            Error::SeedsTooDense => write!(f, "the number of grid seeds is too high"),
            Error::QueueFull => write!(f, "priority queue is full"),
            Error::DimensionMismatch => write!(f, "pixel buffer size mismatch"),
            Error::MarkerFormat(what) => write!(f, "invalid scribble file: {what}"),
            Error::MarkerOutOfBounds { x, y } => {
                write!(f, "scribble coordinate ({x}; {y}) is outside the image")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn split_length_to_ranges(length: usize, splits: usize) -> Vec<Range<usize>> {
    let chunk_size = length / splits;
    let rem = length % splits;
    (0..splits)
        .scan((rem, 0usize), |(r, acc), _split| {
            let mut size = chunk_size;
            if *r > 0 {
                *r -= 1;
                size += 1;
            }
            let out = (*acc, *acc + size);
            *acc += size;
            Some(out.0..out.1)
        })
        .collect()
}
