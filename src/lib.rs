//!
//! Adaptive hierarchical sparse grid point storage.
//!
//! Points are keyed by one (level, index) pair per dimension and addressed
//! by dense sequence numbers, so coefficient vectors can be kept alongside
//! the storage. Generators build regular, full and boundary grids; the
//! refinement and coarsening algorithms adapt them driven by scoring
//! functors.
//!
pub mod algorithms;
pub mod errors;
pub mod generators;
pub mod grids;
pub mod iterators;
pub mod level_index;
pub mod refinement;
pub mod serialization;
pub mod storage;

pub use algorithms::coarsening::{CoarseningFunctor, CoarseningResult, HashCoarsening};
pub use algorithms::prewavelet::PrewaveletGridGenerator;
pub use algorithms::refinement::{HashRefinement, RefinementFunctor};
pub use errors::SGError;
pub use generators::HashGenerator;
pub use grids::grid::{Grid, GridConfig, GridType};
pub use serialization::SerializationFormat;
pub use storage::{BoundingBox, GridPoint, HashGridStorage};
