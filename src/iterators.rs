pub mod grid_iterator;
pub mod subspace_iterator;
