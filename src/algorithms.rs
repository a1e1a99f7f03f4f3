pub mod coarsening;
pub mod prewavelet;
pub mod refinement;
