use crate::algorithms::{coarsening::CoarseningFunctor, refinement::RefinementFunctor};
use crate::storage::HashGridStorage;

///
/// Scores a point by the absolute value of its hierarchical surplus.
/// `alpha` is indexed by sequence number and must cover the whole storage.
///
pub struct SurplusRefinementFunctor<'a>
{
    alpha: &'a [f64],
    refinements_num: usize,
    threshold: f64,
}

impl<'a> SurplusRefinementFunctor<'a>
{
    pub fn new(alpha: &'a [f64], refinements_num: usize, threshold: f64) -> Self
    {
        Self { alpha, refinements_num, threshold }
    }
}

impl RefinementFunctor for SurplusRefinementFunctor<'_>
{
    #[inline]
    fn eval(&self, _storage: &HashGridStorage, seq: usize) -> f64 {
        self.alpha[seq].abs()
    }

    fn refinements_num(&self) -> usize {
        self.refinements_num
    }

    fn refinement_threshold(&self) -> f64 {
        self.threshold
    }
}

///
/// Removes the points with the smallest absolute surplus.
///
pub struct SurplusCoarseningFunctor<'a>
{
    alpha: &'a [f64],
    removements_num: usize,
    threshold: f64,
}

impl<'a> SurplusCoarseningFunctor<'a>
{
    pub fn new(alpha: &'a [f64], removements_num: usize, threshold: f64) -> Self
    {
        Self { alpha, removements_num, threshold }
    }
}

impl CoarseningFunctor for SurplusCoarseningFunctor<'_>
{
    #[inline]
    fn eval(&self, _storage: &HashGridStorage, seq: usize) -> f64 {
        self.alpha[seq].abs()
    }

    fn removements_num(&self) -> usize {
        self.removements_num
    }

    fn coarsening_threshold(&self) -> f64 {
        self.threshold
    }
}

#[test]
fn test_surplus_scores_are_absolute()
{
    let storage = HashGridStorage::new(1);
    let alpha = [-2.0, 0.5];
    let refine = SurplusRefinementFunctor::new(&alpha, 4, 0.1);
    assert_eq!(refine.eval(&storage, 0), 2.0);
    assert_eq!(refine.refinements_num(), 4);
    assert_eq!(refine.start(), 0.0);
    let coarsen = SurplusCoarseningFunctor::new(&alpha, 1, 1.0);
    assert_eq!(coarsen.eval(&storage, 1), 0.5);
    assert_eq!(coarsen.coarsening_threshold(), 1.0);
    assert_eq!(coarsen.start(), f64::MAX);
}
