use crate::algorithms::{coarsening::CoarseningFunctor, refinement::RefinementFunctor};
use crate::storage::HashGridStorage;

///
/// Refinement driven by a caller supplied scoring function.
///
/// # Arguments
/// - `fun_eval`: score of the point stored at a sequence number.
/// - `refinements_num`: maximum number of points refined per call.
/// - `threshold`: minimum absolute score of a refined point.
///
pub struct UserDefinedRefinementFunctor<F>
where F: Fn(&HashGridStorage, usize) -> f64 + Send + Sync
{
    pub fun_eval: F,
    pub refinements_num: usize,
    pub threshold: f64,
    pub start: f64,
}

impl<F> UserDefinedRefinementFunctor<F>
where F: Fn(&HashGridStorage, usize) -> f64 + Send + Sync
{
    pub fn new(fun_eval: F, refinements_num: usize, threshold: f64) -> Self
    {
        Self { fun_eval, refinements_num, threshold, start: 0.0 }
    }
}

impl<F> RefinementFunctor for UserDefinedRefinementFunctor<F>
where F: Fn(&HashGridStorage, usize) -> f64 + Send + Sync
{
    fn eval(&self, storage: &HashGridStorage, seq: usize) -> f64 {
        (self.fun_eval)(storage, seq)
    }

    fn refinements_num(&self) -> usize {
        self.refinements_num
    }

    fn refinement_threshold(&self) -> f64 {
        self.threshold
    }

    fn start(&self) -> f64 {
        self.start
    }
}

///
/// Coarsening driven by a caller supplied scoring function.
///
pub struct UserDefinedCoarseningFunctor<F>
where F: Fn(&HashGridStorage, usize) -> f64 + Send + Sync
{
    pub fun_eval: F,
    pub removements_num: usize,
    pub threshold: f64,
}

impl<F> UserDefinedCoarseningFunctor<F>
where F: Fn(&HashGridStorage, usize) -> f64 + Send + Sync
{
    pub fn new(fun_eval: F, removements_num: usize, threshold: f64) -> Self
    {
        Self { fun_eval, removements_num, threshold }
    }
}

impl<F> CoarseningFunctor for UserDefinedCoarseningFunctor<F>
where F: Fn(&HashGridStorage, usize) -> f64 + Send + Sync
{
    fn eval(&self, storage: &HashGridStorage, seq: usize) -> f64 {
        (self.fun_eval)(storage, seq)
    }

    fn removements_num(&self) -> usize {
        self.removements_num
    }

    fn coarsening_threshold(&self) -> f64 {
        self.threshold
    }
}

#[test]
fn test_user_defined_functor_sees_storage()
{
    use crate::storage::GridPoint;
    let mut storage = HashGridStorage::new(1);
    storage.insert(GridPoint::new(&[2], &[3], true)).unwrap();
    let functor = UserDefinedRefinementFunctor::new(|storage: &HashGridStorage, seq: usize| storage.unit_coordinate(seq)[0], 1, 0.0);
    assert_eq!(functor.eval(&storage, 0), 0.75);
    let functor = UserDefinedCoarseningFunctor::new(|storage: &HashGridStorage, seq: usize| storage.level(seq, 0) as f64, 1, 0.0);
    assert_eq!(functor.eval(&storage, 0), 2.0);
}
