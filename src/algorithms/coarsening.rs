use std::ops::Range;

use tracing::{debug, trace};

use crate::errors::SGError;
use crate::storage::{GridPoint, HashGridStorage};

///
/// Scores grid points for removal. Smaller scores are removed first.
///
pub trait CoarseningFunctor : Send + Sync
{
    fn eval(&self, storage: &HashGridStorage, seq: usize) -> f64;

    ///
    /// Maximum number of points removed per call.
    ///
    fn removements_num(&self) -> usize;

    ///
    /// Points whose absolute score reaches this are never removed.
    ///
    fn coarsening_threshold(&self) -> f64;

    ///
    /// Baseline score; only points scoring strictly below it are selected.
    ///
    fn start(&self) -> f64
    {
        f64::MAX
    }
}

///
/// Outcome of a coarsening call. `removed_seq` holds the pre-removal
/// sequence numbers in ascending order, `removed_points` the matching
/// points, and `remaining[new_seq]` the old sequence number of each
/// surviving point.
///
#[derive(Clone, Debug, Default)]
pub struct CoarseningResult
{
    pub removed_points: Vec<GridPoint>,
    pub removed_seq: Vec<usize>,
    pub remaining: Vec<usize>,
}

impl CoarseningResult
{
    pub fn is_empty(&self) -> bool
    {
        self.removed_seq.is_empty()
    }

    ///
    /// Drops the rows of the removed points from a coefficient vector that
    /// was aligned with the storage before coarsening.
    ///
    pub fn compact(&self, alpha: &mut Vec<f64>)
    {
        compact_coefficients(alpha, &self.removed_seq);
    }
}

///
/// Removes the entries `removed_seq` from `alpha`, keeping the order of the
/// survivors. Out of range entries are ignored.
///
pub fn compact_coefficients<T>(alpha: &mut Vec<T>, removed_seq: &[usize])
{
    let mut removed = vec![false; alpha.len()];
    for &seq in removed_seq
    {
        if let Some(flag) = removed.get_mut(seq)
        {
            *flag = true;
        }
    }
    let mut flags = removed.into_iter();
    alpha.retain(|_| !flags.next().unwrap_or(false));
}

#[derive(Copy, Clone, Default, Debug)]
pub struct HashCoarsening;

impl HashCoarsening
{
    ///
    /// A point can be removed if it is a leaf inside the candidate window.
    /// The all-zero boundary anchor is kept regardless.
    ///
    #[inline]
    fn is_removable(storage: &HashGridStorage, seq: usize) -> bool
    {
        storage.is_leaf(seq) && storage.level_max(seq) > 0
    }

    fn window(storage: &HashGridStorage, range: Range<usize>) -> Result<Range<usize>, SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::StorageEmpty);
        }
        if range.end > storage.len()
        {
            return Err(SGError::InvalidIndex);
        }
        Ok(range)
    }

    ///
    /// Removes up to `functor.removements_num()` removable points with the
    /// smallest scores below the threshold.
    ///
    pub fn free_coarsen(&self, storage: &mut HashGridStorage, functor: &dyn CoarseningFunctor) -> Result<CoarseningResult, SGError>
    {
        let len = storage.len();
        self.coarsen_range(storage, functor, 0..len)
    }

    ///
    /// Like [`HashCoarsening::free_coarsen`], but the first `num_first_only`
    /// points (typically the initial regular grid) are never removed.
    ///
    pub fn coarsen_n_first_only(&self, storage: &mut HashGridStorage, functor: &dyn CoarseningFunctor, num_first_only: usize) -> Result<CoarseningResult, SGError>
    {
        let len = storage.len();
        self.coarsen_range(storage, functor, num_first_only.min(len)..len)
    }

    ///
    /// Coarsening restricted to the candidates with sequence numbers in
    /// `range`.
    ///
    pub fn coarsen_range(&self, storage: &mut HashGridStorage, functor: &dyn CoarseningFunctor, range: Range<usize>) -> Result<CoarseningResult, SGError>
    {
        let range = Self::window(storage, range)?;
        let k = functor.removements_num();
        let start = functor.start();
        let threshold = functor.coarsening_threshold();
        // the k smallest scores, tracking the largest slot
        let mut slots = vec![(start, 0usize); k];
        let mut max_idx = 0;
        if k > 0
        {
            for seq in range.filter(|&seq| Self::is_removable(storage, seq))
            {
                let score = functor.eval(storage, seq);
                if score < slots[max_idx].0
                {
                    slots[max_idx] = (score, seq);
                    max_idx = index_of_max(&slots);
                }
            }
        }
        let mut removed_seq: Vec<usize> = slots.into_iter()
            .filter(|(score, _)| *score < start && score.abs() < threshold)
            .map(|(score, seq)| { trace!(seq, score, "removing point"); seq })
            .collect();
        removed_seq.sort_unstable();
        if removed_seq.is_empty()
        {
            return Ok(CoarseningResult { remaining: (0..storage.len()).collect(), ..Default::default() });
        }
        let removed_points = removed_seq.iter().map(|&seq| storage.point(seq)).collect();
        let remaining = storage.remove(&removed_seq)?;
        debug!(removed = removed_seq.len(), size = storage.len(), "coarsening step");
        Ok(CoarseningResult { removed_points, removed_seq, remaining })
    }

    ///
    /// Number of points a coarsening call could remove.
    ///
    pub fn get_number_of_removable_points(&self, storage: &HashGridStorage) -> Result<usize, SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::StorageEmpty);
        }
        Ok((0..storage.len()).filter(|&seq| Self::is_removable(storage, seq)).count())
    }
}

#[inline]
fn index_of_max(slots: &[(f64, usize)]) -> usize
{
    let mut max_idx = 0;
    for (i, slot) in slots.iter().enumerate().skip(1)
    {
        if slot.0 > slots[max_idx].0
        {
            max_idx = i;
        }
    }
    max_idx
}
