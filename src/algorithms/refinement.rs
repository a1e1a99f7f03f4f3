use std::ops::Range;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::errors::SGError;
use crate::iterators::subspace_iterator::SubspaceIterator;
use crate::level_index::{self, MAX_LEVEL};
use crate::storage::{GridPoint, HashGridStorage};

///
/// Scores grid points for refinement. Larger scores are refined first.
///
pub trait RefinementFunctor : Send + Sync
{
    ///
    /// Score of the point stored at `seq`. A common choice is the absolute
    /// value of the hierarchical surplus.
    ///
    fn eval(&self, storage: &HashGridStorage, seq: usize) -> f64;

    ///
    /// Maximum number of points (or subspaces) refined per call.
    ///
    fn refinements_num(&self) -> usize;

    ///
    /// Scores whose absolute value is below this are never refined.
    ///
    fn refinement_threshold(&self) -> f64;

    ///
    /// Baseline score; only points scoring strictly above it are selected.
    ///
    fn start(&self) -> f64
    {
        0.0
    }
}

///
/// Keeps the `k` largest scores seen so far. Slots start at `start` and the
/// smallest slot is replaced whenever a larger score arrives.
///
struct TopK<T>
{
    slots: Vec<(f64, T)>,
    min_idx: usize,
}

impl<T: Clone> TopK<T>
{
    fn new(k: usize, start: f64, init: T) -> Self
    {
        Self { slots: vec![(start, init); k], min_idx: 0 }
    }

    #[inline]
    fn offer(&mut self, score: f64, item: T)
    {
        if self.slots.is_empty()
        {
            return;
        }
        if score > self.slots[self.min_idx].0
        {
            self.slots[self.min_idx] = (score, item);
            self.min_idx = index_of_min(&self.slots);
        }
    }

    ///
    /// Entries that beat `start` and reach the threshold in absolute value.
    ///
    fn accepted(self, start: f64, threshold: f64) -> impl Iterator<Item = (f64, T)>
    {
        self.slots.into_iter().filter(move |(score, _)| *score > start && score.abs() >= threshold)
    }
}

#[inline]
fn index_of_min<T>(slots: &[(f64, T)]) -> usize
{
    let mut min_idx = 0;
    for (i, slot) in slots.iter().enumerate().skip(1)
    {
        if slot.0 < slots[min_idx].0
        {
            min_idx = i;
        }
    }
    min_idx
}

///
/// Free refinement on hash grid storages. The flag enables boundary
/// handling: level-zero anchors are kept consistent and level-one points
/// get their anchors created.
///
#[derive(Copy, Clone, Default, Debug)]
pub struct HashRefinement(pub bool);

impl HashRefinement
{
    pub fn with_boundaries() -> Self
    {
        Self(true)
    }

    ///
    /// First direction (and the child level there) in which `point` lacks a
    /// child not deeper than `max_level`.
    ///
    fn missing_child(storage: &HashGridStorage, point: &mut GridPoint, max_level: u8) -> Option<(usize, u8)>
    {
        for d in 0..storage.dim()
        {
            let (level, index) = point.get(d);
            if level >= max_level
            {
                continue;
            }
            let mut missing = None;
            if let Some((l, i)) = level_index::left_child(level, index)
            {
                point.set(d, l, i);
                if !storage.contains(point)
                {
                    missing = Some((d, l));
                }
            }
            if missing.is_none() && level > 0
            {
                if let Some((l, i)) = level_index::right_child(level, index)
                {
                    point.set(d, l, i);
                    if !storage.contains(point)
                    {
                        missing = Some((d, l));
                    }
                }
            }
            point.set(d, level, index);
            if missing.is_some()
            {
                return missing;
            }
        }
        None
    }

    fn collect_refinable_points(&self, storage: &HashGridStorage, functor: &dyn RefinementFunctor, max_level: u8) -> TopK<usize>
    {
        let mut top = TopK::new(functor.refinements_num(), functor.start(), 0);
        for seq in 0..storage.len()
        {
            let mut point = storage.point(seq);
            if Self::missing_child(storage, &mut point, max_level).is_some()
            {
                top.offer(functor.eval(storage, seq), seq);
            }
        }
        top
    }

    ///
    /// Refines up to `functor.refinements_num()` refinable points with the
    /// largest scores. Returns the range of newly created sequence numbers.
    ///
    pub fn free_refine(&self, storage: &mut HashGridStorage, functor: &dyn RefinementFunctor) -> Result<Range<usize>, SGError>
    {
        self.refine_impl(storage, functor, MAX_LEVEL)
    }

    ///
    /// Like [`HashRefinement::free_refine`] but never creates a child deeper
    /// than `max_level`; points whose missing children would all exceed the
    /// cap are not refinable.
    ///
    pub fn refine_max_level(&self, storage: &mut HashGridStorage, functor: &dyn RefinementFunctor, max_level: u8) -> Result<Range<usize>, SGError>
    {
        if max_level > MAX_LEVEL
        {
            return Err(SGError::InvalidLevel);
        }
        self.refine_impl(storage, functor, max_level)
    }

    fn refine_impl(&self, storage: &mut HashGridStorage, functor: &dyn RefinementFunctor, max_level: u8) -> Result<Range<usize>, SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::StorageEmpty);
        }
        let start = storage.len();
        let top = self.collect_refinable_points(storage, functor, max_level);
        for (score, seq) in top.accepted(functor.start(), functor.refinement_threshold())
        {
            trace!(seq, score, "refining point");
            self.refine_gridpoint(storage, seq, max_level)?;
        }
        debug!(added = storage.len() - start, size = storage.len(), "refinement step");
        Ok(start..storage.len())
    }

    ///
    /// Number of points that still lack at least one child.
    ///
    pub fn get_number_of_refinable_points(&self, storage: &HashGridStorage) -> Result<usize, SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::StorageEmpty);
        }
        Ok((0..storage.len()).filter(|&seq|
        {
            let mut point = storage.point(seq);
            Self::missing_child(storage, &mut point, MAX_LEVEL).is_some()
        }).count())
    }

    ///
    /// Creates every missing child of the point at `seq` in every direction,
    /// skipping children deeper than `max_level`.
    ///
    pub fn refine_gridpoint(&self, storage: &mut HashGridStorage, seq: usize, max_level: u8) -> Result<(), SGError>
    {
        if seq >= storage.len()
        {
            return Err(SGError::InvalidIndex);
        }
        let point = storage.point(seq);
        for d in 0..storage.dim()
        {
            self.refine_1d(storage, &point, d, max_level)?;
        }
        let is_leaf = !storage.has_children(&point);
        storage.set_is_leaf(seq, is_leaf);
        Ok(())
    }

    ///
    /// Creates the missing children of `point` along direction `d`.
    ///
    pub fn refine_1d(&self, storage: &mut HashGridStorage, point: &GridPoint, d: usize, max_level: u8) -> Result<(), SGError>
    {
        let (level, index) = point.get(d);
        if level >= max_level
        {
            return Ok(());
        }
        let mut children = Vec::with_capacity(2);
        children.extend(level_index::left_child(level, index));
        if level > 0
        {
            children.extend(level_index::right_child(level, index));
        }
        for (l, i) in children
        {
            let mut child = point.clone();
            child.set(d, l, i);
            self.create_gridpoint(storage, child)?;
        }
        Ok(())
    }

    ///
    /// Inserts `point` together with every missing hierarchical ancestor. On
    /// boundary grids a level-one coordinate also needs both level-zero
    /// anchors, and a level-zero anchor needs its partner.
    ///
    pub fn create_gridpoint(&self, storage: &mut HashGridStorage, point: GridPoint) -> Result<(), SGError>
    {
        if storage.contains(&point)
        {
            return Ok(());
        }
        let dim = storage.dim();
        for d in 0..dim
        {
            let (level, index) = point.get(d);
            if self.0 && level == 1 && dim > 1
            {
                for anchor in 0..2
                {
                    let mut boundary = point.clone();
                    boundary.set(d, 0, anchor);
                    self.create_gridpoint(storage, boundary)?;
                }
            }
            if let Some((l, i)) = level_index::parent(level, index)
            {
                let mut parent = point.clone();
                parent.set(d, l, i);
                self.create_gridpoint(storage, parent)?;
            }
        }
        // ancestors may have created this point as an anchor partner
        if storage.contains(&point)
        {
            return Ok(());
        }
        storage.insert_linked(point.clone())?;
        if self.0 && dim > 1
        {
            for d in 0..dim
            {
                let (level, index) = point.get(d);
                if level == 0
                {
                    let mut partner = point.clone();
                    partner.set(d, 0, 1 - index);
                    self.create_gridpoint(storage, partner)?;
                }
            }
        }
        Ok(())
    }

    ///
    /// Accumulates scores per refinable subspace (the level vector of the
    /// first missing child) and creates every point of the
    /// `functor.refinements_num()` subspaces with the largest totals.
    ///
    pub fn free_refine_subspace(&self, storage: &mut HashGridStorage, functor: &dyn RefinementFunctor) -> Result<Range<usize>, SGError>
    {
        if storage.is_empty()
        {
            return Err(SGError::StorageEmpty);
        }
        let start = storage.len();
        let mut subspace_scores: IndexMap<Vec<u8>, f64> = IndexMap::new();
        for seq in 0..storage.len()
        {
            let mut point = storage.point(seq);
            if let Some((d, child_level)) = Self::missing_child(storage, &mut point, MAX_LEVEL)
            {
                let mut levels = point.levels().to_vec();
                levels[d] = child_level;
                *subspace_scores.entry(levels).or_insert(0.0) += functor.eval(storage, seq);
            }
        }
        let mut top = TopK::new(functor.refinements_num(), functor.start(), Vec::new());
        for (levels, score) in subspace_scores
        {
            top.offer(score, levels);
        }
        for (score, levels) in top.accepted(functor.start(), functor.refinement_threshold())
        {
            trace!(?levels, score, "refining subspace");
            for point in SubspaceIterator::new(&levels)
            {
                self.create_gridpoint(storage, point)?;
            }
        }
        debug!(added = storage.len() - start, size = storage.len(), "subspace refinement step");
        Ok(start..storage.len())
    }
}
