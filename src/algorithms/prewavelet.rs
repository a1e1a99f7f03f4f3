use std::ops::Range;

use tracing::{debug, trace};

use crate::algorithms::refinement::{HashRefinement, RefinementFunctor};
use crate::errors::SGError;
use crate::generators::HashGenerator;
use crate::level_index;
use crate::storage::{GridPoint, HashGridStorage};

///
/// True if the prewavelet supports `[(i-2)h, (i+2)h]` of two 1D keys
/// overlap in an open interval. Evaluated on the finer of the two levels.
///
#[inline]
pub fn supports_touch(a: (u8, u32), b: (u8, u32)) -> bool
{
    let level = a.0.max(b.0);
    let bounds = |(l, i): (u8, u32)|
    {
        let scale = 1i64 << (level - l);
        ((i as i64 - 2) * scale, (i as i64 + 2) * scale)
    };
    let (lo_a, hi_a) = bounds(a);
    let (lo_b, hi_b) = bounds(b);
    lo_a < hi_b && lo_b < hi_a
}

///
/// Grid generator for prewavelet grids.
///
/// Prewavelet evaluation needs, for every real point, the points of equal
/// level sum whose supports touch it, plus their hierarchical ancestors.
/// Those missing from the real grid are tracked in a shadow storage that is
/// kept disjoint from the real one.
///
pub struct PrewaveletGridGenerator<'a>
{
    storage: &'a mut HashGridStorage,
    shadow_storage: &'a mut HashGridStorage,
}

impl<'a> PrewaveletGridGenerator<'a>
{
    pub fn new(storage: &'a mut HashGridStorage, shadow_storage: &'a mut HashGridStorage) -> Self
    {
        Self { storage, shadow_storage }
    }

    pub fn shadow_storage(&self) -> &HashGridStorage
    {
        self.shadow_storage
    }

    pub fn storage(&self) -> &HashGridStorage
    {
        self.storage
    }

    ///
    /// Regular sparse grid; regular grids need no shadow points.
    ///
    pub fn regular(&mut self, level: u8) -> Result<(), SGError>
    {
        HashGenerator.regular(self.storage, level, None)
    }

    pub fn full(&mut self, level: u8) -> Result<(), SGError>
    {
        HashGenerator.full(self.storage, level)
    }

    ///
    /// Refines the real grid, then restores the shadow invariants for every
    /// new point. Returns the range of new sequence numbers in the real grid.
    ///
    pub fn refine(&mut self, functor: &dyn RefinementFunctor) -> Result<Range<usize>, SGError>
    {
        let added = HashRefinement::default().free_refine(self.storage, functor)?;
        if added.clone().any(|seq| self.shadow_storage.contains(&self.storage.point(seq)))
        {
            self.consolidate_shadow()?;
        }
        for seq in added.clone()
        {
            let point = self.storage.point(seq);
            self.add_neighbours(&point)?;
        }
        debug!(added = added.len(), shadow = self.shadow_storage.len(), "prewavelet refinement step");
        Ok(added)
    }

    ///
    /// Removing points would need the shadow to grow back; not supported.
    ///
    pub fn coarsen(&mut self) -> Result<(), SGError>
    {
        Err(SGError::NotImplemented)
    }

    ///
    /// Drops every shadow point that has become part of the real grid.
    ///
    pub fn consolidate_shadow(&mut self) -> Result<(), SGError>
    {
        let shadow: Vec<GridPoint> = (0..self.shadow_storage.len()).map(|seq| self.shadow_storage.point(seq)).collect();
        let before = shadow.len();
        self.shadow_storage.clear();
        for point in shadow
        {
            if !self.storage.contains(&point)
            {
                self.shadow_storage.insert(point)?;
            }
        }
        trace!(dropped = before - self.shadow_storage.len(), "consolidated shadow storage");
        Ok(())
    }

    #[inline]
    fn is_known(&self, point: &GridPoint) -> bool
    {
        self.storage.contains(point) || self.shadow_storage.contains(point)
    }

    ///
    /// Adds to the shadow every point of equal level sum whose support
    /// touches `point` and which is stored nowhere yet.
    ///
    fn add_neighbours(&mut self, point: &GridPoint) -> Result<(), SGError>
    {
        let mut candidate = GridPoint::root(point.dim());
        let mut neighbours = Vec::new();
        collect_neighbours(point, 0, 0, point.level_sum(), &mut candidate, &mut neighbours);
        for neighbour in neighbours
        {
            if !self.is_known(&neighbour)
            {
                self.shadow_storage.insert(neighbour.clone())?;
                self.insert_parents(&neighbour)?;
            }
        }
        Ok(())
    }

    ///
    /// Adds the missing hierarchical ancestors of a shadow point.
    ///
    fn insert_parents(&mut self, point: &GridPoint) -> Result<(), SGError>
    {
        for d in 0..point.dim()
        {
            let (level, index) = point.get(d);
            if let Some((l, i)) = level_index::parent(level, index)
            {
                let mut parent = point.clone();
                parent.set(d, l, i);
                if !self.is_known(&parent)
                {
                    self.shadow_storage.insert(parent.clone())?;
                    self.insert_parents(&parent)?;
                }
            }
        }
        Ok(())
    }
}

///
/// Depth first descent over the 1D trees of each direction, keeping keys
/// whose support touches `point` while the level sum stays reachable.
///
fn collect_neighbours(point: &GridPoint, d: usize, partial_sum: u32, target: u32, candidate: &mut GridPoint, out: &mut Vec<GridPoint>)
{
    let dim = point.dim();
    if d == dim
    {
        if partial_sum == target && candidate != point
        {
            out.push(candidate.clone());
        }
        return;
    }
    // every remaining direction adds at least level one
    let remaining = (dim - d - 1) as u32;
    let mut stack = vec![(1u8, 1u32)];
    while let Some((l, i)) = stack.pop()
    {
        if partial_sum + l as u32 + remaining > target || !supports_touch((l, i), point.get(d))
        {
            continue;
        }
        candidate.set(d, l, i);
        collect_neighbours(point, d + 1, partial_sum + l as u32, target, candidate, out);
        if let (Some(left), Some(right)) = (level_index::left_child(l, i), level_index::right_child(l, i))
        {
            stack.push(right);
            stack.push(left);
        }
    }
    candidate.set(d, 1, 1);
}
