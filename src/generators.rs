use tracing::debug;

use crate::errors::SGError;
use crate::iterators::subspace_iterator::SubspaceIterator;
use crate::level_index::MAX_LEVEL;
use crate::storage::{GridPoint, HashGridStorage};

///
/// Builds initial, non-adaptive point sets.
///
/// Every generator requires an empty storage and leaves the leaf flags of
/// the generated grid consistent.
///
#[derive(Copy, Clone, Default, Debug)]
pub struct HashGenerator;

///
/// Level budget check shared by the iterative sparse grid generators. For
/// details about `t`, see pages 8-9 of Griebel and Knapek's "Optimized
/// Tensor-Product Approximation Spaces".
///
#[inline]
fn within_budget(l: u8, level_sum: u32, level_max: u8, upper_bound: f64, n: u8, t: f64) -> bool
{
    let l_max = l.max(level_max);
    (l as u32 + level_sum) as f64 - t * l_max as f64 <= upper_bound && l_max <= n
}

fn check_preconditions(storage: &HashGridStorage, level: u8) -> Result<(), SGError>
{
    if !storage.is_empty()
    {
        return Err(SGError::StorageNotEmpty);
    }
    if level > MAX_LEVEL
    {
        return Err(SGError::InvalidLevel);
    }
    Ok(())
}

///
/// Writes `point` into the slot of the point it was derived from the first
/// time, appends it afterwards.
///
#[inline]
fn place(storage: &mut HashGridStorage, point: &GridPoint, origin: usize, first: &mut bool) -> Result<(), SGError>
{
    if *first
    {
        *first = false;
        storage.update(point.clone(), origin)
    }
    else
    {
        storage.insert(point.clone()).map(|_| ())
    }
}

/// 1D hierarchy `1..=n` in direction 0, all other directions at `(1,1)`.
fn first_dimension(storage: &mut HashGridStorage, n: u8) -> Result<GridPoint, SGError>
{
    let mut point = GridPoint::root(storage.dim());
    for l in 1..=n
    {
        for i in (1..(1u32 << l)).step_by(2)
        {
            point.set(0, l, i);
            point.set_is_leaf(l == n);
            storage.insert(point.clone())?;
        }
    }
    Ok(point)
}

impl HashGenerator
{
    ///
    /// Generates a regular sparse grid of level `level`, without boundaries.
    /// `t = 0` (the default) yields the classic sparse grid, `|l|_1 <= n + d - 1`.
    ///
    #[allow(non_snake_case)]
    pub fn regular(&self, storage: &mut HashGridStorage, level: u8, T: Option<f64>) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        let t = T.unwrap_or(0.0);
        self.regular_iter(storage, level, t, None)?;
        if t != 0.0
        {
            storage.recalc_leaf_property();
        }
        debug!(points = storage.len(), level, "generated regular grid");
        Ok(())
    }

    ///
    /// Regular sparse grid where the dimensions are split into groups of
    /// `clique_size`; only dimensions inside one group are fully connected.
    ///
    #[allow(non_snake_case)]
    pub fn cliques(&self, storage: &mut HashGridStorage, level: u8, clique_size: usize, T: Option<f64>) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        if clique_size == 0
        {
            return Err(SGError::InvalidParameter);
        }
        self.regular_iter(storage, level, T.unwrap_or(0.0), Some(clique_size))?;
        storage.recalc_leaf_property();
        debug!(points = storage.len(), level, clique_size, "generated clique grid");
        Ok(())
    }

    fn regular_iter(&self, storage: &mut HashGridStorage, n: u8, t: f64, clique_size: Option<usize>) -> Result<(), SGError>
    {
        let dim = storage.dim();
        if dim == 0
        {
            return Ok(());
        }
        first_dimension(storage, n)?;
        let upper_bound = (n as u32 + dim as u32 - 1) as f64 - t * n as f64;
        // loop dim times over the intermediate grid and spread each point
        // along the current direction d
        for d in 1..dim
        {
            let grid_size = storage.len();
            for g in 0..grid_size
            {
                let mut point = storage.point(g);
                if let Some(clique_size) = clique_size
                {
                    let clique_end = (clique_size * (d / clique_size)).min(d);
                    if (0..clique_end).any(|dt| point.level(dt) > 1)
                    {
                        continue;
                    }
                }
                let level_sum = point.level_sum() - 1;
                let level_max = point.level_max();
                let mut first = true;
                let mut l = 1;
                while l <= MAX_LEVEL && within_budget(l, level_sum, level_max, upper_bound, n, t)
                {
                    for i in (1..(1u32 << l)).step_by(2)
                    {
                        point.set(d, l, i);
                        point.set_is_leaf(l as u32 + level_sum == n as u32 + dim as u32 - 1);
                        place(storage, &point, g, &mut first)?;
                    }
                    l += 1;
                }
            }
        }
        Ok(())
    }

    ///
    /// Generates a full grid of level `level` (`(2^n - 1)^d` points), without
    /// boundaries.
    ///
    pub fn full(&self, storage: &mut HashGridStorage, level: u8) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        self.anisotropic_full_iter(storage, &vec![level; storage.dim()])?;
        debug!(points = storage.len(), level, "generated full grid");
        Ok(())
    }

    ///
    /// Full grid with an individual level per dimension.
    ///
    pub fn anisotropic_full(&self, storage: &mut HashGridStorage, levels: &[u8]) -> Result<(), SGError>
    {
        if levels.len() != storage.dim()
        {
            return Err(SGError::DimensionMismatch);
        }
        check_preconditions(storage, levels.iter().copied().max().unwrap_or(0))?;
        if levels.contains(&0)
        {
            return Err(SGError::InvalidLevel);
        }
        self.anisotropic_full_iter(storage, levels)?;
        debug!(points = storage.len(), ?levels, "generated anisotropic full grid");
        Ok(())
    }

    fn anisotropic_full_iter(&self, storage: &mut HashGridStorage, levels: &[u8]) -> Result<(), SGError>
    {
        let dim = storage.dim();
        if dim == 0
        {
            return Ok(());
        }
        first_dimension(storage, levels[0])?;
        for (d, &n) in levels.iter().enumerate().skip(1)
        {
            let grid_size = storage.len();
            for g in 0..grid_size
            {
                let mut point = storage.point(g);
                let mut first = true;
                for l in 1..=n
                {
                    for i in (1..(1u32 << l)).step_by(2)
                    {
                        point.set(d, l, i);
                        place(storage, &point, g, &mut first)?;
                    }
                }
            }
        }
        storage.recalc_leaf_property();
        Ok(())
    }

    ///
    /// Full grid of level `level` including the boundary: `(2^n + 1)^d` points.
    ///
    pub fn full_with_boundaries(&self, storage: &mut HashGridStorage, level: u8) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        let dim = storage.dim();
        if dim == 0
        {
            return Ok(());
        }
        let n = level;
        let mut point = GridPoint::root(dim);
        for anchor in 0..2
        {
            point.set(0, 0, anchor);
            storage.insert(point.clone())?;
        }
        for l in 1..=n
        {
            for i in (1..(1u32 << l)).step_by(2)
            {
                point.set(0, l, i);
                storage.insert(point.clone())?;
            }
        }
        for d in 1..dim
        {
            let grid_size = storage.len();
            for g in 0..grid_size
            {
                let mut point = storage.point(g);
                point.set(d, 0, 0);
                storage.update(point.clone(), g)?;
                point.set(d, 0, 1);
                storage.insert(point.clone())?;
                for l in 1..=n
                {
                    for i in (1..(1u32 << l)).step_by(2)
                    {
                        point.set(d, l, i);
                        storage.insert(point.clone())?;
                    }
                }
            }
        }
        storage.recalc_leaf_property();
        debug!(points = storage.len(), level, "generated full grid with boundaries");
        Ok(())
    }

    ///
    /// Regular sparse grid with boundary points.
    ///
    /// `boundary_level >= 1` truncates the boundary: subspaces with
    /// `N >= 1` zero levels are kept while `|l|_1 <= n + d - b - N`, interior
    /// ones while `|l|_1 <= n + d - 1`. `boundary_level == 0` keeps every
    /// subspace with `|l|_1 <= n`, level zero counting as zero.
    ///
    #[allow(non_snake_case)]
    pub fn regular_with_boundaries(&self, storage: &mut HashGridStorage, level: u8, boundary_level: u8, T: Option<f64>) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        if storage.dim() == 0
        {
            return Ok(());
        }
        if boundary_level >= 1
        {
            self.regular_boundary_truncated_iter(storage, level, boundary_level as u32, T.unwrap_or(0.0))?;
        }
        else
        {
            self.boundary_subspaces(storage, level)?;
        }
        storage.recalc_leaf_property();
        debug!(points = storage.len(), level, boundary_level, "generated regular grid with boundaries");
        Ok(())
    }

    fn regular_boundary_truncated_iter(&self, storage: &mut HashGridStorage, n: u8, boundary_level: u32, t: f64) -> Result<(), SGError>
    {
        let dim = storage.dim();
        let mut point = GridPoint::root(dim);
        for anchor in 0..2
        {
            point.set(0, 0, anchor);
            storage.insert(point.clone())?;
        }
        first_dimension(storage, n)?;
        let n32 = n as u32;
        for d in 1..dim
        {
            let grid_size = storage.len();
            // dimensionality of the points created in this sweep
            let cur_dim = d as u32 + 1;
            for g in 0..grid_size
            {
                let mut point = storage.point(g);
                let level_sum: u32 = (0..d).map(|sd| point.level(sd) as u32).sum();
                let zero_levels = (0..d).filter(|&sd| point.level(sd) == 0).count() as u32;
                let mut first = true;
                // the new boundary points add one more zero level
                if level_sum + boundary_level + zero_levels + 1 <= n32 + cur_dim || zero_levels == cur_dim - 1
                {
                    point.set(d, 0, 0);
                    storage.update(point.clone(), g)?;
                    point.set(d, 0, 1);
                    storage.insert(point.clone())?;
                    first = false;
                }
                let upper_bound = if zero_levels > 0
                {
                    if n32 + cur_dim < boundary_level + zero_levels
                    {
                        continue;
                    }
                    (n32 + cur_dim - zero_levels - boundary_level) as f64
                }
                else
                {
                    (n32 + cur_dim - 1) as f64
                } - t * n as f64;
                let level_max = point.level_max();
                let mut l = 1;
                while l <= MAX_LEVEL && within_budget(l, level_sum, level_max, upper_bound, n, t)
                {
                    for i in (1..(1u32 << l)).step_by(2)
                    {
                        point.set(d, l, i);
                        place(storage, &point, g, &mut first)?;
                    }
                    l += 1;
                }
            }
        }
        Ok(())
    }

    ///
    /// Every subspace with `|l|_1 <= n` (level zero counts as zero), with all
    /// of its index combinations.
    ///
    fn boundary_subspaces(&self, storage: &mut HashGridStorage, n: u8) -> Result<(), SGError>
    {
        let dim = storage.dim();
        let mut levels = vec![0u8; dim];
        let mut subspaces = Vec::new();
        collect_level_vectors(&mut levels, 0, n as u32, &mut subspaces);
        for levels in subspaces
        {
            for point in SubspaceIterator::new(&levels)
            {
                storage.insert(point)?;
            }
        }
        Ok(())
    }

    ///
    /// Regular sparse grid with periodic boundaries: only the left anchor
    /// `(0,0)` per direction, level zero counting as level one.
    ///
    #[allow(non_snake_case)]
    pub fn regular_with_periodic_boundaries(&self, storage: &mut HashGridStorage, level: u8, T: Option<f64>) -> Result<(), SGError>
    {
        check_preconditions(storage, level)?;
        if level == 0
        {
            return Err(SGError::InvalidLevel);
        }
        let dim = storage.dim();
        if dim == 0
        {
            return Ok(());
        }
        let t = T.unwrap_or(0.0);
        let n = level;
        let mut point = GridPoint::root(dim);
        point.set(0, 0, 0);
        storage.insert(point.clone())?;
        first_dimension(storage, n)?;
        let upper_bound = (n as u32 + dim as u32 - 1) as f64 - t * n as f64;
        for d in 1..dim
        {
            let grid_size = storage.len();
            for g in 0..grid_size
            {
                let mut point = storage.point(g);
                let level_sum = point.level_sum() - 1 + (0..d).filter(|&sd| point.level(sd) == 0).count() as u32;
                let level_max = point.level_max();
                let mut first = true;
                let mut l = 1;
                while l <= MAX_LEVEL && within_budget(l, level_sum, level_max, upper_bound, n, t)
                {
                    if l == 1
                    {
                        point.set(d, 0, 0);
                        storage.insert(point.clone())?;
                    }
                    for i in (1..(1u32 << l)).step_by(2)
                    {
                        point.set(d, l, i);
                        place(storage, &point, g, &mut first)?;
                    }
                    l += 1;
                }
            }
        }
        storage.recalc_leaf_property();
        debug!(points = storage.len(), level, "generated periodic grid");
        Ok(())
    }
}

/// All level vectors from position `d` on whose sum stays within `budget`.
fn collect_level_vectors(levels: &mut Vec<u8>, d: usize, budget: u32, out: &mut Vec<Vec<u8>>)
{
    if d == levels.len()
    {
        out.push(levels.clone());
        return;
    }
    for l in 0..=budget.min(MAX_LEVEL as u32)
    {
        levels[d] = l as u8;
        collect_level_vectors(levels, d + 1, budget - l, out);
    }
    levels[d] = 0;
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn keys_unique(storage: &HashGridStorage) -> bool
    {
        let mut keys: Vec<_> = (0..storage.len()).map(|s| (storage.point(s).levels().to_vec(), storage.point(s).indices().to_vec())).collect();
        keys.sort();
        keys.dedup();
        keys.len() == storage.len()
    }

    #[test]
    fn test_regular_cardinality()
    {
        for (dim, expected) in [(1, 3), (2, 5), (3, 7)]
        {
            let mut storage = HashGridStorage::new(dim);
            HashGenerator.regular(&mut storage, 2, None).unwrap();
            assert_eq!(storage.len(), expected);
            assert!(storage.is_leaf_property_consistent());
        }
        let mut storage = HashGridStorage::new(2);
        HashGenerator.regular(&mut storage, 3, None).unwrap();
        assert_eq!(storage.len(), 17);
        assert!(keys_unique(&storage));
        assert!(storage.is_leaf_property_consistent());
    }

    #[test]
    fn test_regular_requires_empty_storage()
    {
        let mut storage = HashGridStorage::new(2);
        HashGenerator.regular(&mut storage, 2, None).unwrap();
        assert_eq!(HashGenerator.regular(&mut storage, 2, None), Err(SGError::StorageNotEmpty));
        let mut storage = HashGridStorage::new(2);
        assert_eq!(HashGenerator.regular(&mut storage, 40, None), Err(SGError::InvalidLevel));
    }

    #[test]
    fn test_regular_with_modifier()
    {
        let mut sparse = HashGridStorage::new(2);
        HashGenerator.regular(&mut sparse, 4, None).unwrap();
        let mut modified = HashGridStorage::new(2);
        HashGenerator.regular(&mut modified, 4, Some(0.5)).unwrap();
        assert!(modified.len() < sparse.len());
        assert!(keys_unique(&modified));
        assert!(modified.is_leaf_property_consistent());
    }

    #[test]
    fn test_boundary_cardinality()
    {
        for (dim, level, expected) in [(1, 2, 5), (2, 2, 21), (2, 3, 49)]
        {
            let mut storage = HashGridStorage::new(dim);
            HashGenerator.regular_with_boundaries(&mut storage, level, 1, None).unwrap();
            assert_eq!(storage.len(), expected);
            assert!(keys_unique(&storage));
            assert!(storage.is_leaf_property_consistent());
        }
    }

    #[test]
    fn test_boundary_level_zero()
    {
        let mut storage = HashGridStorage::new(1);
        HashGenerator.regular_with_boundaries(&mut storage, 2, 0, None).unwrap();
        assert_eq!(storage.len(), 5);
        let mut storage = HashGridStorage::new(2);
        HashGenerator.regular_with_boundaries(&mut storage, 1, 0, None).unwrap();
        // |l| = 0: 4 corners, |l| = 1: 2 + 2 edge midpoints
        assert_eq!(storage.len(), 8);
        assert!(storage.is_leaf_property_consistent());
    }

    #[test]
    fn test_full_grids()
    {
        let mut storage = HashGridStorage::new(2);
        HashGenerator.full(&mut storage, 3).unwrap();
        assert_eq!(storage.len(), 49);
        assert!(storage.is_leaf_property_consistent());
        let mut storage = HashGridStorage::new(2);
        HashGenerator.full_with_boundaries(&mut storage, 2).unwrap();
        assert_eq!(storage.len(), 25);
        assert!(keys_unique(&storage));
        assert!(storage.is_leaf_property_consistent());
        let mut storage = HashGridStorage::new(2);
        HashGenerator.anisotropic_full(&mut storage, &[1, 3]).unwrap();
        assert_eq!(storage.len(), 7);
        assert_eq!(HashGenerator.anisotropic_full(&mut HashGridStorage::new(2), &[1]), Err(SGError::DimensionMismatch));
    }

    #[test]
    fn test_cliques()
    {
        let mut storage = HashGridStorage::new(4);
        assert_eq!(HashGenerator.cliques(&mut storage, 3, 0, None), Err(SGError::InvalidParameter));
        HashGenerator.cliques(&mut storage, 3, 2, None).unwrap();
        let mut regular = HashGridStorage::new(4);
        HashGenerator.regular(&mut regular, 3, None).unwrap();
        assert!(storage.len() < regular.len());
        assert!(keys_unique(&storage));
        assert!(storage.is_leaf_property_consistent());
        let mut full_clique = HashGridStorage::new(4);
        HashGenerator.cliques(&mut full_clique, 3, 4, None).unwrap();
        assert_eq!(full_clique.len(), regular.len());
    }

    #[test]
    fn test_periodic()
    {
        let mut storage = HashGridStorage::new(1);
        assert_eq!(HashGenerator.regular_with_periodic_boundaries(&mut storage, 0, None), Err(SGError::InvalidLevel));
        HashGenerator.regular_with_periodic_boundaries(&mut storage, 2, None).unwrap();
        assert_eq!(storage.len(), 4);
        assert!(!storage.contains(&GridPoint::new(&[0], &[1], false)));
        let mut storage = HashGridStorage::new(2);
        HashGenerator.regular_with_periodic_boundaries(&mut storage, 2, None).unwrap();
        assert!(keys_unique(&storage));
        assert!(storage.is_leaf_property_consistent());
    }
}
