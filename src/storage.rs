use std::hash::{Hash, Hasher};
use bitfield_struct::bitfield;
use nohash_hasher::BuildNoHashHasher;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::SGError;
use crate::iterators::grid_iterator::{GridIteratorT, HashGridIterator};
use crate::level_index;

pub mod bounding_box;
pub use bounding_box::BoundingBox;

pub type FastU64Map<V> = std::collections::HashMap<u64, V, BuildNoHashHasher<u64>>;

/// Sequence numbers sharing one 64-bit key hash.
type SeqBucket = SmallVec<[u32; 1]>;

///
/// Hash of a (level, index) key. Equal keys always hash equally; the leaf
/// flag never takes part.
///
#[inline]
pub fn key_hash(level: &[u8], index: &[u32]) -> u64
{
    let hasher = &mut FxHasher::default();
    level.hash(hasher);
    index.hash(hasher);
    hasher.finish()
}

#[bitfield(u8, new=false)]
#[derive(Serialize, Deserialize, PartialEq, Eq)]
pub struct GridPointFlags
{
    pub is_leaf: bool,
    pub is_inner: bool,
    #[bits(6)]
    pub _empty: u8
}

impl GridPointFlags
{
    pub fn new(level: &[u8], is_leaf: bool) -> Self
    {
        let mut r = Self::default();
        r.set_is_leaf(is_leaf);
        r.set_is_inner(!level.contains(&0));
        r
    }
    /// update `is_inner` flag...
    pub fn update_is_inner(&mut self, level: &[u8])
    {
        self.set_is_inner(!level.contains(&0));
    }
}

///
/// A single sparse grid point: one (level, index) pair per dimension plus
/// the leaf flag. The key hash is cached and refreshed by every key mutator.
///
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(try_from = "GridPointRecord")]
pub struct GridPoint
{
    level: Vec<u8>,
    index: Vec<u32>,
    pub(crate) flags: GridPointFlags,
    #[serde(skip)]
    hash: u64,
}

/// Persisted form of [`GridPoint`]; the key hash is recomputed on load.
#[derive(Deserialize)]
struct GridPointRecord
{
    level: Vec<u8>,
    index: Vec<u32>,
    flags: GridPointFlags,
}

impl TryFrom<GridPointRecord> for GridPoint
{
    type Error = SGError;

    fn try_from(value: GridPointRecord) -> Result<Self, Self::Error> {
        if value.level.len() != value.index.len()
            || !value.level.iter().zip(&value.index).all(|(&l, &i)| level_index::is_valid(l, i))
        {
            return Err(SGError::DeserializationFailed);
        }
        let mut point = Self { level: value.level, index: value.index, flags: value.flags, hash: 0 };
        point.rehash();
        Ok(point)
    }
}
impl Hash for GridPoint
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
impl Default for GridPoint
{
    fn default() -> Self {
        Self { level: vec![], index: vec![], flags: GridPointFlags(0), hash: key_hash(&[], &[]) }
    }
}
impl PartialOrd for GridPoint
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(std::cmp::Ord::cmp(self, other))
    }
}
impl Ord for GridPoint{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index).then(self.level.cmp(&other.level))
    }
}

impl PartialEq for GridPoint
{
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.index == other.index
    }
}
impl Eq for GridPoint{}

impl GridPoint
{
    pub fn new(level: &[u8], index: &[u32], is_leaf: bool) -> Self
    {
        let flags = GridPointFlags::new(level, is_leaf);
        Self { level: level.to_vec(), index: index.to_vec(), flags, hash: key_hash(level, index) }
    }

    ///
    /// The point `(1,1)` in every dimension.
    ///
    pub fn root(dim: usize) -> Self
    {
        Self::new(&vec![1; dim], &vec![1; dim], false)
    }

    pub fn zero_index(dim: usize) -> Self
    {
        Self::new(&vec![0; dim], &vec![0; dim], false)
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.level.len()
    }

    #[inline]
    pub fn get(&self, dim: usize) -> (u8, u32)
    {
        (self.level[dim], self.index[dim])
    }

    #[inline]
    pub fn level(&self, dim: usize) -> u8
    {
        self.level[dim]
    }

    #[inline]
    pub fn index(&self, dim: usize) -> u32
    {
        self.index[dim]
    }

    #[inline]
    pub fn levels(&self) -> &[u8]
    {
        &self.level
    }

    #[inline]
    pub fn indices(&self) -> &[u32]
    {
        &self.index
    }

    ///
    /// Overwrites the key in direction `dim` and rehashes.
    ///
    #[inline]
    pub fn set(&mut self, dim: usize, level: u8, index: u32)
    {
        self.level[dim] = level;
        self.index[dim] = index;
        self.flags.update_is_inner(&self.level);
        self.hash = key_hash(&self.level, &self.index);
    }

    #[inline]
    pub fn key_hash(&self) -> u64
    {
        self.hash
    }

    pub(crate) fn rehash(&mut self)
    {
        self.flags.update_is_inner(&self.level);
        self.hash = key_hash(&self.level, &self.index);
    }

    ///
    /// Checks every (level, index) pair against the key invariant.
    ///
    pub fn check_key(&self) -> Result<(), SGError>
    {
        if self.level.iter().any(|&l| l > level_index::MAX_LEVEL)
        {
            return Err(SGError::InvalidLevel);
        }
        if !self.level.iter().zip(&self.index).all(|(&l, &i)| level_index::is_valid(l, i))
        {
            return Err(SGError::InvalidIndex);
        }
        Ok(())
    }

    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    pub fn set_is_leaf(&mut self, is_leaf: bool)
    {
        self.flags.set_is_leaf(is_leaf);
    }

    ///
    /// This is an inner point if no level is zero...
    ///
    pub fn is_inner_point(&self) -> bool
    {
        self.flags.is_inner()
    }
    pub fn level_sum(&self) -> u32
    {
        self.level.iter().map(|&l| l as u32).sum()
    }
    #[inline]
    pub fn level_max(&self) -> u8
    {
        *self.level.iter().max().unwrap_or(&0)
    }
    pub fn level_min(&self) -> u8
    {
        *self.level.iter().min().unwrap_or(&0)
    }

    pub fn left_child(&self, dim: usize) -> Option<GridPoint>
    {
        let (l, i) = level_index::left_child(self.level[dim], self.index[dim])?;
        let mut r = self.clone();
        r.set(dim, l, i);
        Some(r)
    }
    pub fn right_child(&self, dim: usize) -> Option<GridPoint>
    {
        let (l, i) = level_index::right_child(self.level[dim], self.index[dim])?;
        let mut r = self.clone();
        r.set(dim, l, i);
        Some(r)
    }

    ///
    /// This only works for grids without boundaries: level one has no parent.
    ///
    pub fn parent(&self, dim: usize) -> Option<GridPoint>
    {
        let (l, i) = level_index::parent(self.level[dim], self.index[dim])?;
        let mut r = self.clone();
        r.set(dim, l, i);
        Some(r)
    }

    pub fn unit_coordinate(&self) -> Vec<f64>
    {
        self.level.iter().zip(self.index.iter()).map(|(&l, &i)| level_index::unit_coordinate(l, i)).collect()
    }
}

pub struct GridPointRef<'a> {
    pub(crate) index: &'a [u32],
    pub(crate) level: &'a [u8],
    pub(crate) flags: &'a GridPointFlags
}
impl GridPointRef<'_>
{
    #[inline]
    pub fn level(&self, dim: usize) -> u8
    {
        self.level[dim]
    }
    #[inline]
    pub fn index(&self, dim: usize) -> u32
    {
        self.index[dim]
    }
    #[inline]
    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    #[inline]
    pub fn is_inner_point(&self) -> bool
    {
        self.flags.is_inner()
    }
    pub fn unit_coordinate(&self) -> Vec<f64>
    {
        self.level.iter().zip(self.index.iter()).map(|(&l, &i)| level_index::unit_coordinate(l, i)).collect()
    }
    pub fn level_sum(&self) -> u32
    {
        self.level.iter().map(|&l| l as u32).sum()
    }
    #[inline]
    pub fn level_max(&self) -> u8
    {
        *self.level.iter().max().unwrap_or(&0)
    }
}

impl From<GridPointRef<'_>> for GridPoint
{
    fn from(value: GridPointRef<'_>) -> Self {
        GridPoint { level: value.level.to_owned(), index: value.index.to_owned(), flags: *value.flags, hash: key_hash(value.level, value.index) }
    }
}

pub struct GridPointMutRef<'a> {
    pub(crate) flags: &'a mut GridPointFlags
}
impl GridPointMutRef<'_>
{
    #[inline]
    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    #[inline]
    pub fn set_is_leaf(&mut self, is_leaf: bool)
    {
        self.flags.set_is_leaf(is_leaf);
    }
}

///
/// Hash indexed, densely numbered collection of grid points.
///
/// Points live in flat level/index arrays addressed by their sequence
/// number; the map resolves a key hash to the sequence numbers carrying
/// that hash, and the full key is compared before a match is reported.
///
#[derive(Clone, Serialize, Deserialize)]
#[serde(into = "StorageRecord", try_from = "StorageRecord")]
pub struct HashGridStorage
{
    pub(crate) bounding_box: BoundingBox,
    pub(crate) index: Vec<u32>,
    pub(crate) level: Vec<u8>,
    pub(crate) flags: Vec<GridPointFlags>,
    pub(crate) dim: usize,
    pub(crate) map: FastU64Map<SeqBucket>,
    pub(crate) algorithmic_dims: Vec<usize>,
}

/// Persisted form of [`HashGridStorage`]; the hash map is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct StorageRecord
{
    bounding_box: BoundingBox,
    index: Vec<u32>,
    level: Vec<u8>,
    flags: Vec<GridPointFlags>,
    dim: usize,
    algorithmic_dims: Vec<usize>,
}

impl From<HashGridStorage> for StorageRecord
{
    fn from(value: HashGridStorage) -> Self {
        Self { bounding_box: value.bounding_box, index: value.index, level: value.level, flags: value.flags, dim: value.dim, algorithmic_dims: value.algorithmic_dims }
    }
}

impl TryFrom<StorageRecord> for HashGridStorage
{
    type Error = SGError;

    fn try_from(value: StorageRecord) -> Result<Self, Self::Error> {
        let len = value.flags.len();
        if value.level.len() != len * value.dim || value.index.len() != len * value.dim
            || (value.bounding_box.dim() != 0 && value.bounding_box.dim() != value.dim)
        {
            return Err(SGError::DeserializationFailed);
        }
        if !value.level.iter().zip(&value.index).all(|(&l, &i)| level_index::is_valid(l, i))
        {
            return Err(SGError::DeserializationFailed);
        }
        let mut storage = HashGridStorage { bounding_box: value.bounding_box, index: value.index, level: value.level, flags: value.flags,
            dim: value.dim, map: FastU64Map::default(), algorithmic_dims: value.algorithmic_dims };
        storage.generate_map();
        // a repeated key resolves to its first occurrence
        if (0..len).any(|seq| storage.find(&storage.point(seq)) != Some(seq))
        {
            return Err(SGError::DuplicatePoint);
        }
        Ok(storage)
    }
}

impl std::fmt::Debug for HashGridStorage
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashGridStorage").field("dim", &self.dim).field("len", &self.len()).finish()
    }
}

impl HashGridStorage
{
    pub fn new(dim: usize) -> Self
    {
        Self { bounding_box: BoundingBox::with_dim(dim), index: Vec::new(), level: Vec::new(), flags: Vec::new(), dim,
            map: FastU64Map::default(), algorithmic_dims: (0..dim).collect() }
    }

    pub fn with_bounding_box(bounding_box: BoundingBox) -> Self
    {
        let mut storage = Self::new(bounding_box.dim());
        storage.bounding_box = bounding_box;
        storage
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.flags.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.flags.len()
    }

    ///
    /// The "not present" sentinel: one past the last sequence number.
    ///
    #[inline]
    pub fn end(&self) -> usize
    {
        self.len()
    }

    #[inline]
    pub fn point(&self, seq: usize) -> GridPoint
    {
        self.point_ref(seq).into()
    }

    #[inline]
    pub fn point_ref(&self, seq: usize) -> GridPointRef<'_>
    {
        let range = seq*self.dim..(seq+1)*self.dim;
        GridPointRef { index: &self.index[range.clone()], level: &self.level[range], flags: &self.flags[seq] }
    }

    #[inline]
    pub fn index(&self, seq: usize, dim: usize) -> u32
    {
        self.index[self.dim*seq + dim]
    }

    #[inline(always)]
    pub fn level(&self, seq: usize, dim: usize) -> u8
    {
        self.level[self.dim*seq + dim]
    }

    #[inline]
    pub fn get_mut(&mut self, seq: usize) -> Option<GridPointMutRef<'_>>
    {
        self.flags.get_mut(seq).map(|flags| GridPointMutRef { flags })
    }

    #[inline]
    pub fn is_leaf(&self, seq: usize) -> bool
    {
        self.flags[seq].is_leaf()
    }

    #[inline]
    pub fn set_is_leaf(&mut self, seq: usize, value: bool)
    {
        self.flags[seq].set_is_leaf(value);
    }

    #[inline]
    pub fn is_inner_point(&self, seq: usize) -> bool
    {
        self.flags[seq].is_inner()
    }

    #[inline]
    pub fn level_sum(&self, seq: usize) -> u32
    {
        self.level[seq*self.dim..(seq+1)*self.dim].iter().map(|&i| i as u32).sum()
    }

    #[inline]
    pub fn level_max(&self, seq: usize) -> u8
    {
        *self.level[seq*self.dim..(seq+1)*self.dim].iter().max().unwrap_or(&0)
    }

    ///
    /// Number of points with level >= 1 in every dimension.
    ///
    pub fn num_inner_points(&self) -> usize
    {
        self.flags.iter().filter(|f| f.is_inner()).count()
    }

    ///
    /// Deepest level found in any dimension of any point.
    ///
    pub fn max_level(&self) -> u8
    {
        *self.level.iter().max().unwrap_or(&0)
    }

    #[inline]
    fn key_matches(&self, seq: usize, level: &[u8], index: &[u32]) -> bool
    {
        let range = seq*self.dim..(seq+1)*self.dim;
        self.level[range.clone()] == *level && self.index[range] == *index
    }

    ///
    /// Sequence number of the key given as raw slices.
    ///
    pub fn find_key(&self, level: &[u8], index: &[u32]) -> Option<usize>
    {
        self.lookup(key_hash(level, index), level, index)
    }

    #[inline]
    fn lookup(&self, hash: u64, level: &[u8], index: &[u32]) -> Option<usize>
    {
        self.map.get(&hash)?.iter().map(|&s| s as usize).find(|&s| self.key_matches(s, level, index))
    }

    #[inline]
    pub fn find(&self, point: &GridPoint) -> Option<usize>
    {
        if point.dim() != self.dim
        {
            return None;
        }
        self.lookup(point.key_hash(), point.levels(), point.indices())
    }

    #[inline]
    pub fn contains(&self, point: &GridPoint) -> bool
    {
        self.find(point).is_some()
    }

    ///
    /// Appends `point` with the next sequence number, keeping its leaf flag.
    ///
    pub fn insert(&mut self, mut point: GridPoint) -> Result<usize, SGError>
    {
        self.check_point(&point)?;
        if self.contains(&point)
        {
            return Err(SGError::DuplicatePoint);
        }
        // make sure our is_inner flag is up-to-date...
        point.flags.update_is_inner(&point.level);
        let seq = self.flags.len();
        self.flags.push(point.flags);
        self.index.extend_from_slice(&point.index);
        self.level.extend_from_slice(&point.level);
        self.map.entry(point.key_hash()).or_default().push(seq as u32);
        Ok(seq)
    }

    ///
    /// Inserts `point` and keeps the leaf property consistent around it: the
    /// new point is a leaf iff none of its children exist yet, and every
    /// existing parent (including level-zero anchors of a level-one
    /// coordinate) loses its leaf flag.
    ///
    pub fn insert_linked(&mut self, mut point: GridPoint) -> Result<usize, SGError>
    {
        self.check_point(&point)?;
        let has_children = self.has_children(&point);
        point.set_is_leaf(!has_children);
        let seq = self.insert(point.clone())?;
        for dim in 0..self.dim
        {
            let (level, index) = point.get(dim);
            match level
            {
                0 => {},
                1 =>
                {
                    for anchor in 0..2
                    {
                        point.set(dim, 0, anchor);
                        if let Some(parent) = self.find(&point)
                        {
                            self.flags[parent].set_is_leaf(false);
                        }
                    }
                },
                _ =>
                {
                    if let Some((l, i)) = level_index::parent(level, index)
                    {
                        point.set(dim, l, i);
                        if let Some(parent) = self.find(&point)
                        {
                            self.flags[parent].set_is_leaf(false);
                        }
                    }
                }
            }
            point.set(dim, level, index);
        }
        Ok(seq)
    }

    ///
    /// Overwrites the point stored at `seq`.
    ///
    pub fn update(&mut self, mut point: GridPoint, seq: usize) -> Result<(), SGError>
    {
        if seq >= self.len()
        {
            return Err(SGError::InvalidIndex);
        }
        self.check_point(&point)?;
        if let Some(existing) = self.find(&point)
        {
            if existing != seq
            {
                return Err(SGError::DuplicatePoint);
            }
        }
        self.unregister(seq);
        point.flags.update_is_inner(&point.level);
        let range = seq*self.dim..(seq+1)*self.dim;
        self.index[range.clone()].copy_from_slice(&point.index);
        self.level[range].copy_from_slice(&point.level);
        self.flags[seq] = point.flags;
        self.map.entry(point.key_hash()).or_default().push(seq as u32);
        Ok(())
    }

    fn check_point(&self, point: &GridPoint) -> Result<(), SGError>
    {
        if point.dim() != self.dim
        {
            return Err(SGError::DimensionMismatch);
        }
        point.check_key()
    }

    fn unregister(&mut self, seq: usize)
    {
        let range = seq*self.dim..(seq+1)*self.dim;
        let hash = key_hash(&self.level[range.clone()], &self.index[range]);
        if let Some(bucket) = self.map.get_mut(&hash)
        {
            bucket.retain(|s| *s as usize != seq);
            if bucket.is_empty()
            {
                self.map.remove(&hash);
            }
        }
    }

    ///
    /// Removes the point added last. Only needed when a caller has to undo a
    /// speculative insertion.
    ///
    pub fn delete_last(&mut self) -> Option<GridPoint>
    {
        let seq = self.len().checked_sub(1)?;
        let point = self.point(seq);
        self.unregister(seq);
        self.flags.pop();
        self.index.truncate(seq*self.dim);
        self.level.truncate(seq*self.dim);
        Some(point)
    }

    ///
    /// Removes the points with the given sequence numbers. Survivors keep
    /// their relative order and are renumbered densely; the leaf property of
    /// the whole grid is recomputed afterwards.
    ///
    /// Returns the old sequence numbers of the surviving points, in their
    /// new order.
    ///
    pub fn remove(&mut self, seqs: &[usize]) -> Result<Vec<usize>, SGError>
    {
        let mut removed = vec![false; self.len()];
        for &seq in seqs
        {
            *removed.get_mut(seq).ok_or(SGError::InvalidIndex)? = true;
        }
        let remaining: Vec<usize> = (0..self.len()).filter(|&i| !removed[i]).collect();
        let mut indices = Vec::with_capacity(remaining.len()*self.dim);
        let mut levels = Vec::with_capacity(remaining.len()*self.dim);
        let mut flags = Vec::with_capacity(remaining.len());
        for &i in &remaining
        {
            indices.extend_from_slice(&self.index[i*self.dim..(i+1)*self.dim]);
            levels.extend_from_slice(&self.level[i*self.dim..(i+1)*self.dim]);
            flags.push(self.flags[i]);
        }
        self.index = indices;
        self.level = levels;
        self.flags = flags;
        self.generate_map();
        self.recalc_leaf_property();
        Ok(remaining)
    }

    ///
    /// Empties point arrays and map. The bounding box is kept.
    ///
    pub fn clear(&mut self)
    {
        self.index.clear();
        self.level.clear();
        self.flags.clear();
        self.map.clear();
    }

    pub fn generate_map(&mut self)
    {
        let mut map = FastU64Map::<SeqBucket>::default();
        for seq in 0..self.len()
        {
            let range = seq*self.dim..(seq+1)*self.dim;
            map.entry(key_hash(&self.level[range.clone()], &self.index[range])).or_default().push(seq as u32);
        }
        self.map = map;
    }

    ///
    /// True if any child of `point` (in any dimension) is stored.
    ///
    pub fn has_children(&self, point: &GridPoint) -> bool
    {
        let mut iterator = HashGridIterator::new(self, point.clone());
        for dim in 0..self.dim
        {
            let (level, index) = point.get(dim);
            if iterator.left_child(dim) && iterator.seq().is_some()
            {
                return true;
            }
            iterator.set(dim, level, index);
            if level > 0 && iterator.right_child(dim) && iterator.seq().is_some()
            {
                return true;
            }
            iterator.set(dim, level, index);
        }
        false
    }

    ///
    /// Recomputes the leaf flag of every point from the existence of its
    /// children.
    ///
    pub fn recalc_leaf_property(&mut self)
    {
        let leaves: Vec<bool> = (0..self.len()).map(|seq| !self.has_children(&self.point(seq))).collect();
        for (flags, is_leaf) in self.flags.iter_mut().zip(leaves)
        {
            flags.set_is_leaf(is_leaf);
        }
    }

    ///
    /// True if every stored leaf flag agrees with the existence of children.
    ///
    pub fn is_leaf_property_consistent(&self) -> bool
    {
        (0..self.len()).all(|seq| self.is_leaf(seq) != self.has_children(&self.point(seq)))
    }

    pub fn algorithmic_dimensions(&self) -> &[usize]
    {
        &self.algorithmic_dims
    }

    ///
    /// Sets the dimensions in which operators sweep.
    ///
    pub fn set_algorithmic_dimensions(&mut self, dims: Vec<usize>) -> Result<(), SGError>
    {
        if dims.len() > self.dim || dims.iter().any(|&d| d >= self.dim)
        {
            return Err(SGError::DimensionMismatch);
        }
        self.algorithmic_dims = dims;
        Ok(())
    }

    ///
    /// Return the nodes in the grid...
    ///
    pub fn nodes(&self) -> NodeIterator<'_> {
        NodeIterator::new(self)
    }

    ///
    /// Return the real coordinates for each node...
    ///
    pub fn points(&self) -> PointIterator<'_>
    {
        PointIterator::new(self)
    }

    pub fn unit_coordinate(&self, seq: usize) -> Vec<f64>
    {
        let mut coor = vec![0.0; self.dim];
        #[allow(clippy::needless_range_loop)]
        for d in 0..self.dim
        {
            coor[d] = level_index::unit_coordinate(self.level[seq*self.dim + d], self.index[seq*self.dim + d]);
        }
        coor
    }

    pub fn real_coordinate(&self, seq: usize) -> Vec<f64>
    {
        let mut point = self.unit_coordinate(seq);
        self.bounding_box.to_real_coordinate_in_place(&mut point);
        point
    }

    ///
    /// Unit coordinates of all points, row-major by sequence number, computed
    /// in parallel. The storage stays borrowed immutably for the whole call.
    ///
    #[cfg(feature = "rayon")]
    pub fn par_unit_coordinates(&self) -> Vec<f64>
    {
        use rayon::{iter::{IndexedParallelIterator, ParallelIterator}, slice::ParallelSliceMut};
        let mut coordinates = vec![0.0; self.len()*self.dim];
        if self.dim == 0
        {
            return coordinates;
        }
        coordinates.par_chunks_exact_mut(self.dim).enumerate().for_each(|(seq, coor)|
        {
            coor.copy_from_slice(&self.unit_coordinate(seq));
        });
        coordinates
    }

    ///
    /// Structure-of-arrays export for evaluation kernels: `2^level` and
    /// `index` per point and dimension, row-major by sequence number.
    ///
    pub fn level_index_arrays(&self) -> (Vec<f64>, Vec<f64>)
    {
        let level = self.level.iter().map(|&l| (1u64 << l) as f64).collect();
        let index = self.index.iter().map(|&i| i as f64).collect();
        (level, index)
    }

    #[inline]
    pub fn bounding_box(&self) -> &BoundingBox
    {
        &self.bounding_box
    }
    #[inline]
    pub fn bounding_box_mut(&mut self) -> &mut BoundingBox
    {
        &mut self.bounding_box
    }
}

pub struct NodeIterator<'a> {
    storage: &'a HashGridStorage,
    current_seq: usize,
}
impl<'a> NodeIterator<'a>
{
    pub fn new( storage: &'a HashGridStorage) -> Self
    {
        Self { storage, current_seq: 0 }
    }
}

impl<'a> Iterator for NodeIterator<'a> {
    type Item = GridPointRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_seq < self.storage.len() {
            self.current_seq += 1;
            Some(self.storage.point_ref(self.current_seq - 1))
        } else {
            None
        }
    }
}

pub struct PointIterator<'a> {
    pub storage: &'a HashGridStorage,
    current_seq: usize,
}
impl<'a> PointIterator<'a>
{
    pub fn new( storage: &'a HashGridStorage) -> Self
    {
        Self { storage, current_seq: 0 }
    }
}

impl Iterator for PointIterator<'_> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_seq < self.storage.len() {
            let point = self.storage.real_coordinate(self.current_seq);
            self.current_seq += 1;
            Some(point)
        } else {
            None
        }
    }
}
