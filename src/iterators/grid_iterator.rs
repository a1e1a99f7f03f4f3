use crate::level_index;
use crate::storage::{GridPoint, HashGridStorage};

///
/// Cursor navigating the (level, index) hierarchy of a storage.
///
/// Moves are pure key arithmetic and return `false` only when the move is
/// impossible (no parent, level overflow); whether the new key is stored is
/// a separate question answered by [`GridIteratorT::seq`].
///
pub trait GridIteratorT
{
    fn point(&self) -> &GridPoint;
    fn get(&self, dim: usize) -> (u8, u32);
    fn set(&mut self, dim: usize, level: u8, index: u32);
    fn seq(&self) -> Option<usize>;
    fn hint(&self) -> bool;
    fn left_child(&mut self, dim: usize) -> bool;
    fn right_child(&mut self, dim: usize) -> bool;
    fn up(&mut self, dim: usize) -> bool;
    fn top(&mut self, dim: usize);
    fn left_level_zero(&mut self, dim: usize);
    fn right_level_zero(&mut self, dim: usize);
    fn reset_to_level_zero(&mut self);
    fn reset_to_level_one(&mut self);
    fn is_inner_point(&self) -> bool;
}

pub struct HashGridIterator<'a>
{
    pub(crate) storage: &'a HashGridStorage,
    point: GridPoint,
}

impl<'a> HashGridIterator<'a>
{
    pub fn new(storage: &'a HashGridStorage, point: GridPoint) -> Self
    {
        Self { storage, point }
    }

    ///
    /// Iterator positioned at `(1,1)` in every dimension.
    ///
    pub fn at_root(storage: &'a HashGridStorage) -> Self
    {
        Self { storage, point: GridPoint::root(storage.dim()) }
    }

    pub fn set_point(&mut self, point: GridPoint)
    {
        self.point = point;
    }

    pub fn into_point(self) -> GridPoint
    {
        self.point
    }
}

impl GridIteratorT for HashGridIterator<'_>
{
    #[inline(always)]
    fn point(&self) -> &GridPoint
    {
        &self.point
    }

    #[inline]
    fn get(&self, dim: usize) -> (u8, u32)
    {
        self.point.get(dim)
    }

    #[inline]
    fn set(&mut self, dim: usize, level: u8, index: u32)
    {
        self.point.set(dim, level, index);
    }

    #[inline]
    fn seq(&self) -> Option<usize>
    {
        self.storage.find(&self.point)
    }

    ///
    /// Leaf flag of the stored point under the cursor, `false` if the key is
    /// not stored.
    ///
    fn hint(&self) -> bool
    {
        self.seq().is_some_and(|seq| self.storage.is_leaf(seq))
    }

    fn left_child(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.point.get(dim);
        match level_index::left_child(l, i)
        {
            Some((l, i)) => { self.point.set(dim, l, i); true },
            None => false
        }
    }

    fn right_child(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.point.get(dim);
        match level_index::right_child(l, i)
        {
            Some((l, i)) => { self.point.set(dim, l, i); true },
            None => false
        }
    }

    fn up(&mut self, dim: usize) -> bool
    {
        let (l, i) = self.point.get(dim);
        match level_index::parent(l, i)
        {
            Some((l, i)) => { self.point.set(dim, l, i); true },
            None => false
        }
    }

    fn top(&mut self, dim: usize)
    {
        self.point.set(dim, 1, 1);
    }

    fn left_level_zero(&mut self, dim: usize)
    {
        self.point.set(dim, 0, 0);
    }

    fn right_level_zero(&mut self, dim: usize)
    {
        self.point.set(dim, 0, 1);
    }

    fn reset_to_level_zero(&mut self)
    {
        self.point = GridPoint::zero_index(self.storage.dim());
    }

    fn reset_to_level_one(&mut self)
    {
        self.point = GridPoint::root(self.storage.dim());
    }

    fn is_inner_point(&self) -> bool
    {
        self.point.is_inner_point()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn storage_2d() -> HashGridStorage
    {
        let mut storage = HashGridStorage::new(2);
        storage.insert_linked(GridPoint::root(2)).unwrap();
        storage.insert_linked(GridPoint::new(&[2, 1], &[1, 1], false)).unwrap();
        storage.insert_linked(GridPoint::new(&[0, 1], &[1, 1], false)).unwrap();
        storage
    }

    #[test]
    fn test_navigation_is_key_arithmetic()
    {
        let storage = storage_2d();
        let mut iterator = HashGridIterator::at_root(&storage);
        assert_eq!(iterator.seq(), Some(0));
        assert!(!iterator.hint());
        assert!(iterator.left_child(0));
        assert_eq!(iterator.get(0), (2, 1));
        assert_eq!(iterator.seq(), Some(1));
        assert!(iterator.hint());
        assert!(iterator.right_child(1));
        assert_eq!(iterator.get(1), (2, 3));
        assert_eq!(iterator.seq(), None);
        assert!(!iterator.hint());
        assert!(iterator.up(1));
        assert!(!iterator.up(1));
        assert_eq!(iterator.get(1), (1, 1));
        assert_eq!(iterator.seq(), Some(1));
    }

    #[test]
    fn test_level_zero_moves()
    {
        let storage = storage_2d();
        let mut iterator = HashGridIterator::at_root(&storage);
        iterator.right_level_zero(0);
        assert_eq!(iterator.seq(), Some(2));
        assert!(!iterator.is_inner_point());
        iterator.left_level_zero(0);
        assert_eq!(iterator.seq(), None);
        assert!(iterator.left_child(0));
        assert_eq!(iterator.get(0), (1, 1));
        iterator.reset_to_level_zero();
        assert_eq!(iterator.point().levels(), &[0, 0]);
        iterator.reset_to_level_one();
        iterator.top(0);
        assert_eq!(iterator.seq(), Some(0));
    }
}
