use crate::storage::GridPoint;

///
/// Enumerates every point of one hierarchical subspace `W_l`: all odd
/// indices below `2^l` per direction, both anchors for level zero. The
/// first direction varies fastest.
///
pub struct SubspaceIterator
{
    levels: Vec<u8>,
    index: Vec<u32>,
    done: bool,
}

#[inline]
fn first_index(level: u8) -> u32
{
    if level == 0 { 0 } else { 1 }
}

#[inline]
fn last_index(level: u8) -> u32
{
    if level == 0 { 1 } else { ((1u64 << level) - 1) as u32 }
}

impl SubspaceIterator
{
    pub fn new(levels: &[u8]) -> Self
    {
        Self { levels: levels.to_vec(), index: levels.iter().map(|&l| first_index(l)).collect(), done: levels.is_empty() }
    }

    /// Number of points in the subspace.
    pub fn subspace_size(levels: &[u8]) -> usize
    {
        levels.iter().map(|&l| if l == 0 { 2 } else { 1usize << (l - 1) }).product()
    }
}

impl Iterator for SubspaceIterator
{
    type Item = GridPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done
        {
            return None;
        }
        let point = GridPoint::new(&self.levels, &self.index, false);
        // advance the odometer
        let mut d = 0;
        loop
        {
            if d == self.levels.len()
            {
                self.done = true;
                break;
            }
            let l = self.levels[d];
            if self.index[d] < last_index(l)
            {
                self.index[d] += if l == 0 { 1 } else { 2 };
                break;
            }
            self.index[d] = first_index(l);
            d += 1;
        }
        Some(point)
    }
}

#[test]
fn test_subspace_enumeration()
{
    let points: Vec<_> = SubspaceIterator::new(&[2, 0]).collect();
    assert_eq!(points.len(), SubspaceIterator::subspace_size(&[2, 0]));
    let keys: Vec<_> = points.iter().map(|p| (p.get(0), p.get(1))).collect();
    assert_eq!(keys, vec![((2, 1), (0, 0)), ((2, 3), (0, 0)), ((2, 1), (0, 1)), ((2, 3), (0, 1))]);
    assert_eq!(SubspaceIterator::new(&[3]).count(), 4);
    assert_eq!(SubspaceIterator::new(&[]).count(), 0);
}
