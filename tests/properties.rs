//! Property tests of grid invariants under random adaptivity sequences.

use std::collections::HashSet;

use proptest::prelude::*;
use sgstore::refinement::user_defined::{UserDefinedCoarseningFunctor, UserDefinedRefinementFunctor};
use sgstore::{Grid, GridConfig, GridType, HashGridStorage, SerializationFormat};

/// Pseudo random score in [0, 1) derived from the point key and a seed.
fn score(storage: &HashGridStorage, seq: usize, seed: u64) -> f64
{
    let mixed = (storage.point(seq).key_hash() ^ seed).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (mixed >> 11) as f64 / (1u64 << 53) as f64
}

fn keys_are_unique(storage: &HashGridStorage) -> bool
{
    let keys: HashSet<(Vec<u8>, Vec<u32>)> = (0..storage.len())
        .map(|seq| { let p = storage.point(seq); (p.levels().to_vec(), p.indices().to_vec()) })
        .collect();
    keys.len() == storage.len()
}

fn grid_types() -> impl Strategy<Value = GridType>
{
    prop_oneof![Just(GridType::Linear), Just(GridType::LinearBoundary), Just(GridType::Periodic)]
}

/// (refine?, seed, k) steps of an adaptivity loop.
fn steps() -> impl Strategy<Value = Vec<(bool, u64, usize)>>
{
    prop::collection::vec((any::<bool>(), any::<u64>(), 1usize..4), 1..6)
}

fn adapt(grid: &mut Grid, refine: bool, seed: u64, k: usize) -> Result<(), TestCaseError>
{
    let before = grid.len();
    if refine
    {
        let functor = UserDefinedRefinementFunctor::new(move |s: &HashGridStorage, seq: usize| score(s, seq, seed), k, 0.0);
        let added = grid.refine(&functor).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(added.start, before);
        prop_assert_eq!(added.end, grid.len());
        prop_assert!(grid.len() >= before);
    }
    else
    {
        let mut alpha: Vec<f64> = (0..grid.len()).map(|seq| seq as f64).collect();
        let functor = UserDefinedCoarseningFunctor::new(move |s: &HashGridStorage, seq: usize| score(s, seq, seed), k, 0.7);
        // the first point is protected so the grid never runs empty
        let result = grid.coarsen_n_first_only(&functor, &mut alpha, 1).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(grid.len(), before - result.removed_seq.len());
        prop_assert!(result.removed_seq.len() <= k);
        for point in &result.removed_points
        {
            prop_assert!(!grid.storage().contains(point));
        }
        // coefficients follow the renumbering
        let expected: Vec<f64> = result.remaining.iter().map(|&old| old as f64).collect();
        prop_assert_eq!(alpha, expected);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn adaptivity_keeps_keys_unique_and_leaves_consistent(grid_type in grid_types(), dim in 1usize..4, level in 1u8..4, steps in steps()) {
        let mut grid = Grid::new(GridConfig::new(grid_type, dim)).unwrap();
        grid.regular(level).unwrap();
        for (refine, seed, k) in steps
        {
            adapt(&mut grid, refine, seed, k)?;
            prop_assert!(keys_are_unique(grid.storage()));
            prop_assert!(grid.storage().is_leaf_property_consistent());
        }
    }

    #[test]
    fn serialization_round_trips(grid_type in grid_types(), dim in 1usize..4, level in 1u8..4, steps in steps()) {
        let mut grid = Grid::new(GridConfig::new(grid_type, dim)).unwrap();
        grid.regular(level).unwrap();
        for (refine, seed, k) in steps
        {
            adapt(&mut grid, refine, seed, k)?;
        }
        let from_text = Grid::unserialize(&grid.serialize()).unwrap();
        let from_bytes = Grid::from_bytes(&grid.to_bytes(SerializationFormat::BincodeLz4).unwrap(), SerializationFormat::BincodeLz4).unwrap();
        for restored in [from_text, from_bytes]
        {
            prop_assert_eq!(restored.len(), grid.len());
            for seq in 0..grid.len()
            {
                prop_assert_eq!(restored.storage().point(seq), grid.storage().point(seq));
                prop_assert_eq!(restored.storage().is_leaf(seq), grid.storage().is_leaf(seq));
            }
        }
    }

    #[test]
    fn prewavelet_shadow_stays_disjoint(dim in 1usize..4, seeds in prop::collection::vec(any::<u64>(), 1..4)) {
        let mut grid = Grid::new(GridConfig::new(GridType::Prewavelet, dim)).unwrap();
        grid.regular(2).unwrap();
        for seed in seeds
        {
            let functor = UserDefinedRefinementFunctor::new(move |s: &HashGridStorage, seq: usize| score(s, seq, seed), 2, 0.0);
            grid.refine(&functor).unwrap();
            let shadow = grid.shadow_storage();
            prop_assert!((0..shadow.len()).all(|seq| !grid.storage().contains(&shadow.point(seq))));
            prop_assert!(keys_are_unique(shadow));
        }
    }
}
