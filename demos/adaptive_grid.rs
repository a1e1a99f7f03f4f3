use sgstore::{errors::SGError, refinement::user_defined::{UserDefinedCoarseningFunctor, UserDefinedRefinementFunctor},
    storage::HashGridStorage, BoundingBox, Grid, GridConfig, GridType, SerializationFormat};

/// Gaussian peak centred in the domain.
fn peak(x: &[f64]) -> f64
{
    let r2: f64 = x.iter().map(|xi| (xi - 0.3) * (xi - 0.3)).sum();
    libm::exp(-40.0 * r2)
}

///
/// Local error indicator: second difference of `peak` at the point with the
/// point's own mesh width, summed over all directions.
///
fn indicator(storage: &HashGridStorage, seq: usize) -> f64
{
    let x = storage.real_coordinate(seq);
    let centre = peak(&x);
    (0..storage.dim()).map(|d|
    {
        let h = storage.bounding_box().width(d) / (1u64 << storage.level(seq, d)) as f64;
        let mut left = x.clone();
        let mut right = x.clone();
        left[d] -= h;
        right[d] += h;
        (centre - 0.5 * (peak(&left) + peak(&right))).abs()
    }).sum()
}

fn adapt(grid_type: GridType, dim: usize) -> Result<(), SGError>
{
    println!("\nRunning adaptive {:?} grid in {dim}D\n", grid_type);
    let config = GridConfig::new(grid_type, dim);
    let mut grid = Grid::with_bounding_box(config, BoundingBox::new(&vec![-1.0; dim], &vec![1.0; dim]))?;
    grid.regular(3)?;
    println!("Number of points: {}", grid.len());
    let regular_size = grid.len();

    let refine = UserDefinedRefinementFunctor::new(indicator, 10, 1e-4);
    for iteration in 0..8
    {
        let added = grid.refine(&refine)?;
        println!("iteration {iteration}: added {} points, {} refinable, max level {}",
            added.len(), grid.get_number_of_refinable_points()?, grid.max_level());
        if added.is_empty()
        {
            break;
        }
    }

    if grid_type != GridType::Prewavelet
    {
        let mut alpha: Vec<f64> = (0..grid.len()).map(|seq| indicator(grid.storage(), seq)).collect();
        let coarsen = UserDefinedCoarseningFunctor::new(indicator, 25, 1e-5);
        let result = grid.coarsen_n_first_only(&coarsen, &mut alpha, regular_size)?;
        println!("Removed {} points, {} remain", result.removed_seq.len(), grid.len());
    }
    else
    {
        println!("Shadow points: {}", grid.shadow_storage().len());
    }

    let path = std::env::temp_dir().join(format!("adaptive_{}_{dim}d.sg", grid_type.name()));
    let path = path.to_str().ok_or(SGError::FileIOError)?;
    grid.write(path, SerializationFormat::BincodeLz4)?;
    let restored = Grid::read(std::fs::File::open(path).map_err(|_| SGError::FileIOError)?, SerializationFormat::BincodeLz4)?;
    println!("Restored {} points from {path}", restored.len());
    Ok(())
}

fn main()
{
    adapt(GridType::Linear, 2).unwrap();
    adapt(GridType::LinearBoundary, 2).unwrap();
    adapt(GridType::Prewavelet, 3).unwrap();
}
