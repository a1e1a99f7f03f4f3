use criterion::{criterion_group, criterion_main, Criterion};
use sgstore::{errors::SGError, refinement::surplus::{SurplusCoarseningFunctor, SurplusRefinementFunctor}, Grid, GridConfig, GridType};

fn build_grid(grid_type: GridType, dim: usize, level: u8) -> Result<(Grid, Vec<f64>), SGError>
{
    let mut grid = Grid::new(GridConfig::new(grid_type, dim))?;
    grid.regular(level)?;
    // surplus proxy decaying with the level sum
    let alpha = (0..grid.len()).map(|seq| 0.5f64.powi(grid.storage().level_sum(seq) as i32)).collect();
    Ok((grid, alpha))
}

fn refine_six_d(c: &mut Criterion)
{
    let (grid, alpha) = build_grid(GridType::Linear, 6, 4).unwrap();
    c.bench_function("refine 6d", |b| b.iter(||
    {
        let mut grid = grid.clone();
        let functor = SurplusRefinementFunctor::new(&alpha, 50, 0.0);
        grid.refine(&functor).unwrap()
    }));
}

fn coarsen_boundary_three_d(c: &mut Criterion)
{
    let (grid, alpha) = build_grid(GridType::LinearBoundary, 3, 5).unwrap();
    c.bench_function("coarsen boundary 3d", |b| b.iter(||
    {
        let mut grid = grid.clone();
        let mut alpha = alpha.clone();
        let scores = alpha.clone();
        let functor = SurplusCoarseningFunctor::new(&scores, 50, 1.0);
        grid.coarsen(&functor, &mut alpha).unwrap()
    }));
}

fn prewavelet_refine(c: &mut Criterion)
{
    let (grid, alpha) = build_grid(GridType::Prewavelet, 3, 4).unwrap();
    c.bench_function("prewavelet refine 3d", |b| b.iter(||
    {
        let mut grid = grid.clone();
        let functor = SurplusRefinementFunctor::new(&alpha, 10, 0.0);
        grid.refine(&functor).unwrap()
    }));
}

criterion_group!(benches, refine_six_d, coarsen_boundary_three_d, prewavelet_refine);
criterion_main!(benches);
