use std::io::Write;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithms::coarsening::{CoarseningFunctor, CoarseningResult, HashCoarsening};
use crate::algorithms::prewavelet::PrewaveletGridGenerator;
use crate::algorithms::refinement::{HashRefinement, RefinementFunctor};
use crate::errors::SGError;
use crate::generators::HashGenerator;
use crate::serialization::{self, SerializationFormat};
use crate::storage::{BoundingBox, HashGridStorage};

///
/// Kind of grid managed by [`Grid`]. Decides which generator and which
/// refinement flavour is used.
///
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridType
{
    #[default]
    Linear,
    /// Linear grid with level-zero boundary points, truncated by
    /// [`GridConfig::boundary_level`].
    LinearBoundary,
    Periodic,
    Prewavelet,
}

impl GridType
{
    pub fn name(&self) -> &'static str
    {
        match self
        {
            GridType::Linear => "linear",
            GridType::LinearBoundary => "linearBoundary",
            GridType::Periodic => "periodic",
            GridType::Prewavelet => "prewavelet",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, SGError>
    {
        match name
        {
            "linear" => Ok(GridType::Linear),
            "linearBoundary" => Ok(GridType::LinearBoundary),
            "periodic" => Ok(GridType::Periodic),
            "prewavelet" => Ok(GridType::Prewavelet),
            _ => Err(SGError::UnsupportedGridType),
        }
    }

    pub fn has_boundary(&self) -> bool
    {
        matches!(self, GridType::LinearBoundary | GridType::Periodic)
    }
}

///
/// Caller owned grid configuration.
///
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig
{
    pub grid_type: GridType,
    pub dim: usize,
    /// Level from which boundary subspaces are included; 0 keeps every
    /// boundary subspace of the level sum. Only used by `LinearBoundary`.
    pub boundary_level: u8,
    /// Upper bound on the level of refined points.
    pub max_level: Option<u8>,
}

impl Default for GridConfig
{
    fn default() -> Self {
        Self { grid_type: GridType::Linear, dim: 1, boundary_level: 1, max_level: None }
    }
}

impl GridConfig
{
    pub fn new(grid_type: GridType, dim: usize) -> Self
    {
        Self { grid_type, dim, ..Default::default() }
    }

    pub fn with_boundary_level(mut self, boundary_level: u8) -> Self
    {
        self.boundary_level = boundary_level;
        self
    }

    pub fn with_max_level(mut self, max_level: u8) -> Self
    {
        self.max_level = Some(max_level);
        self
    }
}

///
/// An adaptive sparse grid: point storage plus the entry points used by
/// adaptivity loops. Prewavelet grids also own their shadow storage.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Grid
{
    config: GridConfig,
    storage: HashGridStorage,
    shadow_storage: HashGridStorage,
}

impl Grid
{
    pub fn new(config: GridConfig) -> Result<Self, SGError>
    {
        if config.dim == 0
        {
            return Err(SGError::InvalidParameter);
        }
        Ok(Self { config, storage: HashGridStorage::new(config.dim), shadow_storage: HashGridStorage::new(config.dim) })
    }

    pub fn with_bounding_box(config: GridConfig, bounding_box: BoundingBox) -> Result<Self, SGError>
    {
        if bounding_box.dim() != config.dim
        {
            return Err(SGError::DimensionMismatch);
        }
        let mut grid = Self::new(config)?;
        *grid.storage.bounding_box_mut() = bounding_box;
        Ok(grid)
    }

    pub fn config(&self) -> &GridConfig
    {
        &self.config
    }

    pub fn grid_type(&self) -> GridType
    {
        self.config.grid_type
    }

    pub fn dim(&self) -> usize
    {
        self.config.dim
    }

    pub fn len(&self) -> usize
    {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.storage.is_empty()
    }

    pub fn storage(&self) -> &HashGridStorage
    {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut HashGridStorage
    {
        &mut self.storage
    }

    ///
    /// Ghost points of a prewavelet grid. Always empty for other types.
    ///
    pub fn shadow_storage(&self) -> &HashGridStorage
    {
        &self.shadow_storage
    }

    pub fn max_level(&self) -> u8
    {
        self.storage.max_level()
    }

    fn prewavelet(&mut self) -> PrewaveletGridGenerator<'_>
    {
        PrewaveletGridGenerator::new(&mut self.storage, &mut self.shadow_storage)
    }

    ///
    /// Fills the empty grid with the regular sparse grid of `level`.
    ///
    pub fn regular(&mut self, level: u8) -> Result<(), SGError>
    {
        match self.config.grid_type
        {
            GridType::Linear => HashGenerator.regular(&mut self.storage, level, None),
            GridType::LinearBoundary => HashGenerator.regular_with_boundaries(&mut self.storage, level, self.config.boundary_level, None),
            GridType::Periodic => HashGenerator.regular_with_periodic_boundaries(&mut self.storage, level, None),
            GridType::Prewavelet => self.prewavelet().regular(level),
        }
    }

    pub fn full(&mut self, level: u8) -> Result<(), SGError>
    {
        match self.config.grid_type
        {
            GridType::Linear => HashGenerator.full(&mut self.storage, level),
            GridType::LinearBoundary => HashGenerator.full_with_boundaries(&mut self.storage, level),
            GridType::Prewavelet => self.prewavelet().full(level),
            GridType::Periodic => Err(SGError::UnsupportedGridType),
        }
    }

    pub fn cliques(&mut self, level: u8, clique_size: usize) -> Result<(), SGError>
    {
        match self.config.grid_type
        {
            GridType::Linear => HashGenerator.cliques(&mut self.storage, level, clique_size, None),
            _ => Err(SGError::UnsupportedGridType),
        }
    }

    fn refinement(&self) -> HashRefinement
    {
        HashRefinement(self.config.grid_type == GridType::LinearBoundary)
    }

    ///
    /// One refinement step. Returns the range of new sequence numbers; the
    /// caller extends its coefficient vector accordingly.
    ///
    pub fn refine(&mut self, functor: &dyn RefinementFunctor) -> Result<Range<usize>, SGError>
    {
        let added = match (self.config.grid_type, self.config.max_level)
        {
            (GridType::Prewavelet, Some(_)) => return Err(SGError::NotImplemented),
            (GridType::Prewavelet, None) => self.prewavelet().refine(functor)?,
            (_, Some(max_level)) => self.refinement().refine_max_level(&mut self.storage, functor, max_level)?,
            (_, None) => self.refinement().free_refine(&mut self.storage, functor)?,
        };
        debug!(grid_type = self.config.grid_type.name(), added = added.len(), size = self.len(), "grid refined");
        Ok(added)
    }

    fn check_coefficients(&self, alpha: &[f64]) -> Result<(), SGError>
    {
        if self.config.grid_type == GridType::Prewavelet
        {
            return Err(SGError::NotImplemented);
        }
        if alpha.len() != self.len()
        {
            return Err(SGError::NumberOfPointsAndValuesMismatch);
        }
        Ok(())
    }

    ///
    /// One coarsening step. `alpha` must be aligned with the storage and is
    /// compacted alongside it.
    ///
    pub fn coarsen(&mut self, functor: &dyn CoarseningFunctor, alpha: &mut Vec<f64>) -> Result<CoarseningResult, SGError>
    {
        self.check_coefficients(alpha)?;
        let result = HashCoarsening.free_coarsen(&mut self.storage, functor)?;
        result.compact(alpha);
        Ok(result)
    }

    ///
    /// Coarsening that never touches the first `num_first_only` points.
    ///
    pub fn coarsen_n_first_only(&mut self, functor: &dyn CoarseningFunctor, alpha: &mut Vec<f64>, num_first_only: usize) -> Result<CoarseningResult, SGError>
    {
        self.check_coefficients(alpha)?;
        let result = HashCoarsening.coarsen_n_first_only(&mut self.storage, functor, num_first_only)?;
        result.compact(alpha);
        Ok(result)
    }

    pub fn get_number_of_refinable_points(&self) -> Result<usize, SGError>
    {
        self.refinement().get_number_of_refinable_points(&self.storage)
    }

    pub fn get_number_of_removable_points(&self) -> Result<usize, SGError>
    {
        HashCoarsening.get_number_of_removable_points(&self.storage)
    }

    ///
    /// Text form of the grid: a header line with grid type, boundary level
    /// and maximum level (`-` if unbounded), followed by the storage and, for
    /// prewavelet grids, the shadow storage.
    ///
    pub fn serialize(&self) -> String
    {
        let max_level = self.config.max_level.map_or_else(|| "-".to_string(), |l| l.to_string());
        let mut text = format!("{} {} {}\n", self.config.grid_type.name(), self.config.boundary_level, max_level);
        text.push_str(&serialization::storage_to_string(&self.storage));
        if self.config.grid_type == GridType::Prewavelet
        {
            text.push_str(&serialization::storage_to_string(&self.shadow_storage));
        }
        text
    }

    ///
    /// Rebuilds a grid from [`Grid::serialize`] output.
    ///
    pub fn unserialize(text: &str) -> Result<Self, SGError>
    {
        let mut tokens = text.split_whitespace();
        let grid_type = GridType::from_name(tokens.next().ok_or(SGError::DeserializationFailed)?)?;
        let boundary_level: u8 = serialization::next_token(&mut tokens)?;
        let max_level = match tokens.next().ok_or(SGError::DeserializationFailed)?
        {
            "-" => None,
            level => Some(level.parse::<u8>().map_err(|_| SGError::DeserializationFailed)?),
        };
        let storage = serialization::read_storage(&mut tokens)?;
        let shadow_storage = if grid_type == GridType::Prewavelet
        {
            let shadow = serialization::read_storage(&mut tokens)?;
            if shadow.dim() != storage.dim()
            {
                return Err(SGError::DimensionMismatch);
            }
            shadow
        }
        else
        {
            HashGridStorage::new(storage.dim())
        };
        if tokens.next().is_some()
        {
            return Err(SGError::DeserializationFailed);
        }
        let config = GridConfig { grid_type, dim: storage.dim(), boundary_level, max_level };
        let grid = Self { config, storage, shadow_storage };
        grid.check_shadow()?;
        Ok(grid)
    }

    ///
    /// The shadow storage holds only points absent from the grid, and only
    /// prewavelet grids carry one.
    ///
    fn check_shadow(&self) -> Result<(), SGError>
    {
        if self.config.grid_type != GridType::Prewavelet && !self.shadow_storage.is_empty()
        {
            return Err(SGError::DeserializationFailed);
        }
        if (0..self.shadow_storage.len()).any(|seq| self.storage.contains(&self.shadow_storage.point(seq)))
        {
            return Err(SGError::DeserializationFailed);
        }
        Ok(())
    }

    pub fn to_bytes(&self, format: SerializationFormat) -> Result<Vec<u8>, SGError>
    {
        serialization::serialize(self, format)
    }

    pub fn from_bytes(buffer: &[u8], format: SerializationFormat) -> Result<Self, SGError>
    {
        let grid: Self = serialization::deserialize(buffer, format)?;
        if grid.config.dim != grid.storage.dim() || grid.shadow_storage.dim() != grid.storage.dim()
        {
            return Err(SGError::DimensionMismatch);
        }
        grid.check_shadow()?;
        Ok(grid)
    }

    ///
    /// Writes the grid to `path` in the given format.
    ///
    pub fn write(&self, path: &str, format: SerializationFormat) -> Result<(), SGError>
    {
        let mut file = std::io::BufWriter::new(std::fs::File::create(path).map_err(|_| SGError::FileIOError)?);
        let buffer = self.to_bytes(format)?;
        file.write_all(&buffer).map_err(|_| SGError::WriteBufferFailed)?;
        file.flush().map_err(|_| SGError::WriteBufferFailed)?;
        Ok(())
    }

    ///
    /// Reads a grid from a reader.
    ///
    pub fn read<Reader: std::io::Read>(mut reader: Reader, format: SerializationFormat) -> Result<Self, SGError>
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|_| SGError::ReadBufferFailed)?;
        Self::from_bytes(&bytes, format)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::refinement::surplus::{SurplusCoarseningFunctor, SurplusRefinementFunctor};
    use crate::storage::GridPoint;

    #[test]
    fn test_new_rejects_zero_dim()
    {
        assert_eq!(Grid::new(GridConfig::new(GridType::Linear, 0)).unwrap_err(), SGError::InvalidParameter);
        assert_eq!(Grid::with_bounding_box(GridConfig::new(GridType::Linear, 2), BoundingBox::with_dim(3)).unwrap_err(), SGError::DimensionMismatch);
    }

    #[test]
    fn test_regular_per_grid_type()
    {
        let sizes = [(GridType::Linear, 5), (GridType::LinearBoundary, 21), (GridType::Prewavelet, 5)];
        for (grid_type, size) in sizes
        {
            let mut grid = Grid::new(GridConfig::new(grid_type, 2)).unwrap();
            grid.regular(2).unwrap();
            assert_eq!(grid.len(), size, "{:?}", grid_type);
            assert_eq!(grid.regular(2).unwrap_err(), SGError::StorageNotEmpty);
        }
        let mut grid = Grid::new(GridConfig::new(GridType::Periodic, 1)).unwrap();
        grid.regular(2).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid.full(2).unwrap_err(), SGError::UnsupportedGridType);
        assert_eq!(grid.cliques(2, 1).unwrap_err(), SGError::UnsupportedGridType);
    }

    #[test]
    fn test_refine_then_coarsen_keeps_alpha_aligned()
    {
        let mut grid = Grid::new(GridConfig::new(GridType::Linear, 2)).unwrap();
        grid.regular(2).unwrap();
        let mut alpha = vec![1.0, 0.5, 0.5, 0.5, 0.5];
        let added = grid.refine(&SurplusRefinementFunctor::new(&alpha, 1, 0.0)).unwrap();
        assert_eq!(added, 5..9);
        alpha.extend(added.map(|seq| seq as f64 / 100.0));
        assert_eq!(grid.coarsen(&SurplusCoarseningFunctor::new(&alpha, 2, 0.5), &mut vec![0.0]).unwrap_err(), SGError::NumberOfPointsAndValuesMismatch);
        let scores = alpha.clone();
        let functor = SurplusCoarseningFunctor::new(&scores, 2, 0.5);
        let result = grid.coarsen(&functor, &mut alpha).unwrap();
        assert_eq!(result.removed_seq.len(), 2);
        assert_eq!(alpha.len(), grid.len());
        for (seq, &old) in result.remaining.iter().enumerate()
        {
            if old >= 5
            {
                assert_eq!(alpha[seq], old as f64 / 100.0);
            }
        }
        assert!(grid.storage().is_leaf_property_consistent());
    }

    #[test]
    fn test_max_level_caps_refinement()
    {
        let mut grid = Grid::new(GridConfig::new(GridType::Linear, 1).with_max_level(2)).unwrap();
        grid.regular(2).unwrap();
        let alpha = vec![1.0; 3];
        let added = grid.refine(&SurplusRefinementFunctor::new(&alpha, 3, 0.0)).unwrap();
        assert!(added.is_empty());
        assert_eq!(grid.max_level(), 2);

        let mut grid = Grid::new(GridConfig::new(GridType::Prewavelet, 1).with_max_level(2)).unwrap();
        grid.regular(2).unwrap();
        assert_eq!(grid.refine(&SurplusRefinementFunctor::new(&alpha, 3, 0.0)).unwrap_err(), SGError::NotImplemented);
        assert_eq!(grid.coarsen(&SurplusCoarseningFunctor::new(&alpha, 1, 1.0), &mut alpha.clone()).unwrap_err(), SGError::NotImplemented);
    }

    #[test]
    fn test_text_roundtrip()
    {
        let mut grid = Grid::new(GridConfig::new(GridType::Prewavelet, 2)).unwrap();
        grid.regular(2).unwrap();
        let alpha = vec![1.0; grid.len()];
        grid.refine(&SurplusRefinementFunctor::new(&alpha, 1, 0.0)).unwrap();
        assert!(!grid.shadow_storage().is_empty());
        let text = grid.serialize();
        assert!(text.starts_with("prewavelet 1 -\n1 2 "));
        let restored = Grid::unserialize(&text).unwrap();
        assert_eq!(restored.config(), grid.config());
        assert_eq!(restored.len(), grid.len());
        assert_eq!(restored.shadow_storage().len(), grid.shadow_storage().len());
        for seq in 0..grid.len()
        {
            assert_eq!(restored.storage().point(seq), grid.storage().point(seq));
            assert_eq!(restored.storage().is_leaf(seq), grid.storage().is_leaf(seq));
        }
        assert_eq!(Grid::unserialize("sparse 1 -\n").unwrap_err(), SGError::UnsupportedGridType);
    }

    #[test]
    fn test_overlapping_shadow_is_rejected_on_load()
    {
        // (1,1) is both a grid point and a shadow point
        let text = "prewavelet 1 -\n1 1 1\n0 1\n1 1 0\n1 1 1\n0 1\n1 1 1\n";
        assert_eq!(Grid::unserialize(text).unwrap_err(), SGError::DeserializationFailed);
        let text = "prewavelet 1 -\n1 1 1\n0 1\n1 1 0\n1 1 1\n0 1\n2 1 1\n";
        assert_eq!(Grid::unserialize(text).unwrap().shadow_storage().len(), 1);

        let mut grid = Grid::new(GridConfig::new(GridType::Prewavelet, 2)).unwrap();
        grid.regular(2).unwrap();
        let alpha = vec![1.0; grid.len()];
        grid.refine(&SurplusRefinementFunctor::new(&alpha, 1, 0.0)).unwrap();
        let point = grid.storage().point(0);
        grid.shadow_storage.insert(point).unwrap();
        for format in [SerializationFormat::Json, SerializationFormat::Bincode]
        {
            let bytes = grid.to_bytes(format).unwrap();
            assert_eq!(Grid::from_bytes(&bytes, format).unwrap_err(), SGError::DeserializationFailed);
        }

        let mut grid = Grid::new(GridConfig::new(GridType::Linear, 1)).unwrap();
        grid.regular(1).unwrap();
        grid.shadow_storage.insert(GridPoint::new(&[2], &[1], false)).unwrap();
        let bytes = grid.to_bytes(SerializationFormat::Json).unwrap();
        assert_eq!(Grid::from_bytes(&bytes, SerializationFormat::Json).unwrap_err(), SGError::DeserializationFailed);
    }

    #[test]
    fn test_binary_roundtrip()
    {
        let mut grid = Grid::new(GridConfig::new(GridType::LinearBoundary, 2).with_boundary_level(2)).unwrap();
        grid.regular(3).unwrap();
        for format in [SerializationFormat::Json, SerializationFormat::BincodeLz4]
        {
            let bytes = grid.to_bytes(format).unwrap();
            let restored = Grid::read(bytes.as_slice(), format).unwrap();
            assert_eq!(restored.config(), grid.config());
            assert_eq!(restored.len(), grid.len());
            assert_eq!(restored.storage().find(&grid.storage().point(7)), Some(7));
        }
    }
}
