use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SGError
{
    /// Refinement or coarsening was requested on a storage without points.
    StorageEmpty,
    /// A generator was asked to fill a storage that already holds points.
    StorageNotEmpty,
    /// The (level, index) key is already present in the storage.
    DuplicatePoint,
    InvalidIndex,
    DimensionMismatch,
    InvalidLevel,
    InvalidParameter,
    UnsupportedGridType,
    NotImplemented,
    NumberOfPointsAndValuesMismatch,
    SerializationFailed,
    DeserializationFailed,
    UnsupportedVersion,
    LZ4DecompressionFailed,
    ReadBufferFailed,
    WriteBufferFailed,
    FileIOError,
}
impl std::error::Error for SGError {}

impl Display for SGError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self)
    }
}
