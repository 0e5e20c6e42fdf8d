#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("tree is full")]
    TreeFull,

    #[error("leaf index {index} out of bounds (leaf count {len})")]
    IndexOutOfBounds { index: u64, len: u64 },
}
