use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid stick index {0}; expected 0 or 1")]
    InvalidStick(u8),
}
