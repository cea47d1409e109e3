use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    #[error("invalid ranker configuration: {0}")]
    InvalidConfig(String),
}
