use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page not found: page_id={0}")]
    PageNotFound(u64),

    #[error("Page overflow: {len} bytes exceeds page capacity of {max}")]
    PageOverflow { len: usize, max: usize },

    #[error("Empty keys are reserved for the sentinel entry")]
    EmptyKey,

    #[error("Key too large: {len} bytes (max {max})")]
    KeyTooLarge { len: usize, max: usize },

    #[error("Value too large: {len} bytes (max {max})")]
    ValueTooLarge { len: usize, max: usize },

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TreeError>;
