use std::result;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not a Mach-O file (magic {magic:#010x})")]
    NotMachO { magic: u32 },

    #[error("malformed Mach-O: {0}")]
    Malformed(String),

    #[error("load commands of header {header} need {needed} bytes but only {available} are free")]
    InsufficientSpace {
        header: usize,
        needed: u64,
        available: u64,
    },

    #[error("invalid replacement path `{0}`")]
    InvalidPath(String),

    #[error("invalid dependency pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to read or write Mach-O file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

pub type Result<T> = result::Result<T, Error>;
