use std::io;
use thiserror::Error;

/// Errors produced while mounting or reading a UDF volume.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    BadFormat(&'static str),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
