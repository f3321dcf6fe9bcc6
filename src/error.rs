//! Error taxonomy for the extraction and identification pipeline.
//!
//! `NoSolution` is deliberately absent: an identification that finds no
//! consistent star assignment returns an id list of `-1` markers, not an
//! error.

use thiserror::Error;

/// Errors surfaced by the starcam pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// File missing, truncated, or unreadable.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image container could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed calibration or K-vector catalog text.
    #[error("{path}: {message}")]
    Parse { path: String, message: String },

    /// A pipeline stage was invoked with insufficient input
    /// (e.g. fewer than the 4 spots Pyramid requires).
    #[error("{0}")]
    EmptyInput(String),

    /// Identification attempted against an empty feature catalog.
    #[error("feature catalog is empty")]
    EmptyCatalog,
}

pub type Result<T> = std::result::Result<T, Error>;
