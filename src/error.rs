//! Crate-wide error aggregation.
//!
//! Each component defines its own error enum (`bson::error::ParseError`,
//! `convert::ConvertError`, `adapter::AdapterError`, `catalog::CatalogError`);
//! this type lets a caller hold just one error type end to end while still
//! being able to match on the underlying kind via `source()`/`From`.

use crate::adapter::AdapterError;
use crate::bson::error::ParseError;
use crate::catalog::CatalogError;
use crate::convert::ConvertError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
