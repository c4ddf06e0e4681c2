//! seedkeep-core - Shared functionality for the seedkeep tools
//!
//! Standard locations on disk and small formatting helpers used when
//! reporting on account files and archives.

pub mod format;
pub mod paths;

pub use paths::Paths;
