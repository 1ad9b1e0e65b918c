//! Schema snapshot & diff engine (C9)

pub mod diff;
pub mod snapshot;

pub use diff::{diff, Migration};
pub use snapshot::{build_snapshot, SerColumn, SerConstraint, SerIndex, SerLiteral, TableSnapshot};
