//! Schema model: column metadata (C2), table metadata (C3), and the index
//! & constraint builders (C3 helper).

pub mod column;
pub mod defaults;
pub mod index;
pub mod table;

pub use column::{AppDefault, AppType, Codec, Column, ForeignKeyRef, InsertType, Literal, StorageType};
pub use index::{index as index_builder, primary_key, unique, ConstraintDef, IndexDefinition};
pub use table::{Table, TableBuilder};
