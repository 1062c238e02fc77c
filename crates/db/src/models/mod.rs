//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - Typed helpers over the raw status/type ids

pub mod asset;
pub mod project;
pub mod scene;
pub mod shot_list;
pub mod status;
