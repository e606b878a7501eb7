mod core;
mod error;
mod node;
mod ops;
mod plugin;
mod schema;

pub mod commands;
pub mod location;
pub mod normalize;
pub mod query;
pub mod transforms;

pub use crate::commands::Command;
pub use crate::core::*;
pub use crate::error::*;
pub use crate::location::{Affinity, Path, Point, Selection};
pub use crate::node::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::query::BlockAttr;
pub use crate::schema::*;
pub use crate::transforms::{Draft, Edge, MatchMode, Mutation, NodeMatch, PropsPatch, Scope};
