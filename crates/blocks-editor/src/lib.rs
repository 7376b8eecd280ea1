mod autocomplete;
mod config;
mod core;
mod dialog;
mod error;
pub mod links;
mod markup;
pub mod message;
mod node;
pub mod normalize;
mod ops;
pub mod path;
mod plugin;
mod plugins;
pub mod query;
mod range_ref;
mod search;
mod transforms;

pub use crate::autocomplete::*;
pub use crate::config::*;
pub use crate::core::*;
pub use crate::dialog::*;
pub use crate::error::*;
pub use crate::markup::*;
pub use crate::message::{BlockMessage, MessageBlock, MessageLeaf, UnknownMessage};
pub use crate::node::*;
pub use crate::normalize::Rewrite;
pub use crate::ops::*;
pub use crate::path::{Path, Point, Range};
pub use crate::plugin::*;
pub use crate::plugins::*;
pub use crate::query::Unit;
pub use crate::range_ref::RangeRef;
pub use crate::search::*;
