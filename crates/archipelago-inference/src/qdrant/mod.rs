//! Tag similarity index: Triton embeds tag names, Qdrant stores and searches
//! the vectors per user.

mod inferer;
mod tag_graph;
mod types;

pub use inferer::TritonInferer;
pub use tag_graph::QdrantTagGraph;
pub use types::*;
