//! Chunking: identifiers, key ranges, and the range splitter.

pub mod id;
pub mod range;
pub mod split;

pub use id::ChunkId;
pub use range::{Chunk, ChunkRange};
pub use split::{calculate_chunk_size, split_table};
