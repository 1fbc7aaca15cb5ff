//!
//! # Chunked Radar Data
//! The near-real-time bucket exposes each in-progress Level-2 volume scan as
//! a common-prefix group (`RRRR/NNN/`). Within a group, chunk objects are
//! named `YYYYMMDD-HHMMSS-NNN-{S|I|E}`: the chunk-set start time, a
//! zero-padded 1-based sequence number, and a role marking the Start,
//! Intermediate, or End chunk of the volume. Chunks are uploaded every few
//! seconds as the radar sweeps.
//!
//! The [`ChunksDataProvider`] discovers active volumes, incrementally
//! downloads their chunks in sequence order, and assembles each volume into
//! a single in-memory file. An incomplete volume may be completed by
//! stitching against the previous volume or the archive.
//!

mod chunk_key;
pub use chunk_key::{ChunkKey, ChunkType};

mod record;
pub(crate) use record::ChunkedScanRecord;

mod provider;
pub use provider::ChunksDataProvider;

const DEFAULT_CHUNKS_BUCKET: &str = "unidata-nexrad-level2-chunks";
