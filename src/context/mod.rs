//! Context assembly: lexical search fused with graph expansion, emitted as
//! a bounded document.

pub mod budget;
pub mod builder;
pub mod semantic;

pub use builder::{CodeBlock, ContextBuilder, ContextOptions, ContextResult};
pub use semantic::{fuse_by_reciprocal_rank, SemanticIndex, SemanticMatch};
