//! Render-side machinery
//!
//! CPU-backed render targets, the per-frame pass graph, the compositing
//! pass kernels, and the post-process injector that routes host render
//! passes to the right layer.

pub mod executor;
pub mod graph;
pub mod injector;
pub mod passes;
pub mod target;
