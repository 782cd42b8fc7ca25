//! Max-flow / min-cut on sparse s-t capacitated graphs.
//!
//! Implements the Boykov-Kolmogorov augmenting-path algorithm with dual
//! search trees, orphan adoption, and optional reuse of the trees across
//! successive solves that differ only in a subset of capacities. The queueing
//! and adoption heuristics are tuned for the locally-connected graphs that
//! arise in vision energy minimization (segmentation, stereo, denoising).

pub mod error;
pub mod graph;
mod maxflow;

pub use error::{Error, Result};
pub use graph::{ArcId, Graph, NodeId, Segment};
