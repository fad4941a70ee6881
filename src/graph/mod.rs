//! Audio graph
//!
//! A small arena of typed nodes (buffer sources, oscillators, panners,
//! gains) wired into a mix that terminates at the device output.

mod mix;
mod node;

pub use mix::MixGraph;
pub use node::{Connection, GraphEvent, GraphObserver, NodeId, NodeKind, StereoFrame};
