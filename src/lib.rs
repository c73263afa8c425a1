pub mod euler_tour_tree;
pub mod sketch;
pub mod skiplist;

pub use euler_tour_tree::EulerTourTree;
pub use sketch::{Sketch, XorSketch};
pub use skiplist::SkipListConfig;

/// Euler tour forest over the default XOR fingerprint sketch.
pub type DefaultForest = EulerTourTree<XorSketch>;
