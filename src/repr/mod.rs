//! Model representation: trees and the additive forest.

mod forest;
mod tree;

pub use forest::Forest;
pub use tree::Tree;
