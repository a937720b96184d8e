pub mod block;
pub mod cost;
