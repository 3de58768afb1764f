//! Process-backed node control

mod process;
pub mod wire;

pub use process::ProcessNode;
