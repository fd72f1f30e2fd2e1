//! Block-storage reconciliation

mod analyzer;
mod command;

pub use analyzer::{VolumeInformation, VolumeSnapshot, analyze};
pub use command::{CommandContext, VolumeCommand};
