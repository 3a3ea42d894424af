//! Subcommand implementations

mod copy;
mod import;
mod purge;
mod sample;

pub use copy::CopyArgs;
pub use import::ImportArgs;
pub use purge::PurgeArgs;
pub use sample::SampleArgs;
