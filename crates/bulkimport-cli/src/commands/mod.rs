pub mod import;
pub mod sources;

pub use import::ImportCommand;
pub use sources::SourcesCommand;
