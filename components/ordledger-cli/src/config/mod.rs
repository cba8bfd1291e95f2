pub mod file;
pub mod generator;

pub use file::ConfigFile;
