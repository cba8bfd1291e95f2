pub mod inscription_parsing;
pub mod inscription_sequencing;
pub mod inscription_tracking;
