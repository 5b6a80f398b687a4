pub mod checksums;
pub mod copy;
pub mod metadata;
pub mod remove;
pub mod replicas;
