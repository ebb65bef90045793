pub mod config;
pub mod export;
pub mod scan;
pub mod tree;
