//! Readers for the compressed and encrypted parts of an installer.
pub mod block;
pub mod chunk;
pub mod exefilter;
pub mod file;
pub mod lzma;
pub mod slice;
