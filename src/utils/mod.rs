pub mod checksum;
pub mod counter;
pub mod encoding;
pub mod files;
pub mod macros;
pub mod rc4;
