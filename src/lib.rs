//! A Rust library for reading Inno Setup installers: decoding the setup
//! headers, and listing, verifying and extracting the embedded files.
pub mod error;
pub mod ext;
pub mod extract;
pub mod loader;
pub mod setup;
pub mod stream;
pub mod types;
pub mod utils;

lazy_static::lazy_static! {
    pub static ref COUNTER: utils::counter::Counter = utils::counter::Counter::new();
}
