//! Decoding of the setup header streams.
pub mod component;
pub mod data;
pub mod delete;
pub mod directory;
pub mod entry;
pub mod file;
pub mod header;
pub mod icon;
pub mod info;
pub mod ini;
pub mod language;
pub mod message;
pub mod reader;
pub mod registry;
pub mod run;
pub mod version;
pub mod windows;
