use clap::ValueEnum;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
/// What to do with the files of an installer
pub enum Mode {
    /// Print the planned output paths
    #[default]
    List,
    /// Decode every file and verify its checksum without writing anything
    Test,
    /// Write the files to the output directory
    Extract,
}

impl Mode {
    /// Whether file contents have to be decoded.
    pub fn reads_data(&self) -> bool {
        !matches!(self, Mode::List)
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
/// How to handle files that map to the same output path
pub enum CollisionAction {
    /// Keep the file the installer would have kept, skip the others
    #[default]
    Resolve,
    /// Keep every colliding file under a distinct name
    #[value(alias("rename"))]
    RenameAll,
    /// Let later entries replace earlier ones
    Overwrite,
    /// Abort on the first collision
    Error,
}

/// Settings for the output path mapping.
#[derive(Clone, Debug)]
pub struct FilenameConfig {
    /// Convert output paths to lower case.
    pub lowercase: bool,
    /// Replace `{constant}` prefixes. Without this they are kept as
    /// literal directory names.
    pub expand: bool,
    /// Custom values for constants, keyed by lower case name.
    pub variables: HashMap<String, String>,
}

impl Default for FilenameConfig {
    fn default() -> Self {
        Self {
            lowercase: false,
            expand: true,
            variables: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
/// Extra configuration for one run
pub struct ExtractConfig {
    pub mode: Mode,
    pub collisions: CollisionAction,
    /// Only extract files for this language, plus language independent ones.
    pub language: Option<String>,
    /// Skip language independent files.
    pub language_only: bool,
    /// Language preferred when colliding files only differ by language.
    pub default_language: Option<String>,
    /// Also extract files that are deleted after installation.
    pub extract_temp: bool,
    /// Only output paths matching one of these patterns.
    pub include: Vec<String>,
    pub filenames: FilenameConfig,
    pub password: Option<String>,
    /// Code page for non-Unicode installers, instead of the detected one.
    pub codepage: Option<u32>,
    pub output_dir: PathBuf,
    /// Print listings as JSON.
    pub json: bool,
}

/// One planned output file, as printed by `list`.
#[derive(Clone, Debug, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub checksum: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub languages: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub components: String,
}

/// Summary printed by `info`.
#[derive(Clone, Debug, Serialize)]
pub struct SetupSummary {
    pub version: String,
    pub app_name: String,
    pub app_version: String,
    pub app_publisher: String,
    pub codepage: u32,
    pub compression: String,
    pub password_protected: bool,
    pub languages: Vec<String>,
    pub components: Vec<String>,
    pub tasks: Vec<String>,
    pub counts: HashMap<String, usize>,
}
