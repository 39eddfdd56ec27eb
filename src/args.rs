use clap::{ArgAction, Args, Parser, Subcommand};
use inno_tool::types::*;

/// Tools for listing, testing and extracting Inno Setup installers
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Arg {
    #[arg(short = 'c', long, global = true)]
    /// Code page for installers without Unicode strings
    pub codepage: Option<u32>,
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    /// Search for installers in the directory recursively
    pub recursive: bool,
    #[arg(global = true, action = ArgAction::SetTrue, short, long)]
    /// Print backtrace on error
    pub backtrace: bool,
    #[command(subcommand)]
    /// Command
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
/// Which files to process and how to name them
pub struct FilterArgs {
    #[arg(short = 'l', long)]
    /// Only process files for this language, plus language independent ones
    pub language: Option<String>,
    #[arg(long, action = ArgAction::SetTrue, requires = "language")]
    /// Skip language independent files
    pub language_only: bool,
    #[arg(long)]
    /// Language to prefer when colliding files only differ by language
    pub default_language: Option<String>,
    #[arg(short = 'I', long)]
    /// Only process output paths matching this pattern. A leading `/`
    /// anchors the pattern at the output root
    pub include: Vec<String>,
    #[arg(short = 'L', long, action = ArgAction::SetTrue)]
    /// Convert output paths to lower case
    pub lowercase: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    /// Keep `{constant}` prefixes in output paths as written
    pub no_expand: bool,
    #[arg(long = "set", value_parser = parse_variable)]
    /// Value for a path constant, as `name=value`
    pub variables: Vec<(String, String)>,
    #[arg(short = 'm', long, action = ArgAction::SetTrue)]
    /// Also process files that are deleted after installation
    pub temp: bool,
    #[arg(long, value_enum, default_value_t = CollisionAction::Resolve)]
    /// How to handle files that map to the same output path
    pub collisions: CollisionAction,
    #[arg(short = 'p', long)]
    /// Password for encrypted files
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
/// Commands
pub enum Command {
    /// Print a summary of the setup headers
    Info {
        /// Installer files or directories
        inputs: Vec<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        /// Print JSON
        json: bool,
    },
    /// List the files that would be extracted
    List {
        /// Installer files or directories
        inputs: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, action = ArgAction::SetTrue)]
        /// Print JSON
        json: bool,
    },
    /// Decode every file and verify its checksum
    Test {
        /// Installer files or directories
        inputs: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Extract files
    Extract {
        /// Installer files or directories
        inputs: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(short, long, default_value = ".")]
        /// Output directory
        output: String,
    },
}

impl Command {
    pub fn inputs(&self) -> &[String] {
        match self {
            Command::Info { inputs, .. }
            | Command::List { inputs, .. }
            | Command::Test { inputs, .. }
            | Command::Extract { inputs, .. } => inputs,
        }
    }
}

fn parse_variable(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {:?}", s))?;
    Ok((name.trim_matches(['{', '}']).to_lowercase(), value.to_string()))
}

pub fn parse_args() -> Arg {
    Arg::parse()
}
