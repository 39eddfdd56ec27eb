pub mod args;

use anyhow::Context;
use inno_tool::COUNTER;
use inno_tool::extract::target::{DiskTarget, ExtractTarget, NullTarget, check_output_dir};
use inno_tool::extract::{self, Installer};
use inno_tool::types::*;
use inno_tool::utils;
use std::path::{Path, PathBuf};

fn build_config(arg: &args::Arg) -> ExtractConfig {
    let mut config = ExtractConfig {
        codepage: arg.codepage,
        ..Default::default()
    };
    let filter = match &arg.command {
        args::Command::Info { json, .. } => {
            config.json = *json;
            return config;
        }
        args::Command::List { filter, json, .. } => {
            config.mode = Mode::List;
            config.json = *json;
            filter
        }
        args::Command::Test { filter, .. } => {
            config.mode = Mode::Test;
            filter
        }
        args::Command::Extract { filter, output, .. } => {
            config.mode = Mode::Extract;
            config.output_dir = PathBuf::from(output);
            filter
        }
    };
    config.language = filter.language.clone();
    config.language_only = filter.language_only;
    config.default_language = filter.default_language.clone();
    config.include = filter.include.clone();
    config.extract_temp = filter.temp;
    config.collisions = filter.collisions;
    config.password = filter.password.clone();
    config.filenames = FilenameConfig {
        lowercase: filter.lowercase,
        expand: !filter.no_expand,
        variables: filter.variables.iter().cloned().collect(),
    };
    config
}

fn print_info(installer: &Installer, config: &ExtractConfig) -> anyhow::Result<()> {
    let summary = extract::summary(&installer.info);
    if config.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("{}", installer.path.display());
    println!("  Setup data: {}", summary.version);
    println!("  Application: {} {}", summary.app_name, summary.app_version);
    if !summary.app_publisher.is_empty() {
        println!("  Publisher: {}", summary.app_publisher);
    }
    println!("  Compression: {}", summary.compression);
    println!("  Code page: {}", summary.codepage);
    if summary.password_protected {
        println!("  Password protected");
    }
    for (name, list) in [
        ("Languages", &summary.languages),
        ("Components", &summary.components),
        ("Tasks", &summary.tasks),
    ] {
        if !list.is_empty() {
            println!("  {}: {}", name, list.join(", "));
        }
    }
    let mut counts: Vec<_> = summary.counts.iter().filter(|(_, n)| **n > 0).collect();
    counts.sort();
    for (name, count) in counts {
        println!("  {}: {}", name, count);
    }
    Ok(())
}

fn print_list(installer: &Installer, plan: &extract::planner::Plan, config: &ExtractConfig) -> anyhow::Result<()> {
    let records = extract::records(&installer.info, plan);
    if config.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    for record in records {
        let mut line = format!("{:>12}  {}", record.size, record.path);
        if let Some(version) = &record.version {
            line.push_str(&format!(" [{}]", version));
        }
        if !record.languages.is_empty() {
            line.push_str(&format!(" ({})", record.languages));
        }
        println!("{}", line);
    }
    Ok(())
}

pub fn process_installer(path: &Path, config: &ExtractConfig, info_only: bool) -> anyhow::Result<()> {
    log::info!("Opening {}", path.display());
    let installer = Installer::open(path, config.codepage)
        .with_context(|| format!("Failed to read setup headers of {}", path.display()))?;
    if info_only {
        return print_info(&installer, config);
    }
    let mut target: Box<dyn ExtractTarget> = match config.mode {
        Mode::Extract => Box::new(DiskTarget::new(&config.output_dir)),
        Mode::List | Mode::Test => Box::new(NullTarget),
    };
    let plan = extract::run(&installer, config, target.as_mut())
        .with_context(|| format!("Failed to process {}", path.display()))?;
    match config.mode {
        Mode::List => print_list(&installer, &plan, config)?,
        Mode::Test => log::info!("{}: {} files OK", path.display(), plan.files.len()),
        Mode::Extract => log::info!(
            "{}: extracted {} files to {}",
            path.display(),
            plan.files.len(),
            config.output_dir.display()
        ),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let arg = args::parse_args();
    if arg.backtrace {
        unsafe { std::env::set_var("RUST_LIB_BACKTRACE", "1") };
    }
    let config = build_config(&arg);
    if config.mode == Mode::Extract && !check_output_dir(&config.output_dir) {
        log::error!("Output path is not a directory");
        std::process::exit(1);
    }
    let inputs = match utils::files::collect_inputs(arg.command.inputs(), arg.recursive) {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("Error collecting inputs: {}", e);
            std::process::exit(1);
        }
    };
    if inputs.is_empty() {
        log::error!("No installers given");
        std::process::exit(1);
    }
    let info_only = matches!(arg.command, args::Command::Info { .. });
    for input in inputs.iter() {
        if let Err(e) = process_installer(input, &config, info_only) {
            COUNTER.inc_error();
            log::error!("{:#}", e);
            if arg.backtrace {
                eprintln!("Backtrace: {}", e.backtrace());
            }
        }
    }
    if !info_only {
        eprintln!("{}", *COUNTER);
    }
    if COUNTER.errors() > 0 {
        std::process::exit(1);
    }
}
