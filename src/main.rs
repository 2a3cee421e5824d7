// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! spacey-link - inspect the module graph of a Spacey script
//!
//! Loads a script and everything it imports or requires, then prints every
//! module that was resolved along the way.

mod scan;

use anyhow::{Context, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use scan::ScanCompiler;
use spacey_host::{Object, Runtime};
use spacey_modules::{
    BuiltinModule, FsLoader, LegacyRequire, Locator, ModuleResolver, ModuleSystem, ResolverConfig,
    SourceData,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Inspect the module graph of a Spacey script
#[derive(Parser, Debug)]
#[command(name = "spacey-link")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file [default: <config dir>/spacey-link/config.toml]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base directory for scripts read from stdin
    #[arg(long, value_name = "DIR")]
    base: Option<PathBuf>,

    /// Reserved namespace of built-in modules
    #[arg(long, value_name = "NS")]
    namespace: Option<String>,

    /// Register an empty built-in module (repeatable)
    #[arg(long = "builtin", value_name = "NAME")]
    builtins: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Script to inspect, `-` reads it from stdin
    script: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(imported) => {
            println!(
                "{} {}",
                "Resolved".green().bold(),
                format!("{} modules", imported.len()).dimmed()
            );
            for name in imported {
                println!("  {}", name.cyan());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "spacey_modules=debug"
    } else {
        "spacey_modules=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let config = load_config(cli)?;
    let source = read_source(&cli.script)?;

    let loader = Arc::new(FsLoader::new());
    let mut resolver = ModuleResolver::new(config, loader, Arc::new(ScanCompiler::new()));
    for name in &cli.builtins {
        if !resolver.config().is_builtin(name) {
            bail!(
                "built-in module {name} is outside the {} namespace",
                resolver.config().builtin_namespace
            );
        }
        resolver = resolver.with_builtin(name.clone(), BuiltinModule::plain(Object::new()));
    }
    let resolver = Arc::new(resolver);

    let mut rt = Runtime::new();
    let system = Arc::new(ModuleSystem::new(Arc::clone(&resolver), &rt));
    let pwd = resolver.base_for(&source.locator);
    let require = Arc::new(LegacyRequire::new(Arc::clone(&system), pwd));
    require.install(&rt);

    debug!("Running {}", source.locator);
    system
        .run(&mut rt, source)
        .with_context(|| format!("failed to load {}", cli.script))?;
    Ok(system.imported())
}

fn load_config(cli: &Cli) -> anyhow::Result<ResolverConfig> {
    let mut config = match &cli.config {
        Some(path) => ResolverConfig::load(path)?,
        None => match default_config_path().filter(|path| path.exists()) {
            Some(path) => ResolverConfig::load(&path)?,
            None => ResolverConfig::default(),
        },
    };

    if let Some(base) = &cli.base {
        let dir = std::fs::canonicalize(base)
            .with_context(|| format!("cannot use {} as base directory", base.display()))?;
        config = config.with_base(Locator::from_directory_path(&dir)?);
    }
    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace.clone());
    }
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("spacey-link").join("config.toml"))
}

fn read_source(script: &str) -> anyhow::Result<SourceData> {
    if script == "-" {
        let mut data = Vec::new();
        std::io::stdin()
            .read_to_end(&mut data)
            .context("failed to read script from stdin")?;
        return Ok(SourceData::new(Locator::stdin(), data));
    }

    let path = std::fs::canonicalize(Path::new(script))
        .with_context(|| format!("file not found '{script}'"))?;
    let data = std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(SourceData::new(Locator::from_file_path(&path)?, data))
}
