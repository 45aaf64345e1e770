//! Starbind CLI - Command-line tool for Star Citizen keybinding assets.
//!
//! This is the main entry point for the Starbind command-line application.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, LevelFilter};

use starbind::p4k::ArchiveEntry;
use starbind::prelude::*;

/// Starbind - Star Citizen keybinding profile and localization extractor
#[derive(Parser)]
#[command(name = "starbind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries of a P4K archive
    P4kList {
        /// Path to the P4K file
        #[arg(short, long, env = "INPUT_P4K")]
        p4k: PathBuf,

        /// Filter pattern (glob-style, case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show sizes, method and timestamp
        #[arg(short, long)]
        detailed: bool,
    },

    /// Find the best entry matching a name
    P4kFind {
        /// Path to the P4K file
        #[arg(short, long, env = "INPUT_P4K")]
        p4k: PathBuf,

        /// Name, suffix or fragment to look for
        name: String,

        /// How to compare entry names
        #[arg(short, long, value_enum, default_value_t = MatchMode::Suffix)]
        mode: MatchMode,

        /// Path that wins when several entries match
        #[arg(short, long)]
        canonical: Option<String>,
    },

    /// Extract entries from a P4K archive
    P4kExtract {
        /// Path to the P4K file
        #[arg(short, long, env = "INPUT_P4K")]
        p4k: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Filter pattern (glob-style, case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Render CryXmlB entries as XML text
        #[arg(long)]
        convert_xml: bool,
    },

    /// Convert a CryXmlB file to XML
    CryxmlConvert {
        /// Input CryXmlB file
        #[arg(short, long)]
        input: PathBuf,

        /// Output XML file
        #[arg(short, long)]
        output: PathBuf,

        /// Spaces per nesting level (0 for a single line)
        #[arg(long, default_value_t = 2)]
        indent: usize,

        /// Omit the XML declaration
        #[arg(long)]
        no_declaration: bool,
    },

    /// Print the default keybinding profile, using the cache
    Profile {
        #[command(flatten)]
        source: CacheArgs,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print localization strings, using the cache
    Localization {
        #[command(flatten)]
        source: CacheArgs,

        /// Language folder name
        #[arg(short, long, env = "STARBIND_LANGUAGE", default_value = "english")]
        language: String,

        /// Print only this key
        #[arg(short, long)]
        key: Option<String>,
    },
}

#[derive(clap::Args)]
struct CacheArgs {
    /// Path to the P4K file (defaults to the one last cached)
    #[arg(short, long, env = "INPUT_P4K")]
    p4k: Option<PathBuf>,

    /// Cache directory
    #[arg(long, env = "STARBIND_CACHE_DIR", default_value = "starbind-cache")]
    cache_dir: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum MatchMode {
    Exact,
    Suffix,
    Contains,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::P4kList { p4k, filter, detailed } => {
            cmd_p4k_list(&p4k, filter.as_deref(), detailed)?;
        }
        Commands::P4kFind {
            p4k,
            name,
            mode,
            canonical,
        } => {
            cmd_p4k_find(&p4k, &name, mode, canonical.as_deref())?;
        }
        Commands::P4kExtract {
            p4k,
            output,
            filter,
            convert_xml,
        } => {
            cmd_p4k_extract(&p4k, &output, filter.as_deref(), convert_xml)?;
        }
        Commands::CryxmlConvert {
            input,
            output,
            indent,
            no_declaration,
        } => {
            let options = XmlOptions {
                indent,
                declaration: !no_declaration,
            };
            cmd_cryxml_convert(&input, &output, &options)?;
        }
        Commands::Profile { source, output } => {
            cmd_profile(&source, output.as_deref())?;
        }
        Commands::Localization {
            source,
            language,
            key,
        } => {
            cmd_localization(&source, &language, key.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn cmd_p4k_list(p4k_path: &Path, filter: Option<&str>, detailed: bool) -> Result<()> {
    let filter = filter.map(Pattern::new).transpose().context("Invalid filter pattern")?;
    let mut scanner = ArchiveScanner::open(p4k_path).context("Failed to open P4K archive")?;

    let mut count = 0;
    for entry in scanner.entries() {
        let entry = entry.context("Failed to read archive entry")?;
        if !matches_filter(filter.as_ref(), &entry) {
            continue;
        }

        if detailed {
            let modified = entry
                .last_modified()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>12} {:>12} {:>4} {} {}",
                entry.compressed_size(),
                entry.uncompressed_size(),
                entry.method_tag(),
                modified,
                entry.name()
            );
        } else {
            println!("{}", entry.name());
        }
        count += 1;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_p4k_find(p4k_path: &Path, name: &str, mode: MatchMode, canonical: Option<&str>) -> Result<()> {
    let mut target = match mode {
        MatchMode::Exact => Target::exact(name),
        MatchMode::Suffix => Target::suffix(name),
        MatchMode::Contains => Target::contains(name),
    };
    if let Some(canonical) = canonical {
        target = target.with_canonical(canonical);
    }

    let mut scanner = ArchiveScanner::open(p4k_path).context("Failed to open P4K archive")?;
    let spinner = spinner("Scanning archive...");
    let start = Instant::now();
    let found = scanner.find(&target).context("Failed to scan archive")?;
    spinner.finish_and_clear();

    match found {
        Some(entry) => {
            println!("{}", entry.name());
            println!("  offset:       {:#x}", entry.header_offset());
            println!("  method:       {}", entry.method_tag());
            println!("  compressed:   {}", entry.compressed_size());
            println!("  uncompressed: {}", entry.uncompressed_size());
            if let Some(modified) = entry.last_modified() {
                println!("  modified:     {}", modified);
            }
            debug!("found in {:?}", start.elapsed());
        }
        None => anyhow::bail!("No entry matches '{}'", name),
    }

    Ok(())
}

fn cmd_p4k_extract(
    p4k_path: &Path,
    output: &Path,
    filter: Option<&str>,
    convert_xml: bool,
) -> Result<()> {
    println!("Opening P4K archive: {}", p4k_path.display());

    let filter = filter.map(Pattern::new).transpose().context("Invalid filter pattern")?;
    let mut scanner = ArchiveScanner::open(p4k_path).context("Failed to open P4K archive")?;

    let start = Instant::now();
    let spinner = spinner("Scanning archive...");
    let mut selected = Vec::new();
    for entry in scanner.entries() {
        let entry = entry.context("Failed to read archive entry")?;
        spinner.tick();
        if !entry.is_dir() && matches_filter(filter.as_ref(), &entry) {
            selected.push(entry);
        }
    }
    spinner.finish_and_clear();

    println!("Extracting {} entries (scanned in {:?})...", selected.len(), start.elapsed());

    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    fs::create_dir_all(output)?;

    let start = Instant::now();
    let mut errors = 0;
    for entry in &selected {
        let output_path = output.join(entry.output_path());
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        match scanner.read(entry) {
            Ok(data) if convert_xml && CryXml::is_cryxml(&data) => {
                let xml = CryXml::parse(&data)
                    .and_then(|doc| doc.to_xml_string())
                    .with_context(|| format!("Failed to convert {}", entry.name()))?;
                fs::write(&output_path, xml)?;
            }
            Ok(data) => fs::write(&output_path, data)?,
            Err(e) => {
                pb.println(format!("Error extracting {}: {}", entry.name(), e));
                errors += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?} ({} errors)", start.elapsed(), errors);

    Ok(())
}

fn cmd_cryxml_convert(input: &Path, output: &Path, options: &XmlOptions) -> Result<()> {
    println!("Converting: {} -> {}", input.display(), output.display());

    let data = fs::read(input).context("Failed to read input file")?;

    if !CryXml::is_cryxml(&data) {
        anyhow::bail!("Input file is not a CryXmlB file");
    }

    let cryxml = CryXml::parse(&data).context("Failed to parse CryXmlB")?;
    let xml = cryxml
        .to_xml_string_with(options)
        .context("Failed to convert to XML")?;
    fs::write(output, xml).context("Failed to write output file")?;

    println!("Conversion complete");

    Ok(())
}

fn cmd_profile(source: &CacheArgs, output: Option<&Path>) -> Result<()> {
    let request = AssetRequest::default_profile();
    let text = cached_text(source, request)?;

    match output {
        Some(path) => fs::write(path, text).context("Failed to write output file")?,
        None => io::stdout().write_all(text.as_bytes())?,
    }

    Ok(())
}

fn cmd_localization(source: &CacheArgs, language: &str, key: Option<&str>) -> Result<()> {
    let request = AssetRequest::language(language)?;
    let strings = Localization::parse(&cached_text(source, request)?);

    match key {
        Some(key) => match strings.get(key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("No string '{}' for language '{}'", key, language),
        },
        None => {
            let mut stdout = io::stdout().lock();
            for (key, value) in strings.iter() {
                writeln!(stdout, "{}={}", key, value)?;
            }
        }
    }

    Ok(())
}

/// Fetch one asset through the cache, rediscovering the archive if needed.
fn cached_text(source: &CacheArgs, request: AssetRequest) -> Result<String> {
    let cache = AssetCache::new(&source.cache_dir);
    let archive = match &source.p4k {
        Some(path) => path.clone(),
        None => cache
            .last_archive()
            .context("No P4K given and none recorded in the cache (use --p4k or INPUT_P4K)")?,
    };

    let spinner = spinner("Loading...");
    let result = cache.get_or_refresh(&archive, std::slice::from_ref(&request));
    spinner.finish_and_clear();

    let mut texts = result.with_context(|| format!("Failed to load {}", request.name()))?;
    texts
        .remove(request.name())
        .with_context(|| format!("{} missing from cache result", request.name()))
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Case-insensitive glob match against the entry name with `/` separators.
fn matches_filter(filter: Option<&Pattern>, entry: &ArchiveEntry) -> bool {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    filter.map_or(true, |pattern| {
        pattern.matches_with(&entry.name().replace('\\', "/"), options)
    })
}
