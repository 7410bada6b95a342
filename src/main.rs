//! Main entry point for the nest CLI app

use nest::cli::{self, Commands};
use nest::{list_entries, NestBuilder, NestExpander, NestListing};
use std::error::Error;
use std::path::{Path, PathBuf};

fn main() -> std::process::ExitCode {
    if let Err(e) = run_app() {
        eprintln!("Error: {}", e);
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn run_app() -> Result<(), Box<dyn Error>> {
    let args = cli::run()?;
    cli::init_logging(args.verbose);

    match args.command {
        Commands::Create { inputs, output, under } => {
            let (dir, file_name) = split_output(&output)?;
            let mut builder = NestBuilder::new();
            for input in &inputs {
                let mut entry = builder.add(input)?;
                if let Some(under) = &under {
                    entry = entry.under(under)?;
                }
                builder = entry.done();
            }
            let archive = builder.build(dir, file_name)?;
            println!("Created {}", archive.display());
        }
        Commands::Expand { archive, output, links } => {
            let mut expander = NestExpander::open(&archive)?;
            for (nest_path, expand_path) in &links {
                expander = expander.link_nest_path(nest_path)?.to_path(expand_path)?;
            }
            let summary = expander.expand(&output)?;
            println!(
                "Expanded {} directories and {} files ({} bytes) into {}",
                summary.directories,
                summary.files,
                summary.bytes,
                output.display()
            );
        }
        Commands::List { archive, json } => {
            let listing = list_entries(&archive)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                print_listing(&archive, &listing);
            }
        }
    }

    Ok(())
}

fn split_output(output: &Path) -> Result<(PathBuf, &str), Box<dyn Error>> {
    let file_name = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("'{}' does not name a file", output.display()))?;
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}

fn print_listing(archive: &Path, listing: &NestListing) {
    println!("Nest {} ({} entries):", archive.display(), listing.entries.len());
    for entry in &listing.entries {
        let mut line = if entry.is_dir {
            format!("- {}", entry.name)
        } else {
            format!("- {} ({} bytes)", entry.name, entry.size)
        };
        if let Some(location) = &entry.location {
            line.push_str(&format!(" @ {location}"));
        }
        if let Some(target) = &entry.expand_target {
            line.push_str(&format!(" -> {target}"));
        }
        println!("{line}");
    }
    if !listing.nest_locations.is_empty() {
        println!("Nest locations:");
        for location in &listing.nest_locations {
            println!("  {location}");
        }
    }
    if !listing.expand_locations.is_empty() {
        println!("Expand locations:");
        for location in &listing.expand_locations {
            println!("  {location}");
        }
    }
}
