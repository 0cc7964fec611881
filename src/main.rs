//! Main entry point for the isoscope CLI app

use isoscope::cli::{self, Commands};
use isoscope::detect;
use isoscope::iso::{EntryKind, IsoReader};
use isoscope::task::ExtractionTask;
use std::fs;
use std::io::Write;

fn main() -> std::process::ExitCode {
    if let Err(e) = run_app() {
        if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
            let _ = clap_err.print();
            // --help and --version land here too; they are not failures.
            if !clap_err.use_stderr() {
                return std::process::ExitCode::SUCCESS;
            }
        } else {
            eprintln!("Error: {}", e);
        }
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

fn run_app() -> Result<(), Box<dyn std::error::Error>> {
    let command = cli::run()?;

    match &command {
        Commands::List { image, pattern } => {
            let mut reader = IsoReader::open_image(image)?;
            let entries = reader.list_entries()?;
            let mut shown = 0usize;
            for entry in &entries {
                if let Some(pattern) = pattern {
                    if !entry.path.contains(pattern.as_str()) {
                        continue;
                    }
                }
                shown += 1;
                match &entry.kind {
                    EntryKind::Directory => println!("- {}/", entry.path),
                    EntryKind::File => println!("- {} ({} bytes)", entry.path, entry.size),
                    EntryKind::HardLink { target } => {
                        println!("- {} (hard link => {})", entry.path, target)
                    }
                    EntryKind::Symlink { target } => {
                        println!("- {} (symlink => {})", entry.path, target)
                    }
                }
            }
            if shown == 0 {
                println!("No matching entries.");
            }
        }
        Commands::Cat { image, path } => {
            let mut reader = IsoReader::open_image(image)?;
            let content = reader.read_file(path)?;
            std::io::stdout().write_all(&content)?;
        }
        Commands::Extract { image, output } => {
            // The engine expects the destination to exist.
            fs::create_dir_all(output)?;
            let (mut task, events) = ExtractionTask::with_channel(image, output);
            task.run()?;
            // The channel disconnects when the worker finishes.
            for event in events.iter() {
                eprint!("\r[{:3}%] {}\x1b[K", event.percent, event.message);
            }
            eprintln!();
            task.join()?;
        }
        Commands::Detect { image } => match detect::detect_distribution(image)? {
            Some(detection) => println!("{}", detection.name),
            None => println!("Unknown distribution (no identification files found)"),
        },
    }

    Ok(())
}
