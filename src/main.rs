//! Main entry point for the rzipalign CLI application.
//!
//! Rewrites an archive with aligned entries and verifies the result, or
//! only verifies an existing archive with `-c`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};

use rzipalign::{
    AlignError, AlignmentPolicy, Cli, HttpRangeReader, LocalFileReader, ReadAt, ZipAligner,
    ZipArchive, ZipWriter, verify,
};

/// Application entry point.
///
/// Exit status is 0 on success and 1 on any failure, including an archive
/// that fails verification.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("rzipalign: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Route `rzipalign` log records to stderr; `-v` enables per-entry
/// diagnostics and `RUST_LOG` overrides both.
fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("rzipalign", level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

/// Validate arguments and dispatch on the source type.
///
/// Returns whether every entry passed verification.
async fn run(cli: &Cli) -> Result<bool> {
    let output = cli.validate()?;
    let policy = cli.policy()?;

    if cli.is_http_url() {
        // Handle remote ZIP file via HTTP Range requests
        let reader = Arc::new(HttpRangeReader::new(cli.input.clone()).await?);
        let aligned = process_zip(reader.clone(), cli, output, &policy).await?;

        if cli.verbose {
            println!(
                "Total bytes transferred: {}",
                format_size(reader.transferred_bytes())
            );
        }
        Ok(aligned)
    } else {
        let reader = Arc::new(LocalFileReader::new(Path::new(&cli.input))?);
        process_zip(reader, cli, output, &policy).await
    }
}

/// Align into `output`, or only check when there is none, then report.
async fn process_zip<R: ReadAt + 'static>(
    reader: Arc<R>,
    cli: &Cli,
    output: Option<&str>,
    policy: &AlignmentPolicy,
) -> Result<bool> {
    let archive = ZipArchive::open(reader)
        .await
        .with_context(|| format!("Unable to open '{}' as zip archive", cli.input))?;

    let Some(output) = output else {
        return check_alignment(&archive, &cli.input, policy, cli.verbose).await;
    };

    if let Err(err) = align_archive(&archive, cli, output, policy).await {
        log::error!("'{output}' is incomplete and must be discarded");
        return Err(err);
    }

    // Always verify what was just written
    let written = Arc::new(LocalFileReader::new(Path::new(output))?);
    let written = ZipArchive::open(written)
        .await
        .with_context(|| format!("Unable to reopen '{output}'"))?;
    check_alignment(&written, output, policy, cli.verbose).await
}

async fn align_archive<R: ReadAt>(
    archive: &ZipArchive<R>,
    cli: &Cli,
    output: &str,
    policy: &AlignmentPolicy,
) -> Result<()> {
    if cli.verbose {
        println!(
            "Aligning {:?} on {} bytes",
            cli.input,
            policy.base_alignment()
        );
        println!("writing out to {output:?} begin...");
    }

    let file = tokio::fs::File::create(output)
        .await
        .map_err(|e| AlignError::ArchiveWrite(format!("cannot create '{output}': {e}")))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    let summary = ZipAligner::new(*policy, cli.recompress)
        .process_archive(archive, &mut writer)
        .await?;

    let mut sink = writer
        .finish()
        .await
        .map_err(|e| AlignError::ArchiveWrite(format!("{e:#}")))?;
    sink.shutdown().await?;

    log::info!(
        "{} entries, {} padded with {} bytes, {} recompressed, {}",
        summary.entries,
        summary.padded_entries,
        summary.padding_bytes,
        summary.recompressed_entries,
        format_size(summary.bytes_written)
    );

    if cli.verbose {
        println!("writing out to {output:?} succesful");
    }

    Ok(())
}

/// Verify `archive` and print the per-entry report in verbose mode.
async fn check_alignment<R: ReadAt>(
    archive: &ZipArchive<R>,
    name: &str,
    policy: &AlignmentPolicy,
    verbose: bool,
) -> Result<bool> {
    if verbose {
        println!(
            "Verifying alignment of {name} ({})...",
            policy.base_alignment()
        );
    }

    let verification = verify(archive, policy).await?;

    if verbose {
        for check in &verification.entries {
            println!("{check}");
        }
    }

    let aligned = verification.all_aligned();
    if verbose {
        println!(
            "Verification {}",
            if aligned { "succesful" } else { "FAILED" }
        );
    } else if !aligned {
        log::warn!(
            "{name}: {} entries are not aligned",
            verification.violations().len()
        );
    }

    Ok(aligned)
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
