pub use anyhow::{Context, Result as R, anyhow};
use aifcodex_lib::*;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

mod logger;

#[derive(Parser)]
#[command(name = "aifcodex", version, about = "Inspect, verify and repair AIFF files")]
struct Cli {
    /// Print diagnostic messages
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Quiet mode: suppress all log output
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print stream format, chunk list and tag fields
    Info { file: PathBuf },
    /// Check chunk order and completeness
    Verify { files: Vec<PathBuf> },
    /// Fix chunk order and tag formatting. Without -o only reports fixes
    Clean {
        file: PathBuf,
        /// Where to write the repaired file
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Remove the ID3 tag
    StripTag { files: Vec<PathBuf> },
    /// Show the sizes of the data around the samples
    Split { file: PathBuf },
}

fn open_aiff(path: &Path) -> R<AiffAudio> {
    aifcodex_lib::open(path)
        .with_context(|| format!("reading {}", path.display()))?
        .ok_or_else(|| anyhow!("{} is not an AIFF file", path.display()))
}

fn info(path: &Path) -> R<()> {
    let aiff = open_aiff(path)?;
    println!("{}", path.display());
    println!("  channels:        {}", aiff.channels());
    println!("  bits per sample: {}", aiff.bits_per_sample());
    println!("  sample rate:     {}", aiff.sample_rate());
    println!("  frames:          {}", aiff.total_frames());
    println!("  length:          {:.3}s", aiff.seconds_length());
    let mask = aiff.channel_mask();
    if mask.is_defined() {
        println!("  channel mask:    {:#x}", mask.bits());
    } else {
        println!("  channel mask:    undefined");
    }

    println!("  chunks:");
    for chunk in aiff.chunks()? {
        let chunk = chunk?;
        println!(
            "    {:<4} {:>10}{}",
            chunk.id_str(),
            chunk.size(),
            if chunk.is_lazy() { " (on disk)" } else { "" }
        );
    }

    if let Some(metadata) = aiff.get_metadata()? {
        println!("  tag:");
        for (key, value) in metadata.get_all_fields() {
            println!("    {} = {}", key, value);
        }
    }
    Ok(())
}

fn verify(files: &[PathBuf]) -> R<()> {
    let mut failed = 0;
    for path in files {
        match open_aiff(path).and_then(|aiff| Ok(aiff.verify(None)?)) {
            Ok(_) => println!("{}: OK", path.display()),
            Err(e) => {
                println!("{}: {}", path.display(), e);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(anyhow!("{} of {} files failed verification", failed, files.len()));
    }
    Ok(())
}

fn clean(path: &Path, output: Option<&Path>) -> R<()> {
    let aiff = open_aiff(path)?;
    let mut fixes = Vec::new();
    aiff.clean(&mut fixes, output)
        .with_context(|| format!("cleaning {}", path.display()))?;

    if fixes.is_empty() {
        println!("{}: nothing to fix", path.display());
    }
    for fix in &fixes {
        match output {
            Some(_) => println!("{}: {}", path.display(), fix),
            None => println!("{}: would fix: {}", path.display(), fix),
        }
    }
    Ok(())
}

fn strip_tag(files: &[PathBuf]) -> R<()> {
    for path in files {
        open_aiff(path)?
            .delete_metadata()
            .with_context(|| format!("removing tag from {}", path.display()))?;
        log::info!("removed tag from {}", path.display());
    }
    Ok(())
}

fn split(path: &Path) -> R<()> {
    let aiff = open_aiff(path)?;
    let (head, tail) = aiff.pcm_split()?;
    let total = std::fs::metadata(path)?.len();
    println!("head: {} bytes", head.len());
    println!("pcm:  {} bytes", total.saturating_sub((head.len() + tail.len()) as u64));
    println!("tail: {} bytes", tail.len());
    Ok(())
}

fn main() -> R<()> {
    let cli = Cli::parse();
    logger::StderrLogger::new(cli.quiet, cli.verbose)
        .init()
        .map_err(|e| anyhow!("{}", e))?;

    match &cli.command {
        Command::Info { file } => info(file),
        Command::Verify { files } => verify(files),
        Command::Clean { file, output } => clean(file, output.as_deref()),
        Command::StripTag { files } => strip_tag(files),
        Command::Split { file } => split(file),
    }
}
