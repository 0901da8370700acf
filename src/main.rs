use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use ledgif::document::{Document, DocumentConfig, SaveTarget, TextOptions};
use ledgif::encoding::ProgressSink;
use ledgif::error_codes::envelope_for;
use ledgif::manifest::load_and_validate_manifest;
use ledgif::{extract_gif_frames, Direction, FontdueGlyphs};

const BAR_LENGTH: usize = 50;

#[derive(Debug, Parser)]
#[command(name = "ledgif")]
#[command(about = "Scrolling LED-matrix GIF renderer")]
struct Cli {
    /// Print results and failures as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a YAML tape into a GIF.
    Render {
        tape: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[arg(long)]
        debug_template: Option<String>,
        #[arg(long)]
        quiet: bool,
    },
    /// Validate a tape and report its size and frame totals.
    Check { tape: PathBuf },
    /// Render a single text fragment.
    Text {
        text: String,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[arg(long)]
        font: PathBuf,
        #[arg(long, default_value_t = 79)]
        columns: u32,
        #[arg(long, default_value_t = 9)]
        rows: u32,
        #[arg(long, default_value = "left")]
        direction: Direction,
        #[arg(long)]
        no_intro: bool,
        #[arg(long)]
        no_outro: bool,
        #[arg(long, default_value_t = 20)]
        duration: u32,
        #[arg(long, default_value_t = 1)]
        speed: u32,
        #[arg(long, default_value_t = 1)]
        repeat: u32,
        #[arg(long = "loop", default_value_t = 0, allow_negative_numbers = true)]
        loop_count: i32,
        #[arg(long)]
        quiet: bool,
    },
    /// List the frames and delays of a GIF.
    Frames {
        gif: PathBuf,
        #[arg(long, default_value_t = 1)]
        speed: u32,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;
    match run(cli.command, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if json {
                match serde_json::to_string(&envelope_for(&error)) {
                    Ok(line) => println!("{line}"),
                    Err(_) => eprintln!("error: {error:#}"),
                }
            } else {
                eprintln!("error: {error:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Render {
            tape,
            output,
            debug_template,
            quiet,
        } => run_render(&tape, &output, debug_template, quiet || json, json),
        Commands::Check { tape } => run_check(&tape, json),
        Commands::Text {
            text,
            output,
            font,
            columns,
            rows,
            direction,
            no_intro,
            no_outro,
            duration,
            speed,
            repeat,
            loop_count,
            quiet,
        } => {
            let config = DocumentConfig {
                columns,
                rows,
                loop_count,
                font: Some(Arc::new(FontdueGlyphs::from_path(&font)?)),
                ..DocumentConfig::default()
            };
            let options = TextOptions {
                duration,
                speed,
                intro: !no_intro,
                outro: !no_outro,
                direction,
                repeat,
                ..TextOptions::default()
            };
            let mut document = Document::new(config)?;
            document.add_text_fragment(&text, &options)?;
            save_document(&mut document, &output, quiet || json, json)
        }
        Commands::Frames { gif, speed } => run_frames(&gif, speed, json),
    }
}

fn run_check(tape_path: &Path, json: bool) -> Result<()> {
    let manifest = load_and_validate_manifest(tape_path)?;
    let document = manifest.build_document()?;

    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "columns": document.columns(),
                "rows": document.rows(),
                "width": document.columns_pixels(),
                "height": document.rows_pixels(),
                "loop": document.loop_count(),
                "fragments": document.fragment_count(),
                "frames": document.frame_count(),
            })
        );
        return Ok(());
    }

    println!(
        "OK: {} ({}x{} cells, {}x{} px, loop {})",
        tape_path.display(),
        document.columns(),
        document.rows(),
        document.columns_pixels(),
        document.rows_pixels(),
        document.loop_count()
    );
    println!("Fragments: {}", document.fragment_count());
    println!("Frames: {}", document.frame_count());
    Ok(())
}

fn run_render(
    tape_path: &Path,
    output_path: &Path,
    debug_template: Option<String>,
    quiet: bool,
    json: bool,
) -> Result<()> {
    let mut manifest = load_and_validate_manifest(tape_path)?;
    if debug_template.is_some() {
        manifest.debug_template = debug_template;
    }
    let mut document = manifest.build_document()?;
    save_document(&mut document, output_path, quiet, json)
}

fn save_document(document: &mut Document, output_path: &Path, quiet: bool, json: bool) -> Result<()> {
    let frames = document.frame_count();
    if quiet {
        document.save_to(output_path)?;
    } else {
        let mut progress = ConsoleProgress::new(output_path.display().to_string());
        document.save_with_progress(SaveTarget::Path(output_path), &mut progress)?;
    }

    if json {
        println!(
            "{}",
            json!({ "ok": true, "output": output_path.display().to_string(), "frames": frames })
        );
    } else {
        println!("Wrote {}", output_path.display());
    }
    Ok(())
}

fn run_frames(gif_path: &Path, speed: u32, json: bool) -> Result<()> {
    let frames = extract_gif_frames(gif_path, speed)?;
    let (width, height) = frames.dimensions();
    let delays = frames
        .map(|frame| frame.map(|frame| frame.duration_ms))
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!(
            "{}",
            json!({ "ok": true, "width": width, "height": height, "delays_ms": delays })
        );
        return Ok(());
    }

    println!("{} ({}x{} px, {} frames)", gif_path.display(), width, height, delays.len());
    for (index, delay) in delays.iter().enumerate() {
        println!("frame {index}: {delay}ms");
    }
    Ok(())
}

/// Single-line progress bar on stderr, redrawn in place.
struct ConsoleProgress {
    name: String,
    started: Instant,
}

impl ConsoleProgress {
    fn new(name: String) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&mut self, done: usize, total: usize) {
        let line = format_progress(done, total, self.started.elapsed().as_secs_f64(), &self.name);
        let end = if done == total { "\n" } else { "" };
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r{line}{end}");
        let _ = stderr.flush();
    }
}

fn format_progress(done: usize, total: usize, seconds: f64, name: &str) -> String {
    let total_for_ratio = if total == 0 { 100 } else { total };
    let filled = (done * BAR_LENGTH / total_for_ratio).min(BAR_LENGTH);
    let percent = done * 100 / total_for_ratio;
    format!(
        "[{:<width$}][{}/{} frames][{:>3}%][{:>5.2}s][{}]",
        "█".repeat(filled),
        done,
        total,
        percent,
        seconds,
        name,
        width = BAR_LENGTH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_matches_console_format() {
        let line = format_progress(5, 10, 1.5, "out.gif");
        assert_eq!(
            line,
            format!("[{}{}][5/10 frames][ 50%][ 1.50s][out.gif]", "█".repeat(25), " ".repeat(25))
        );
    }

    #[test]
    fn finished_bar_is_full() {
        let line = format_progress(3, 3, 0.0, "x");
        assert!(line.starts_with(&format!("[{}]", "█".repeat(50))));
        assert!(line.contains("[100%]"));
    }
}
