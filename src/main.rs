use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use typeface::{
    DirectoryScan, FontUnits, ReadError, TypeMeasureOptions, TypefaceInfo, TypefaceReader,
};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Inspect font containers and measure text")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Which table supplies the vertical metrics.
#[derive(clap::ValueEnum, Copy, Clone, Default, Debug)]
enum Metrics {
    /// Whatever the font's OS/2 selection flags ask for.
    #[default]
    Preferred,
    /// The 'hhea' table.
    Hhea,
    /// The OS/2 typographic values.
    Typo,
}

impl From<Metrics> for FontUnits {
    fn from(value: Metrics) -> Self {
        match value {
            Metrics::Preferred => FontUnits::UseFontPreference,
            Metrics::Hhea => FontUnits::UseHeadMetrics,
            Metrics::Typo => FontUnits::UseTypographicMetrics,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Describe every face in a font file
    Info {
        /// Font file (ttf, otf, ttc, woff or woff2)
        path: String,
    },
    /// Describe every font file in a directory
    Scan {
        dir: PathBuf,
        /// File name patterns separated by '|', e.g. "*.ttf|*.otf"
        #[arg(long, default_value = "")]
        pattern: String,
        /// Descend into subdirectories
        #[arg(long)]
        recurse: bool,
        /// Report unreadable files instead of stopping at the first one
        #[arg(long)]
        capture_errors: bool,
    },
    /// Measure how much of a line of text fits in a width
    Measure {
        path: String,
        text: String,
        /// Available width, in the same units as --em
        #[arg(long, default_value_t = f64::MAX)]
        width: f64,
        /// Size of one em
        #[arg(long, default_value_t = 12.0)]
        em: f64,
        /// Index of the face to use when the file holds several
        #[arg(long, default_value_t = 0)]
        face: usize,
        /// Cut the line back to the last space
        #[arg(long)]
        words: bool,
        /// Also allow cutting after a hyphen
        #[arg(long)]
        hyphens: bool,
        #[arg(long, value_enum, default_value_t)]
        metrics: Metrics,
    },
    /// Decode a font (including WOFF and WOFF2) and write it back out as an sfnt
    Export {
        path: String,
        out: PathBuf,
        #[arg(long, default_value_t = 0)]
        face: usize,
    },
}

fn print_info(info: &TypefaceInfo) {
    if info.is_unknown() {
        let reason = info.error_message.as_deref().unwrap_or_default();
        println!("{} ({}): {reason}", info.source, info.format);
        return;
    }
    println!("{} ({}, {} faces)", info.source, info.format, info.faces.len());
    for (index, face) in info.faces.iter().enumerate() {
        println!("  [{index}] {face}");
    }
    if let Some(error) = &info.error_message {
        println!("  skipped: {error}");
    }
}

fn run(args: Args) -> Result<(), ReadError> {
    let reader = TypefaceReader::new();
    match args.command {
        Command::Info { path } => print_info(&reader.read_info(&path)?),
        Command::Scan {
            dir,
            pattern,
            recurse,
            capture_errors,
        } => {
            let scan = DirectoryScan {
                pattern,
                recurse,
                capture_errors,
            };
            for info in reader.scan_directory(&dir, &scan)? {
                print_info(&info?);
            }
        }
        Command::Measure {
            path,
            text,
            width,
            em,
            face,
            words,
            hyphens,
            metrics,
        } => {
            let info = reader.read_info(&path)?;
            let target = info
                .faces
                .get(face)
                .ok_or_else(|| ReadError::FaceNotFound(format!("{path} face {face}")))?;
            let font = reader.read_font(&path, Some(target))?;
            let options = TypeMeasureOptions::default()
                .word_boundaries(words)
                .hyphens(hyphens)
                .font_units(metrics.into());
            let line = font.measure_line(&text, 0, em, width, options)?;
            let fitted: String = text
                .chars()
                .skip(line.first_character)
                .take(line.chars_fitted)
                .collect();
            println!("fits:   {fitted:?}");
            println!("chars:  {} from {}", line.chars_fitted, line.first_character);
            println!("width:  {:.3}", line.required_width);
            println!("height: {:.3}", line.required_height);
        }
        Command::Export { path, out, face } => {
            let info = reader.read_info(&path)?;
            let target = info
                .faces
                .get(face)
                .ok_or_else(|| ReadError::FaceNotFound(format!("{path} face {face}")))?;
            let font = reader.read_font(&path, Some(target))?;
            let sfnt = font.to_sfnt();
            log::info!("writing {} bytes to '{}'", sfnt.len(), out.display());
            std::fs::write(&out, sfnt).map_err(|source| ReadError::Io { path: out, source })?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
