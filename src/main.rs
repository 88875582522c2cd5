//! chartconv - Converts rhythm-game chart binaries to and from MIDI.
//!
//! # Usage
//!
//! ```bash
//! chartconv tick2mid songs/unpacked/ -o song.mid -r
//! chartconv tick2mid guitar_3x2.xmk vocals.xmk -o song.mid -q 1/64
//! chartconv entry2mid chart.fsgmub chart.mid
//! chartconv mid2entry chart.mid
//! chartconv mid2tick song.mid vocals vocals.xmk
//! ```
//!
//! Set `RUST_LOG=debug` for conversion details.

use anyhow::{bail, Context, Result};
use chartconv::chart::ChartFormat;
use chartconv::{
    convert_tick_source, entry_chart_to_midi, midi_to_entry_chart, midi_to_tick_chart,
    ChartSource, ConvertConfig, DirectorySource, FileListSource,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Conversion requested on the command line.
enum Command {
    TickToMidi { inputs: Vec<PathBuf>, output: PathBuf },
    EntryToMidi { input: PathBuf, output: PathBuf },
    MidiToEntry { input: PathBuf, output: PathBuf },
    MidiToTick { input: PathBuf, track: String, output: PathBuf },
}

/// Command-line options for the application.
struct CliOptions {
    command: Command,
    /// Settings file to start from.
    config: Option<PathBuf>,
    quantization: Option<String>,
    remap: bool,
    lenient: bool,
}

fn print_help(program: &str) {
    eprintln!("chartconv - Rhythm-game chart to MIDI converter");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {program} tick2mid <dir | file.xmk...> -o <out.mid> [OPTIONS]");
    eprintln!("  {program} entry2mid <in.fsgmub> [out.mid]");
    eprintln!("  {program} mid2entry <in.mid> [out.fsgmub]");
    eprintln!("  {program} mid2tick <in.mid> <track name> [out.xmk]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output PATH         Output file (tick2mid)");
    eprintln!("  -q, --quantization VALUE  Grid as a measure fraction or decimal, 0 disables (default 1/128)");
    eprintln!("  -r, --remap               Remap tick-table tracks to authoring conventions");
    eprintln!("      --lenient             Substitute empty text for dangling string offsets");
    eprintln!("  -c, --config PATH         Load settings from a JSON file");
    eprintln!("  -h, --help                Print this help message");
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!("Use --help for usage information");
    std::process::exit(1);
}

impl CliOptions {
    /// Parses command-line arguments.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("chartconv");

        let mut positional: Vec<String> = Vec::new();
        let mut output: Option<PathBuf> = None;
        let mut config: Option<PathBuf> = None;
        let mut quantization: Option<String> = None;
        let mut remap = false;
        let mut lenient = false;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--output" | "-o" | "--config" | "-c" | "--quantization" | "-q" => {
                    let flag = args[i].clone();
                    i += 1;
                    let Some(value) = args.get(i) else {
                        usage_error(&format!("{flag} requires a value"));
                    };
                    match flag.as_str() {
                        "--output" | "-o" => output = Some(PathBuf::from(value)),
                        "--config" | "-c" => config = Some(PathBuf::from(value)),
                        _ => quantization = Some(value.clone()),
                    }
                }
                "--remap" | "-r" => remap = true,
                "--lenient" => lenient = true,
                "--help" | "-h" => {
                    print_help(program);
                    std::process::exit(0);
                }
                other if other.starts_with('-') && other.len() > 1 => {
                    usage_error(&format!("unknown option: {other}"));
                }
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        let Some((subcommand, rest)) = positional.split_first() else {
            print_help(program);
            std::process::exit(1);
        };
        let path = |index: usize| rest.get(index).map(PathBuf::from);

        let command = match (subcommand.as_str(), rest.len()) {
            ("tick2mid", 1..) => Command::TickToMidi {
                inputs: rest.iter().map(PathBuf::from).collect(),
                output: output.unwrap_or_else(|| usage_error("tick2mid requires --output")),
            },
            ("entry2mid", 1..=2) => {
                let input = PathBuf::from(&rest[0]);
                Command::EntryToMidi {
                    output: path(1).unwrap_or_else(|| input.with_extension("mid")),
                    input,
                }
            }
            ("mid2entry", 1..=2) => {
                let input = PathBuf::from(&rest[0]);
                let extension = ChartFormat::EntryTable.extension();
                Command::MidiToEntry {
                    output: path(1).unwrap_or_else(|| input.with_extension(extension)),
                    input,
                }
            }
            ("mid2tick", 2..=3) => {
                let input = PathBuf::from(&rest[0]);
                let track = rest[1].clone();
                Command::MidiToTick {
                    output: path(2).unwrap_or_else(|| {
                        input.with_file_name(format!(
                            "{track}.{}",
                            ChartFormat::TickTable.extension()
                        ))
                    }),
                    input,
                    track,
                }
            }
            ("tick2mid" | "entry2mid" | "mid2entry" | "mid2tick", _) => {
                usage_error(&format!("wrong number of arguments for {subcommand}"))
            }
            (other, _) => usage_error(&format!("unknown command: {other}")),
        };

        Self {
            command,
            config,
            quantization,
            remap,
            lenient,
        }
    }

    /// Settings file merged with command-line overrides.
    fn settings(&self) -> Result<ConvertConfig> {
        let mut settings = match &self.config {
            Some(path) => ConvertConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConvertConfig::default(),
        };
        if let Some(quantization) = &self.quantization {
            settings.quantization = quantization.clone();
        }
        settings.remap |= self.remap;
        if self.lenient {
            settings.strict = false;
        }
        Ok(settings)
    }
}

/// Picks the chart source for `tick2mid` inputs: one archive directory, or
/// any number of `.xmk` files, never both.
fn tick_source(inputs: &[PathBuf]) -> Result<Box<dyn ChartSource>> {
    let extension = ChartFormat::TickTable.extension();
    let (dirs, files): (Vec<&PathBuf>, Vec<&PathBuf>) = inputs.iter().partition(|p| p.is_dir());

    if let Some(unsupported) = files.iter().find(|path| {
        !path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(extension))
    }) {
        bail!("Unsupported input: {}", unsupported.display());
    }
    if dirs.len() > 1 {
        bail!("Only one archive directory can be converted at a time");
    }
    if !dirs.is_empty() && !files.is_empty() {
        bail!("Cannot mix an archive directory with .{extension} files");
    }

    let source: Box<dyn ChartSource> = match dirs.first() {
        Some(dir) => Box::new(DirectorySource::new(dir.as_path())),
        None => Box::new(FileListSource::new(files.into_iter().cloned())),
    };
    Ok(source)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote output to \"{}\"", path.display());
    Ok(())
}

fn run(cli: &CliOptions) -> Result<()> {
    let settings = cli.settings()?;

    match &cli.command {
        Command::TickToMidi { inputs, output } => {
            let source = tick_source(inputs)?;
            let export = settings.export_options().context("Invalid quantization")?;
            let result = convert_tick_source(
                source.as_ref(),
                &settings.decode_options(ChartFormat::TickTable),
                &export,
            )
            .context("Failed to convert charts")?;

            for (path, error) in &result.failed {
                eprintln!("Warning: skipped {}: {error}", path.display());
            }
            tracing::info!(charts = ?result.converted, "converted charts");
            write(output, &result.midi)
        }
        Command::EntryToMidi { input, output } => {
            let midi = entry_chart_to_midi(
                &read(input)?,
                &settings.decode_options(ChartFormat::EntryTable),
            )
            .with_context(|| format!("Failed to convert {}", input.display()))?;
            write(output, &midi)
        }
        Command::MidiToEntry { input, output } => {
            let chart = midi_to_entry_chart(
                &read(input)?,
                &settings.encode_options(ChartFormat::EntryTable),
            )
            .with_context(|| format!("Failed to convert {}", input.display()))?;
            write(output, &chart)
        }
        Command::MidiToTick {
            input,
            track,
            output,
        } => {
            let chart = midi_to_tick_chart(
                &read(input)?,
                track,
                &settings.encode_options(ChartFormat::TickTable),
            )
            .with_context(|| {
                format!("Failed to convert track \"{track}\" of {}", input.display())
            })?;
            write(output, &chart)
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    run(&cli)
}
