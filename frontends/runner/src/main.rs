use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use arm7_core::bus::{BusConfig, WaitStates};
use arm7_core::debugger::BreakpointSet;
use arm7_core::log_buffer;
use arm7_core::{Emulator, LoadError};

// Steps between log drains.
const LOG_FLUSH_INTERVAL: u64 = 4096;

#[derive(Parser, Debug)]
#[command(version, about = "Runs a raw ARM7TDMI image on a flat RAM bus.", long_about = None)]
struct Args {
    #[arg(name = "IMAGE")]
    image: PathBuf,

    /// Address the image is copied to.
    #[arg(long, value_parser = parse_u32)]
    load_address: Option<u32>,

    /// First instruction to execute; defaults to the load address.
    #[arg(long, value_parser = parse_u32)]
    entry: Option<u32>,

    /// Start in Thumb state.
    #[arg(long)]
    thumb: bool,

    #[arg(long)]
    steps: Option<u64>,

    /// Raise an IRQ every N steps (0 disables).
    #[arg(long)]
    irq_period: Option<u64>,

    /// Code breakpoint address; may be repeated.
    #[arg(long = "break", value_parser = parse_u32)]
    breakpoints: Vec<u32>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// off, error, warn, info, debug or trace.
    #[arg(long, value_parser = parse_level)]
    log_level: Option<log::LevelFilter>,
}

#[derive(Debug, thiserror::Error)]
enum RunnerError {
    #[error("cannot read config {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },
    #[error("invalid config {path}: {source}")]
    ConfigParse { path: PathBuf, source: toml::de::Error },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
    #[error(transparent)]
    Load(#[from] LoadError),
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct MemoryConfig {
    ram_size: Option<usize>,
    sequential_wait: Option<u32>,
    non_sequential_wait: Option<u32>,
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct Config {
    load_address: Option<u32>,
    entry: Option<u32>,
    thumb: Option<bool>,
    steps: Option<u64>,
    irq_period: Option<u64>,
    breakpoints: Vec<u32>,
    log_level: Option<String>,
    memory: MemoryConfig,
}

#[derive(Debug, PartialEq)]
struct Settings {
    image: PathBuf,
    load_address: u32,
    entry: u32,
    thumb: bool,
    steps: u64,
    irq_period: u64,
    breakpoints: Vec<u32>,
    log_level: log::LevelFilter,
    bus: BusConfig,
}

const DEFAULT_STEPS: u64 = 1_000_000;

impl Settings {
    /// Layers command-line flags over the config file.
    fn resolve(args: Args, config: Config) -> Result<Self, RunnerError> {
        let log_level = match (args.log_level, config.log_level) {
            (Some(level), _) => level,
            (None, Some(name)) => parse_level(&name).map_err(|_| RunnerError::LogLevel(name))?,
            (None, None) => default_log_level(),
        };
        let load_address = args.load_address.or(config.load_address).unwrap_or(0);
        let defaults = BusConfig::default();
        let mut breakpoints = config.breakpoints;
        breakpoints.extend(args.breakpoints);

        Ok(Self {
            image: args.image,
            load_address,
            entry: args.entry.or(config.entry).unwrap_or(load_address),
            thumb: args.thumb || config.thumb.unwrap_or(false),
            steps: args.steps.or(config.steps).unwrap_or(DEFAULT_STEPS),
            irq_period: args.irq_period.or(config.irq_period).unwrap_or(0),
            breakpoints,
            log_level,
            bus: BusConfig {
                ram_size: config.memory.ram_size.unwrap_or(defaults.ram_size),
                wait_states: WaitStates {
                    sequential: config.memory.sequential_wait.unwrap_or(defaults.wait_states.sequential),
                    non_sequential: config
                        .memory
                        .non_sequential_wait
                        .unwrap_or(defaults.wait_states.non_sequential),
                },
            },
        })
    }
}

fn default_log_level() -> log::LevelFilter {
    if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

fn parse_u32(text: &str) -> Result<u32, String> {
    let text = text.replace('_', "");
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("{text:?}: {e}"))
}

fn parse_level(text: &str) -> Result<log::LevelFilter, String> {
    text.parse().map_err(|_| format!("unknown log level {text:?}"))
}

fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "arm7-core", "arm7-run")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

fn parse_config(path: &Path, text: &str) -> Result<Config, RunnerError> {
    toml::from_str(text).map_err(|source| RunnerError::ConfigParse { path: path.to_path_buf(), source })
}

/// An explicit `--config` must exist; the per-user file is optional.
fn load_config(explicit: Option<&Path>) -> Result<Config, RunnerError> {
    if let Some(path) = explicit {
        let text = fs::read_to_string(path)
            .map_err(|source| RunnerError::ConfigRead { path: path.to_path_buf(), source })?;
        return parse_config(path, &text);
    }
    let Some(mut path) = config_dir() else {
        return Ok(Config::default());
    };
    path.push("config.toml");
    match fs::read_to_string(&path) {
        Ok(text) => parse_config(&path, &text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
        Err(source) => Err(RunnerError::ConfigRead { path, source }),
    }
}

fn flush_logs() {
    for entry in log_buffer::drain_logs() {
        eprintln!("{entry}");
    }
}

fn dump_registers(emu: &Emulator) {
    let cpu = emu.cpu();
    for (row, chunk) in cpu.regs().chunks(4).enumerate() {
        let line: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(i, value)| format!("r{:<2}={value:#010x}", row * 4 + i))
            .collect();
        println!("{}", line.join(" "));
    }
    println!(
        "cpsr={:?} mode={:?} state={:?} spsr={}",
        cpu.cpsr(),
        cpu.mode(),
        cpu.state(),
        cpu.spsr().map_or_else(|| "-".to_string(), |v| format!("{v:#010x}"))
    );
    println!("cycles={}", emu.cycles());
}

fn run(settings: &Settings) -> Result<(), RunnerError> {
    let mut emu = Emulator::new(settings.bus);
    emu.load_image_file(&settings.image, settings.load_address)?;
    emu.boot(settings.entry, settings.thumb);
    if !settings.breakpoints.is_empty() {
        let set = BreakpointSet::with_addresses(settings.breakpoints.iter().copied());
        emu.cpu_mut().attach_debugger(Box::new(set));
    }
    log::info!(
        "running {} from {:#010x} ({} steps)",
        settings.image.display(),
        settings.entry,
        settings.steps
    );

    for step in 1..=settings.steps {
        emu.step_cpu();
        if settings.irq_period != 0 && step % settings.irq_period == 0 {
            emu.signal_irq();
        }
        if step % LOG_FLUSH_INTERVAL == 0 {
            flush_logs();
        }
    }
    flush_logs();
    dump_registers(&emu);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let settings = load_config(args.config.as_deref()).and_then(|config| Settings::resolve(args, config));
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = log_buffer::init_logger(settings.log_level) {
        eprintln!("logger already set: {e}");
    }

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            flush_logs();
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["arm7-run", "image.bin"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_without_config() {
        let settings = Settings::resolve(args(&[]), Config::default()).unwrap();
        assert_eq!(settings.image, PathBuf::from("image.bin"));
        assert_eq!(settings.load_address, 0);
        assert_eq!(settings.entry, 0);
        assert!(!settings.thumb);
        assert_eq!(settings.steps, DEFAULT_STEPS);
        assert_eq!(settings.irq_period, 0);
        assert_eq!(settings.bus, BusConfig::default());
    }

    #[test]
    fn entry_follows_load_address() {
        let settings = Settings::resolve(args(&["--load-address", "0x8000"]), Config::default()).unwrap();
        assert_eq!(settings.entry, 0x8000);
    }

    #[test]
    fn flags_override_file() {
        let config = parse_config(
            Path::new("config.toml"),
            r#"
                load_address = 0x100
                entry = 0x104
                steps = 10
                irq_period = 5
                breakpoints = [0x200]
                log_level = "warn"

                [memory]
                ram_size = 65536
                non_sequential_wait = 2
            "#,
        )
        .unwrap();
        let settings = Settings::resolve(
            args(&["--entry", "0x110", "--steps", "99", "--break", "0x300", "--log-level", "trace"]),
            config,
        )
        .unwrap();

        assert_eq!(settings.load_address, 0x100);
        assert_eq!(settings.entry, 0x110);
        assert_eq!(settings.steps, 99);
        assert_eq!(settings.irq_period, 5);
        assert_eq!(settings.breakpoints, [0x200, 0x300]);
        assert_eq!(settings.log_level, log::LevelFilter::Trace);
        assert_eq!(settings.bus.ram_size, 65536);
        assert_eq!(settings.bus.wait_states, WaitStates { sequential: 0, non_sequential: 2 });
    }

    #[test]
    fn thumb_from_either_source() {
        let config = Config { thumb: Some(true), ..Config::default() };
        assert!(Settings::resolve(args(&[]), config).unwrap().thumb);
        assert!(Settings::resolve(args(&["--thumb"]), Config::default()).unwrap().thumb);
    }

    #[test]
    fn bad_file_level_is_an_error() {
        let config = Config { log_level: Some("loud".into()), ..Config::default() };
        let err = Settings::resolve(args(&[]), config).unwrap_err();
        assert!(matches!(err, RunnerError::LogLevel(name) if name == "loud"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_config(Path::new("c.toml"), "stepz = 3").unwrap_err();
        assert!(matches!(err, RunnerError::ConfigParse { .. }));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/arm7.toml"))).unwrap_err();
        assert!(matches!(err, RunnerError::ConfigRead { .. }));
    }

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_u32("0x0800_0000"), Ok(0x0800_0000));
        assert_eq!(parse_u32("4096"), Ok(4096));
        assert!(parse_u32("0xZZ").is_err());
        assert_eq!(parse_level("WARN"), Ok(log::LevelFilter::Warn));
    }
}
