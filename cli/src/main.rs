mod output;
mod playback;
mod render;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::error;
use tonecast_core::{
    symbol_queue, ModemConfig, ModemError, Result, Session, SessionReport, Synthesizer,
    DEFAULT_QUEUE_CAPACITY, FREQ_HIGH, FREQ_LOW, FREQ_START0, FREQ_START1, SAMPLE_RATE,
    SYMBOL_RATE,
};

use crate::output::Output;
use crate::playback::DevicePlayback;
use crate::render::WavRender;

#[derive(Parser)]
#[command(name = "tonecast")]
#[command(about = "Transmit text as an audible FSK signal, one line at a time")]
struct Cli {
    /// Read text from this file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Render to a 16-bit mono WAV file instead of the audio device
    #[arg(short, long, value_name = "OUTPUT.WAV")]
    output: Option<PathBuf>,

    /// Output sample rate (Hz)
    #[arg(long, default_value_t = SAMPLE_RATE)]
    sample_rate: u32,

    /// Symbols per second
    #[arg(long, default_value_t = SYMBOL_RATE)]
    symbol_rate: u32,

    /// First preamble tone (Hz)
    #[arg(long, default_value_t = FREQ_START0)]
    freq_start0: f64,

    /// Second preamble tone (Hz)
    #[arg(long, default_value_t = FREQ_START1)]
    freq_start1: f64,

    /// Tone for a 0 bit (Hz)
    #[arg(long, default_value_t = FREQ_LOW)]
    freq_low: f64,

    /// Tone for a 1 bit (Hz)
    #[arg(long, default_value_t = FREQ_HIGH)]
    freq_high: f64,

    /// Symbols buffered between input and audio
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// How often to check whether transmission finished (milliseconds)
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    drain_poll_ms: u64,

    /// Give up after this many seconds if the output stops taking symbols
    /// (while input is being queued or while waiting for it to finish)
    #[arg(long, value_name = "SECS")]
    drain_timeout: Option<f64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn modem_config(&self) -> Result<ModemConfig> {
        let drain_timeout = match self.drain_timeout {
            Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|e| {
                ModemError::InvalidConfig(format!("invalid drain timeout {}: {}", secs, e))
            })?),
            None => None,
        };

        let config = ModemConfig {
            sample_rate: self.sample_rate,
            symbol_rate: self.symbol_rate,
            freq_start0: self.freq_start0,
            freq_start1: self.freq_start1,
            freq_low: self.freq_low,
            freq_high: self.freq_high,
            queue_capacity: self.queue_capacity,
            drain_poll_interval: Duration::from_millis(self.drain_poll_ms),
            drain_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(report) => {
            println!(
                "Sent {} line(s), {} byte(s) as {} symbols",
                report.lines, report.bytes, report.symbols
            );
            ExitCode::SUCCESS
        }
        Err(e @ ModemError::DeviceUnavailable(_)) => {
            error!("{}", e);
            eprintln!("Failed to set up audio: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: &Cli) -> Result<SessionReport> {
    let config = cli.modem_config()?;

    // Open input before starting audio so a bad path fails fast
    let input: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };

    let (sender, receiver) = symbol_queue(config.queue_capacity);

    // The device may run at a different rate than requested; it builds its own synthesizer
    let output: Box<dyn Output> = match &cli.output {
        Some(path) => {
            let synth = Synthesizer::new(&config, receiver);
            Box::new(WavRender::start(path, &config, synth)?)
        }
        None => Box::new(DevicePlayback::start(&config, receiver)?),
    };

    println!("Let's go.");

    let mut session = Session::new(config, sender);
    let transmitted = session.transmit(input);
    let stopped = output.finish();

    let report = transmitted?;
    stopped?;
    Ok(report)
}
