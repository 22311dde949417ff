use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::process::ExitCode;

use mfclone::com_spi::ComSpi;
use mfclone::dump::Dump;
use mfclone::mfrc522::MFRC522;
use mfclone::sequencer::{self, Detection};
use mfclone::transport::{FrameTransport, Transceiver};
use mfclone::writer::{BlockWriter, FailurePolicy, Stop};

/// Write a 1K dump onto a backdoored (UID-rewritable) MIFARE Classic clone.
#[derive(Parser, Debug)]
#[command(name = "mfclone", version)]
struct Cli {
    /// Raw 1024 byte card dump
    #[arg(required_unless_present = "blank")]
    dump: Option<PathBuf>,

    /// Quiet mode. Suppress the frame echo (improves timing)
    #[arg(short, long)]
    quiet: bool,

    /// Stop at the first block that fails instead of carrying on
    #[arg(long)]
    strict: bool,

    /// Write a factory blank image instead of a dump file
    #[arg(long, conflicts_with = "dump")]
    blank: bool,

    /// SPI device the MFRC522 is attached to
    #[arg(long, default_value = "/dev/spidev0.0")]
    device: PathBuf,

    /// SPI clock in Hz
    #[arg(long, default_value_t = 1_000_000)]
    spi_speed: u32,
}

fn open_reader(cli: &Cli) -> mfclone::Result<MFRC522<ComSpi>> {
    let com = ComSpi::open(&cli.device, cli.spi_speed)?;
    let mut mfrc = MFRC522::new(com);
    mfrc.init()?;
    mfrc.configure_raw()?;
    Ok(mfrc)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _ = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let dump = match &cli.dump {
        Some(path) => {
            log::info!("Dump from file: {}", path.display());
            match Dump::load(path) {
                Ok(dump) => dump,
                Err(e) => {
                    log::error!("Could not read dump file {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => Dump::factory_blank(),
    };

    let mfrc = match open_reader(&cli) {
        Ok(mfrc) => mfrc,
        Err(e) => {
            log::error!("Error opening NFC reader {}: {}", cli.device.display(), e);
            return ExitCode::FAILURE;
        }
    };
    log::info!("NFC reader: {} opened", cli.device.display());

    let mut transport = FrameTransport::new(mfrc).with_echo(!cli.quiet);

    let unlocked = match sequencer::detect(&mut transport) {
        Detection::BackdoorConfirmed(unlocked) => unlocked,
        Detection::NotBackdoored => return ExitCode::SUCCESS,
    };

    let policy = if cli.strict {
        FailurePolicy::Abort
    } else {
        FailurePolicy::Continue
    };
    let report = BlockWriter::new(&dump)
        .with_policy(policy)
        .run(&mut transport, &unlocked);

    let failed: Vec<u8> = report.failed().map(|o| o.index).collect();
    match report.stop {
        Some(Stop::Aborted { index, stage }) => {
            log::error!("Aborted at block {} ({:?} frame)", index, stage);
            return ExitCode::FAILURE;
        }
        Some(Stop::Cancelled { next_index }) => {
            log::warn!("Cancelled before block {}", next_index);
            return ExitCode::FAILURE;
        }
        None => {}
    }
    if failed.is_empty() {
        log::info!("Wrote {} blocks", report.outcomes.len());
    } else {
        log::warn!(
            "{} of {} blocks failed and were not retried: {:?}",
            failed.len(),
            report.outcomes.len(),
            failed
        );
    }
    ExitCode::SUCCESS
}
