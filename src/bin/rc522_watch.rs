use clap::Parser;
use embedded_hal::digital::{ErrorType, OutputPin};
use rc522_reader::config::{BCM2835_CORE_CLOCK_HZ, DEFAULT_CLOCK_DIVIDER, DEFAULT_DELAY_MS};
use rc522_reader::{
    CancellationToken, Config, PollerStatus, PollingScheduler, RfidRc522, StdoutDiagnostics,
    Poller,
};
use rppal::gpio::{self, Gpio};
use rppal::hal::Delay;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::convert::Infallible;
use std::error::Error;
use std::time::Duration;

/// Prints the UID of every card put on an RC522 reader, and `null` when it is
/// taken away.
#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Milliseconds between two polls
    #[arg(long, short = 'd', env = "RC522_DELAY", default_value_t = DEFAULT_DELAY_MS)]
    delay: u32,
    /// Divider applied to the 250 MHz core clock for SPI
    #[arg(long = "clock-divider", short = 'c', default_value_t = DEFAULT_CLOCK_DIVIDER)]
    clock_divider: u16,
    /// Write driver diagnostics to stdout
    #[arg(long, env = "RC522_DEBUG")]
    debug: bool,
    /// BCM GPIO wired to the reader's RST line
    #[arg(long = "reset-pin", short = 'r')]
    reset_pin: Option<u8>,
    /// BCM GPIO driven as chip select instead of the SPI0 CE0 line
    #[arg(long = "cs-pin")]
    cs_pin: Option<u8>,
}

/// Chip select of the reader's SDA line.
enum ChipSelect {
    /// CE0, framed by the kernel around every transfer.
    Hardware,
    Gpio(gpio::OutputPin),
}

impl ErrorType for ChipSelect {
    type Error = Infallible;
}

impl OutputPin for ChipSelect {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if let ChipSelect::Gpio(pin) = self {
            pin.set_low();
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        if let ChipSelect::Gpio(pin) = self {
            pin.set_high();
        }
        Ok(())
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = Config::default()
        .with_delay_ms(cli.delay)
        .with_clock_divider(cli.clock_divider)
        .with_debug(cli.debug);
    config.validate()?;

    let gpio = Gpio::new()?;
    let cs = match cli.cs_pin {
        Some(pin) => ChipSelect::Gpio(gpio.get(pin)?.into_output_high()),
        None => ChipSelect::Hardware,
    };
    // Every register access is a single transfer, so CE0 frames it.
    let spi = Spi::new(
        Bus::Spi0,
        SlaveSelect::Ss0,
        config.spi_clock_hz(BCM2835_CORE_CLOCK_HZ),
        Mode::Mode0,
    )?;

    let mut reader =
        RfidRc522::new(spi, cs, Delay::new(), config).with_diagnostics(StdoutDiagnostics);
    if let Some(pin) = cli.reset_pin {
        let mut reset = gpio.get(pin)?.into_output();
        reset.set_reset_on_drop(false);
        let version = reader.init_with_reset(&mut reset)?;
        if cli.debug {
            println!("reader version: {:#04x}", version);
        }
    }

    let mut poller = Poller::new(PollingScheduler::new(reader));
    let handle = poller.start()?;
    let _subscription = handle.subscribe(|uid| match uid {
        Some(uid) => println!("{}", uid),
        None => println!("null"),
    });

    let token = CancellationToken::new();
    let token_clone = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("Ctrl+C received, stopping...");
        token_clone.cancel();
    })?;

    while !token.sleep(Duration::from_millis(100)) {
        if let PollerStatus::Faulted(err) = handle.status() {
            poller.stop()?;
            return Err(err.into());
        }
    }

    poller.stop()?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(error) = run(cli) {
        eprintln!("error: {}", error);
        std::process::exit(1);
    }
}
