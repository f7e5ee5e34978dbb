use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Context;
use color_eyre::Result;
use sensors::PinId;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod devices;
mod logging;
mod relays;
mod station;

use devices::Reading;
use station::{successful, Setup, Station};

#[derive(Parser)]
#[command(name = "env-station")]
#[command(version = "1.0")]
#[command(about = "reads the environment sensors on the rpi's i2c and spi buses and switches relays")]
struct Cli {
    /// i2c bus the bme280 and ms5611 are on
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c_bus: PathBuf,

    /// file with a `<name> <hex address>` line per sensor. Without it a
    /// bme280 at 0x76 is assumed.
    #[arg(short, long, default_value = "devices.txt")]
    devices: PathBuf,

    /// spi device the max6675 thermocouple amplifier is on, for example
    /// /dev/spidev0.0
    #[arg(short, long)]
    thermocouple: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// poll all sensors until stopped, printing a json line per reading
    Run {
        #[arg(short, long, default_value_t = 5000)]
        interval_ms: u64,
    },
    /// read all sensors once
    Read,
    /// switch a relay or report its state
    Relay {
        /// extra relay as name=gpio, may be repeated
        #[arg(long = "relay", value_parser = relays::parse_relay)]
        extra: Vec<(String, u32)>,
        /// relay name or gpio line number
        pin: PinId,
        #[arg(value_enum)]
        action: relays::Action,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::setup();

    if let Command::Relay { extra, pin, action } = &cli.command {
        let table = relays::table(extra).wrap_err("Invalid relay configuration")?;
        let on = relays::run(&table, pin, *action)?;
        println!("{}", if on { "on" } else { "off" });
        return Ok(());
    }

    let mut station = Station::init(Setup {
        i2c_bus: &cli.i2c_bus,
        device_list: &cli.devices,
        thermocouple: cli.thermocouple.as_deref(),
    })?;

    let station = match cli.command {
        Command::Read => {
            let readings = successful(station.read_once());
            print_readings(&readings)?;
            station
        }
        Command::Run { interval_ms } => run(station, Duration::from_millis(interval_ms)).await?,
        Command::Relay { .. } => unreachable!("handled before opening the buses"),
    };

    station.shutdown();
    Ok(())
}

async fn run(station: Station, interval: Duration) -> Result<Station> {
    let (tx, mut rx) = mpsc::channel(100);
    let monitor = station.start_monitoring(interval, tx);
    info!("polling sensors every {interval:?}");

    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some(Ok(readings)) => print_readings(&readings)?,
                Some(Err(report)) => warn!("{report:?}"),
                None => break,
            },
            res = tokio::signal::ctrl_c() => {
                res.wrap_err("Could not listen for ctrl-c")?;
                info!("stopping");
                break;
            }
        }
    }

    // unblocks the monitoring thread if it is waiting to send
    drop(rx);
    monitor.stop()
}

fn print_readings(readings: &[Reading]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for reading in readings {
        serde_json::to_writer(&mut stdout, reading)?;
        writeln!(stdout)?;
    }
    stdout.flush()?;

    if let Some(height) = devices::height_difference(readings) {
        info!("inside sensor is {height:.2} m above the outside one");
    }
    Ok(())
}
