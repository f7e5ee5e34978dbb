use color_eyre::eyre::Context;
use color_eyre::{Report, Result};
use embedded_hal::digital::{InputPin as _, PinState};
use gpiocdev_embedded_hal::{InputPin, OutputPin};
use sensors::relay::RelayError;
use sensors::{DigitalOutput, PinId, RelayTable};
use tracing::{debug, instrument};

const CHIP: &str = "/dev/gpiochip0";

/// Relays wired on every station.
const DEFAULT_RELAYS: [(&str, u32); 1] = [("liquid_nitrogen_relay", 23)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Action {
    On,
    Off,
    Status,
}

/// Parses `name=pin` from the command line.
pub fn parse_relay(arg: &str) -> Result<(String, u32), String> {
    let (name, pin) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected <name>=<pin>, got: {arg}"))?;
    let pin = pin
        .parse()
        .map_err(|e| format!("pin must be a gpio line number: {e}"))?;
    Ok((name.to_owned(), pin))
}

pub fn table(extra: &[(String, u32)]) -> Result<RelayTable, RelayError> {
    let mut table = RelayTable::new();
    for (name, pin) in DEFAULT_RELAYS {
        table.add_relay(name, pin)?;
    }
    for (name, pin) in extra {
        table.add_relay(name.as_str(), *pin)?;
    }
    Ok(table)
}

/// Returns whether the relay is on afterwards.
#[instrument(skip(table))]
pub fn run(table: &RelayTable, id: &PinId, action: Action) -> Result<bool> {
    let line = table
        .resolve(id)
        .wrap_err_with(|| format!("Can not use {id}"))?;
    debug!("{id} is gpio line {line}");

    match action {
        Action::On | Action::Off => {
            let on = action == Action::On;
            let mut pin = OutputPin::new(CHIP, line, PinState::from(on))
                .map_err(Report::new)
                .wrap_err_with(|| format!("Could not claim gpio {line} as output"))?;
            switch(&mut pin, on).map_err(Report::new)
        }
        // like the relay board has always been read: the line is claimed as
        // input, which stops driving it
        Action::Status => {
            let mut pin = InputPin::new(CHIP, line)
                .map_err(Report::new)
                .wrap_err_with(|| format!("Could not claim gpio {line} as input"))?;
            pin.is_high().map_err(Report::new)
        }
    }
}

fn switch<O: DigitalOutput>(output: &mut O, on: bool) -> Result<bool, O::Error> {
    output.set_state(on)?;
    output.get_state()
}
