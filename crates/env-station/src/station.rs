use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use color_eyre::eyre::{eyre, Context};
use color_eyre::{Report, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use linux_embedded_hal::{I2cdev, SpidevDevice};
use sensors::max6675::Max6675;
use sensors::registry::load_device_list;
use sensors::{bme280, DeviceEntry, Registry, SharedBus};
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, instrument, warn};

use crate::devices::{self, I2cBus, Reading, Sensor, Values};

const THERMOCOUPLE: &str = "thermocouple";

const fn nonzero(n: u32) -> NonZeroU32 {
    match NonZeroU32::new(n) {
        Some(n) => n,
        None => panic!("quota can not be zero"),
    }
}

pub struct Setup<'a> {
    pub i2c_bus: &'a Path,
    pub device_list: &'a Path,
    pub thermocouple: Option<&'a Path>,
}

/// Owns every bus and every driver. Nothing is opened before [`Station::init`]
/// and everything is released by [`Station::shutdown`].
pub struct Station {
    i2c: I2cBus,
    sensors: Registry<Sensor>,
    thermocouple: Option<Max6675<SpidevDevice>>,
    err_report_limiter: DefaultDirectRateLimiter,
}

impl Station {
    #[instrument(skip_all)]
    pub fn init(setup: Setup) -> Result<Self> {
        let i2c = I2cdev::new(setup.i2c_bus)
            .inspect_err(|e| error!("Could not open i2c bus: {e}"))
            .wrap_err_with(|| format!("Could not open {}", setup.i2c_bus.display()))?;
        let i2c = SharedBus::new(i2c);

        let mut entries = load_device_list(setup.device_list).wrap_err("Bad device list")?;
        if entries.is_empty() {
            info!("no devices configured, assuming a bme280 at its default address");
            entries.push(DeviceEntry {
                name: "bme280".to_owned(),
                address: bme280::DEFAULT_ADDRESS,
            });
        }

        let mut sensors = Registry::new();
        for entry in &entries {
            let sensor = Sensor::open(entry, &i2c)?;
            if sensors.insert(entry.name.clone(), sensor).is_some() {
                warn!("device list names `{}` more than once, using the last", entry.name);
            }
        }

        let thermocouple = setup
            .thermocouple
            .map(devices::open_thermocouple)
            .transpose()?;

        let quota = Quota::per_hour(nonzero(4)).allow_burst(nonzero(20));
        Ok(Self {
            i2c,
            sensors,
            thermocouple,
            err_report_limiter: RateLimiter::direct(quota),
        })
    }

    /// Polls every sensor once. A failing sensor does not stop the others.
    pub fn read_once(&mut self) -> Vec<Result<Reading>> {
        let mut readings: Vec<_> = self
            .sensors
            .iter_mut()
            .map(|(name, sensor)| {
                sensor
                    .read()
                    .map(|values| Reading {
                        sensor: name.to_owned(),
                        values,
                    })
                    .wrap_err_with(|| format!("Could not read `{name}`"))
            })
            .collect();

        if let Some(thermocouple) = &mut self.thermocouple {
            let reading = thermocouple
                .read_celsius()
                .map(|reading| Reading {
                    sensor: THERMOCOUPLE.to_owned(),
                    values: Values::thermocouple(reading),
                })
                .map_err(Report::new)
                .wrap_err("Could not read thermocouple");
            readings.push(reading);
        }
        readings
    }

    /// Whether a failure should be reported. A sensor that keeps failing
    /// would otherwise flood the log.
    fn should_report(&self) -> bool {
        self.err_report_limiter.check().is_ok()
    }

    /// Moves the station to a thread that polls every `interval` until
    /// [`Monitor::stop`] is called or `tx` closes.
    pub fn start_monitoring(
        mut self,
        interval: Duration,
        tx: Sender<Result<Vec<Reading>>>,
    ) -> Monitor {
        let stop = Arc::new(AtomicBool::new(false));
        let should_stop = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            while !should_stop.load(Ordering::Relaxed) {
                let mut batch = Vec::new();
                for result in self.read_once() {
                    match result {
                        Ok(reading) => batch.push(reading),
                        Err(report) if self.should_report() => {
                            if tx.blocking_send(Err(report)).is_err() {
                                return self;
                            }
                        }
                        Err(report) => debug!("suppressed error report: {report}"),
                    }
                }

                if tx.blocking_send(Ok(batch)).is_err() {
                    debug!("receiver gone, stopping");
                    break;
                }
                thread::park_timeout(interval);
            }
            self
        });

        Monitor { stop, handle }
    }

    #[instrument(skip_all)]
    pub fn shutdown(self) {
        for (name, sensor) in self.sensors {
            if let Err(report) = sensor.park() {
                warn!("could not put `{name}` to sleep: {report:?}");
            }
        }
        drop(self.thermocouple);
        drop(self.i2c);
        info!("released all buses");
    }
}

/// Keeps the readings that worked, the failures are only logged.
pub fn successful(results: Vec<Result<Reading>>) -> Vec<Reading> {
    results
        .into_iter()
        .filter_map(|result| {
            result
                .inspect_err(|report| warn!("{report:?}"))
                .ok()
        })
        .collect()
}

pub struct Monitor {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Station>,
}

impl Monitor {
    /// Finishes the current poll and hands the station back.
    pub fn stop(self) -> Result<Station> {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.thread().unpark();
        self.handle
            .join()
            .map_err(|_| eyre!("Monitoring thread panicked"))
    }
}
