use core::fmt;

/// Errors a driver can run into. The bus error `E` is kept as is so the
/// caller can still inspect it (nack, arbitration lost, io error...).
///
/// Note there is no variant for an illegal oversampling or mode value: those
/// are ignored, see [`crate::bme280::Bme280::set_pressure_oversampling`].
#[derive(Debug, thiserror::Error)]
pub enum Error<E: fmt::Debug> {
    #[error("Bus transfer failed: {0:?}")]
    Transport(E),
    #[error("No sensor answered at address {address:#04x}: {cause:?}")]
    NotPresent { address: u8, cause: E },
}

impl<E: fmt::Debug> Error<E> {
    pub fn bus_error(&self) -> &E {
        match self {
            Error::Transport(e) => e,
            Error::NotPresent { cause, .. } => cause,
        }
    }
}
