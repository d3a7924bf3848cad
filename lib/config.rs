/// Sample tick rate of the timer interrupt, in Hz.
pub const SAMPLE_RATE_HZ: u32 = 150;

/// Sample ticks discarded after the timer starts.
pub const SETTLE_TICKS: u32 = 15;

pub struct Version;

impl Version {
    pub const MAJOR: u8 = 0;
    pub const MINOR: u8 = 3;
    pub const PROTOCOL: u8 = 1;
    pub const PRODUCT: &'static str = "Air Pressure / Infrasound Logger";
}

pub struct Calibrate;

impl Calibrate {
    /// Samples averaged into the baseline.
    pub const ITEMS: u16 = 32;
}

pub struct LogFile;

impl LogFile {
    pub const BASE: &'static str = "APSMPL";
    pub const EXT: &'static str = ".DAT";
    /// Highest id a two digit suffix can carry.
    pub const MAX_ID: u8 = 99;
    /// Successful writes between two syncs.
    pub const SYNC_INTERVAL: u16 = 64;
}

pub struct Serial;

impl Serial {
    pub const BAUD_RATE: u32 = 115_200;
}

/// Error LED pattern once the device gave up.
pub struct ErrorBlink;

impl ErrorBlink {
    pub const ON_MS: u32 = 150;
    pub const OFF_MS: u32 = 850;
}

/// What the user button does when held during reset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "board", derive(defmt::Format))]
pub enum ButtonRole {
    Calibrate,
    StreamSerial,
}

pub const BUTTON_ROLE: ButtonRole = ButtonRole::Calibrate;

/// Calibrate on every start, independent of the button.
pub const ALWAYS_CALIBRATE: bool = false;

/// Startup behaviour, resolved once before sampling begins.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "board", derive(defmt::Format))]
pub struct StartupConfig {
    pub calibrate: bool,
    pub stream_serial: bool,
}

impl StartupConfig {
    pub fn resolve(role: ButtonRole, pressed: bool, always_calibrate: bool) -> Self {
        let mut config = StartupConfig {
            calibrate: always_calibrate,
            stream_serial: false,
        };
        if pressed {
            match role {
                ButtonRole::Calibrate => config.calibrate = true,
                ButtonRole::StreamSerial => config.stream_serial = true,
            }
        }
        config
    }

    /// Without storage the serial line is the only record left.
    pub fn without_storage(self) -> Self {
        StartupConfig {
            stream_serial: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_selects_calibration() {
        let config = StartupConfig::resolve(ButtonRole::Calibrate, true, false);
        assert!(config.calibrate);
        assert!(!config.stream_serial);

        let config = StartupConfig::resolve(ButtonRole::Calibrate, false, false);
        assert_eq!(config, StartupConfig::default());
    }

    #[test]
    fn button_selects_serial_with_forced_calibration() {
        let config = StartupConfig::resolve(ButtonRole::StreamSerial, true, true);
        assert!(config.calibrate);
        assert!(config.stream_serial);
    }

    #[test]
    fn storage_failure_forces_serial() {
        let config = StartupConfig::resolve(ButtonRole::Calibrate, true, false).without_storage();
        assert!(config.calibrate);
        assert!(config.stream_serial);
    }
}
