mod helper;
mod lcd;
mod sd;
mod timers;
mod uart;

pub use helper::*;
pub use lcd::IliError;
pub use sd::{SdError, SdVolume};
pub use timers::SampleTimer;
pub use uart::UartTx;
