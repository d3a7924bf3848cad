pub type Result<T, E> = core::result::Result<T, Error<E>>;

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "board", derive(defmt::Format))]
pub enum Error<E> {
    // Hw collaborator error (SPI, storage, LCD)
    Bus(E),
    // Sensor answered with an unknown chip id
    ChipId(u8),
    // Sensor mode not implemented
    UnsupportedMode(u8),
    // Burst read outside 1..=4 bytes
    ReadLength(u8),
    // Buffer
    BufferWrite,
}
