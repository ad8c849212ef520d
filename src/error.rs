//! The core's one typed, external-facing error type.
//!
//! Everything past the boot entry point (CPU decode, bus dispatch, PPU
//! state transitions) keeps the reference crate's `Result<T, String>`
//! idiom for paths that are defensive rather than part of the documented
//! contract; cartridge loading is the single fallible entry a host actually
//! needs to branch on, so it gets a real `std::error::Error` impl.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("cartridge image too small to contain a header ({0} bytes)")]
    RomTooSmall(usize),
    #[error("unsupported cartridge type byte {0:#04X} at 0x0147")]
    UnsupportedCartridgeType(u8),
    #[error("unsupported ROM size byte {0:#04X} at 0x0148")]
    UnsupportedRomSize(u8),
    #[error("unsupported RAM size byte {0:#04X} at 0x0149")]
    UnsupportedRamSize(u8),
    #[error("cartridge is CGB-only (byte 0x0143 == 0xC0); this core emulates DMG only")]
    CgbOnlyCartridge,
}
