//! CP/M-80 2.2 BIOS Harness Core
//!
//! This crate hosts a guest Z80 CPU core and supplies everything that
//! makes it behave as a running CP/M 2.2 machine:
//! - the BIOS jump table and its breakpoint-trap dispatch
//! - the boot sequence (BDOS/CCP image loading, page zero, disk tables)
//! - sector-level disk emulation for one fixed geometry
//! - console I/O abstraction
//!
//! # Architecture
//!
//! The harness uses a layered design:
//! - `CpuCore` trait: the instruction-executing guest machine
//! - `DiskFormat`/`DiskImage`/`DiskDrive`: sector transport for drive A
//! - `ConsoleInput`/`ConsoleOutput` traits: keyboard and display
//! - `Machine`: boots the system and services trapped BIOS calls

pub mod bios;
pub mod console;
pub mod cpu;
pub mod disk;
pub mod error;
pub mod machine;

pub use bios::{addr, BiosCall};
pub use console::{
    CapturedOutput, ConsoleInput, ConsoleOutput, KeyTranslator, ScriptedInput, CPM_BACKSPACE,
    CTRL_C, HOST_BACKSPACE,
};
pub use cpu::{CpuCore, StepEvent, Z80Core};
pub use disk::{DiskDrive, DiskFormat, DiskImage, ERASED_FILL, SECTOR_SIZE};
pub use error::{CpmError, CpmResult};
pub use machine::Machine;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Console input was exhausted or cancelled.
    EndOfInput,
    /// The guest CPU halted.
    Halted,
}

/// Information about a finished session.
#[derive(Debug, Clone)]
pub struct ExitInfo {
    pub reason: ExitReason,
    pub pc: u16,
}
