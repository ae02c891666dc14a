//! CP/M CLI - boot a CP/M 2.2 machine from the command line.
//!
//! Usage:
//!   cpm80 [--bdos bdos.bin] [--ccp ccp.bin] [commands...]
//!
//! Examples:
//!   cpm80                          # interactive keyboard session
//!   cpm80 DIR "TYPE FOO.TXT"       # scripted session, then exit
//!   cpm80 --trace DIR              # report trapped BIOS calls

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};

use cpm80_core::{
    ConsoleInput, ConsoleOutput, ExitReason, KeyTranslator, Machine, ScriptedInput, Z80Core,
    HOST_BACKSPACE,
};

/// CP/M BIOS harness CLI
#[derive(Parser, Debug)]
#[command(name = "cpm80")]
#[command(about = "Boot a CP/M 2.2 machine")]
struct Args {
    /// BDOS binary image
    #[arg(long, default_value = "bdos.bin")]
    bdos: PathBuf,

    /// CCP binary image
    #[arg(long, default_value = "ccp.bin")]
    ccp: PathBuf,

    /// Report trapped BIOS calls on stderr
    #[arg(short, long)]
    trace: bool,

    /// Pre-scripted command lines; interactive keyboard when absent
    commands: Vec<String>,
}

/// Holds the terminal in raw mode, restoring it on every exit path.
struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        // Gracefully handle non-TTY stdin.
        Self {
            active: enable_raw_mode().is_ok(),
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
        }
    }
}

/// Translate crossterm key events to host key bytes.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<u8> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_uppercase() {
                return Some(upper as u8 - 64); // Ctrl+A=1, Ctrl+C=3, etc.
            }
        }
    }

    match code {
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        KeyCode::Enter => Some(13),
        KeyCode::Backspace => Some(HOST_BACKSPACE),
        KeyCode::Tab => Some(9),
        KeyCode::Esc => Some(27),
        _ => None,
    }
}


/// Live keyboard: one blocking single-key read per call, raw mode held
/// only for the duration of the read.
struct InteractiveInput {
    keys: KeyTranslator,
}

impl InteractiveInput {
    fn new() -> Self {
        Self {
            keys: KeyTranslator::new(),
        }
    }
}

impl ConsoleInput for InteractiveInput {
    fn input(&mut self) -> Option<u8> {
        let _raw = RawModeGuard::enable();
        loop {
            let event = event::read().ok()?;
            if let Event::Key(key) = event {
                if let Some(byte) = translate_key(key.code, key.modifiers) {
                    return self.keys.accept(byte);
                }
            }
        }
    }
}

/// Live display: every guest byte goes straight to stdout, flushed so
/// it is visible before the next blocking read.
struct TerminalOutput;

impl ConsoleOutput for TerminalOutput {
    fn output(&mut self, byte: u8) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        match byte {
            0x0D => {
                let _ = handle.write_all(b"\r");
            }
            0x0A => {
                let _ = handle.write_all(b"\n");
            }
            0x08 => {
                let _ = handle.write_all(b"\x08 \x08");
            }
            _ => {
                let _ = handle.write_all(&[byte]);
            }
        }
        let _ = handle.flush();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let bdos = std::fs::read(&args.bdos)
        .map_err(|e| format!("failed to read {}: {}", args.bdos.display(), e))?;
    let ccp = std::fs::read(&args.ccp)
        .map_err(|e| format!("failed to read {}: {}", args.ccp.display(), e))?;

    let reader: Box<dyn ConsoleInput> = if args.commands.is_empty() {
        Box::new(InteractiveInput::new())
    } else {
        Box::new(ScriptedInput::new(&args.commands))
    };

    let mut machine = Machine::new(Z80Core::new(), reader, TerminalOutput, bdos, ccp);
    machine.trace = args.trace;

    machine.boot_cold_boot()?;
    let info = machine.run()?;

    if args.trace {
        eprintln!(
            "\nSession ended: {:?} (PC={:#06X}, {} T-states)",
            info.reason,
            info.pc,
            machine.cpu().t_states()
        );
    }
    if info.reason == ExitReason::EndOfInput {
        // Leave the shell prompt on its own line.
        println!();
    }

    Ok(())
}
