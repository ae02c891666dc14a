//! CPU core seam.
//!
//! The BIOS harness never decodes instructions itself; it drives a
//! guest machine through the [`CpuCore`] trait: named registers, bulk
//! memory access, breakpoints, and a single-step operation. `Z80Core`
//! is the shipped implementation, backed by the `z80emu` crate.

use std::collections::HashSet;
use std::num::NonZeroU16;

use z80emu::host::TsCounter;
use z80emu::{Clock, Cpu, Io, Memory, Reg8, StkReg16, Z80NMOS};

/// Type alias for the clock.
type TsClock = TsCounter<i32>;

/// Outcome of driving the core one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// One instruction executed.
    Executed,
    /// PC sits on a registered breakpoint; nothing was executed.
    Breakpoint(u16),
    /// The CPU executed a HALT.
    Halted,
}

/// The guest machine abstraction the BIOS harness is written against.
pub trait CpuCore {
    fn reg_a(&self) -> u8;
    fn set_reg_a(&mut self, value: u8);
    fn reg_c(&self) -> u8;
    fn reg_bc(&self) -> u16;
    fn set_reg_bc(&mut self, value: u16);
    fn reg_hl(&self) -> u16;
    fn set_reg_hl(&mut self, value: u16);
    fn sp(&self) -> u16;
    fn set_sp(&mut self, value: u16);
    fn pc(&self) -> u16;
    fn set_pc(&mut self, value: u16);

    fn read_byte(&self, addr: u16) -> u8;
    fn write_byte(&mut self, addr: u16, value: u8);

    /// Bulk guest-memory write starting at `addr`.
    fn write_mem_block(&mut self, addr: u16, bytes: &[u8]);

    /// Bulk guest-memory read starting at `addr`, filling `buf`.
    /// Bytes past the top of memory are left untouched in `buf`.
    fn read_mem_block(&self, addr: u16, buf: &mut [u8]);

    /// Arm a trap: `step` reports instead of executing at this address.
    fn set_breakpoint(&mut self, addr: u16);

    /// Drive the core one step, honouring breakpoints.
    fn step(&mut self) -> StepEvent;

    /// Execute exactly one instruction, ignoring breakpoints. Used to
    /// run the RET planted at a BIOS vector once its trap has been
    /// serviced.
    fn step_over(&mut self) -> StepEvent;
}

/// Memory/IO bus for the Z80: flat 64K RAM, no I/O devices.
struct Bus<'a> {
    memory: &'a mut [u8; 65536],
}

impl Memory for Bus<'_> {
    type Timestamp = i32;

    fn read_debug(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn read_mem(&self, addr: u16, _ts: Self::Timestamp) -> u8 {
        self.memory[addr as usize]
    }

    fn write_mem(&mut self, addr: u16, value: u8, _ts: Self::Timestamp) {
        self.memory[addr as usize] = value;
    }
}

impl Io for Bus<'_> {
    type Timestamp = i32;
    type WrIoBreak = ();
    type RetiBreak = ();

    fn read_io(&mut self, _port: u16, _ts: Self::Timestamp) -> (u8, Option<NonZeroU16>) {
        (0xFF, None)
    }

    fn write_io(
        &mut self,
        _port: u16,
        _value: u8,
        _ts: Self::Timestamp,
    ) -> (Option<Self::WrIoBreak>, Option<NonZeroU16>) {
        (None, None)
    }
}

/// `z80emu`-backed guest machine with 64KB of RAM.
pub struct Z80Core {
    cpu: Z80NMOS,
    clock: TsClock,
    memory: Box<[u8; 65536]>,
    breakpoints: HashSet<u16>,
}

impl Z80Core {
    pub fn new() -> Self {
        let mut cpu = Z80NMOS::default();
        cpu.reset();
        Self {
            cpu,
            clock: TsClock::default(),
            memory: Box::new([0; 65536]),
            breakpoints: HashSet::new(),
        }
    }

    /// Elapsed T-states, for session reporting.
    pub fn t_states(&self) -> u64 {
        self.clock.as_timestamp() as u64
    }
}

impl Default for Z80Core {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuCore for Z80Core {
    fn reg_a(&self) -> u8 {
        self.cpu.get_reg(Reg8::A, None)
    }

    fn set_reg_a(&mut self, value: u8) {
        self.cpu.set_reg(Reg8::A, None, value);
    }

    fn reg_c(&self) -> u8 {
        self.cpu.get_reg(Reg8::C, None)
    }

    fn reg_bc(&self) -> u16 {
        self.cpu.get_reg16(StkReg16::BC)
    }

    fn set_reg_bc(&mut self, value: u16) {
        self.cpu.set_reg16(StkReg16::BC, value);
    }

    fn reg_hl(&self) -> u16 {
        self.cpu.get_reg16(StkReg16::HL)
    }

    fn set_reg_hl(&mut self, value: u16) {
        self.cpu.set_reg16(StkReg16::HL, value);
    }

    fn sp(&self) -> u16 {
        self.cpu.get_sp()
    }

    fn set_sp(&mut self, value: u16) {
        self.cpu.set_sp(value);
    }

    fn pc(&self) -> u16 {
        self.cpu.get_pc()
    }

    fn set_pc(&mut self, value: u16) {
        self.cpu.set_pc(value);
    }

    fn read_byte(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }

    fn write_mem_block(&mut self, addr: u16, bytes: &[u8]) {
        let start = addr as usize;
        let end = (start + bytes.len()).min(self.memory.len());
        self.memory[start..end].copy_from_slice(&bytes[..end - start]);
    }

    fn read_mem_block(&self, addr: u16, buf: &mut [u8]) {
        let start = addr as usize;
        let end = (start + buf.len()).min(self.memory.len());
        buf[..end - start].copy_from_slice(&self.memory[start..end]);
    }

    fn set_breakpoint(&mut self, addr: u16) {
        self.breakpoints.insert(addr);
    }

    fn step(&mut self) -> StepEvent {
        let pc = self.cpu.get_pc();
        if self.breakpoints.contains(&pc) {
            return StepEvent::Breakpoint(pc);
        }
        self.step_over()
    }

    fn step_over(&mut self) -> StepEvent {
        let mut bus = Bus {
            memory: &mut *self.memory,
        };
        let _ = self
            .cpu
            .execute_next(&mut bus, &mut self.clock, None::<fn(z80emu::CpuDebug)>);

        if self.cpu.is_halt() {
            StepEvent::Halted
        } else {
            StepEvent::Executed
        }
    }
}
