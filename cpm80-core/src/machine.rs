//! The BIOS harness: boot sequence, disk tables, trap dispatch.
//!
//! `Machine` owns one disk drive and one console pair, loads the BDOS
//! and CCP images into guest memory, plants a RET plus breakpoint at
//! each BIOS jump-table entry, and services the resulting traps with
//! host handlers while the CPU core runs everything else.

use std::collections::HashMap;

use crate::bios::{addr, BiosCall};
use crate::console::{ConsoleInput, ConsoleOutput};
use crate::cpu::{CpuCore, StepEvent};
use crate::disk::{DiskDrive, DiskFormat, DiskImage, SECTOR_SIZE};
use crate::error::{CpmError, CpmResult};
use crate::{ExitInfo, ExitReason};

/// Length of the Disk Parameter Header: 8 little-endian words.
const DPH_LEN: usize = 16;

/// CP/M machine state: CPU core, drive A, console, BIOS vector map.
pub struct Machine<P: CpuCore, R: ConsoleInput, W: ConsoleOutput> {
    /// Guest CPU core.
    cpu: P,
    /// Drive A.
    drive: DiskDrive,
    /// Guest keyboard.
    reader: R,
    /// Guest display.
    writer: W,
    /// Sector transfer address.
    dma: u16,
    /// Bump cursor into the disk-tables heap past the jump table.
    heap: u16,
    /// Trap address -> BIOS call.
    vectors: HashMap<u16, BiosCall>,
    /// Disk Parameter Header address handed out by SELDSK.
    dph_addr: u16,
    /// Set when console input is exhausted.
    done: bool,
    /// BDOS binary image, kept for cold boot.
    bdos: Vec<u8>,
    /// CCP binary image, kept for warm boot reload.
    ccp: Vec<u8>,
    /// Report trapped BIOS calls on stderr.
    pub trace: bool,
}

impl<P: CpuCore, R: ConsoleInput, W: ConsoleOutput> Machine<P, R, W> {
    /// Create a machine around a CPU core, a console pair and the two
    /// opaque system images. Nothing is loaded until
    /// [`Machine::boot_cold_boot`].
    pub fn new(cpu: P, reader: R, writer: W, bdos: Vec<u8>, ccp: Vec<u8>) -> Self {
        Self {
            cpu,
            drive: DiskDrive::new(DiskImage::new(DiskFormat::new())),
            reader,
            writer,
            dma: addr::DEFAULT_DMA,
            heap: 0,
            vectors: HashMap::new(),
            dph_addr: 0,
            done: false,
            bdos,
            ccp,
            trace: false,
        }
    }

    pub fn cpu(&self) -> &P {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut P {
        &mut self.cpu
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn drive(&self) -> &DiskDrive {
        &self.drive
    }

    pub fn drive_mut(&mut self) -> &mut DiskDrive {
        &mut self.drive
    }

    /// Current sector transfer address.
    pub fn dma(&self) -> u16 {
        self.dma
    }

    /// Address of drive A's Disk Parameter Header.
    pub fn dph_addr(&self) -> u16 {
        self.dph_addr
    }

    /// Cold boot: load the system images, build page zero, the BIOS
    /// jump table and the disk tables, then warm boot into the CCP.
    /// Safe to call again; the tables are rebuilt in place.
    pub fn boot_cold_boot(&mut self) -> CpmResult<()> {
        let bdos_room = (addr::BIOS - addr::BDOS) as usize;
        if self.bdos.len() > bdos_room {
            return Err(CpmError::BdosImageTooLarge {
                size: self.bdos.len(),
                limit: addr::BIOS,
            });
        }
        let ccp_room = (addr::BDOS - addr::CCP) as usize;
        if self.ccp.len() > ccp_room {
            return Err(CpmError::CcpImageTooLarge {
                size: self.ccp.len(),
                limit: addr::BDOS,
            });
        }

        self.cpu.write_mem_block(addr::BDOS, &self.bdos);

        // Reset vector: JMP BIOS.
        let [lo, hi] = addr::BIOS.to_le_bytes();
        self.cpu.write_mem_block(0x0000, &[0xC3, lo, hi]);

        // Jump table: a RET at every entry, armed as a trap.
        self.vectors.clear();
        for (index, &call) in BiosCall::TABLE.iter().enumerate() {
            let vector = addr::BIOS + index as u16 * 3;
            self.cpu.write_byte(vector, 0xC9);
            self.cpu.set_breakpoint(vector);
            self.vectors.insert(vector, call);
        }

        self.build_disk_tables();

        self.cpu.set_sp(addr::INITIAL_SP);
        self.dma = addr::DEFAULT_DMA;

        // Page zero: JMP to the BDOS entry, current disk = A.
        let [lo, hi] = addr::BDOS_ENTRY.to_le_bytes();
        self.cpu.write_mem_block(addr::BDOS_VECTOR, &[0xC3, lo, hi]);
        self.cpu.write_byte(addr::CURRENT_DISK, 0);

        self.done = false;
        self.warm_boot();
        Ok(())
    }

    /// Reload the CCP image and restart it. BOOT and WBOOT traps both
    /// land here; everything else from the cold boot stays in place.
    fn warm_boot(&mut self) {
        self.cpu.write_mem_block(addr::CCP, &self.ccp);
        self.cpu.set_pc(addr::CCP);
    }

    /// Build the in-memory disk tables just past the jump table:
    /// DPB, directory buffer, check vector, allocation vector, then
    /// the DPH tying them together.
    fn build_disk_tables(&mut self) {
        self.heap = addr::BIOS + BiosCall::TABLE.len() as u16 * 3;
        let format = *self.drive.format();

        let dpb = self.heap_write(&format.dpb_bytes());
        let dirbuf = self.heap_zeroed(SECTOR_SIZE);
        let check_vector = self.heap_zeroed(format.check_vector_len());
        let alloc_vector = self.heap_zeroed(format.alloc_vector_len());

        let mut dph = [0u8; DPH_LEN];
        // Word 0 is the sector translation table; 0 means none (skew
        // factor 0). Words 1-3 are BDOS scratch.
        dph[8..10].copy_from_slice(&dirbuf.to_le_bytes());
        dph[10..12].copy_from_slice(&dpb.to_le_bytes());
        dph[12..14].copy_from_slice(&check_vector.to_le_bytes());
        dph[14..16].copy_from_slice(&alloc_vector.to_le_bytes());
        self.dph_addr = self.heap_write(&dph);
    }

    /// Copy bytes to the heap cursor, returning their guest address.
    fn heap_write(&mut self, bytes: &[u8]) -> u16 {
        let at = self.heap;
        self.cpu.write_mem_block(at, bytes);
        self.heap += bytes.len() as u16;
        at
    }

    fn heap_zeroed(&mut self, len: usize) -> u16 {
        self.heap_write(&vec![0u8; len])
    }

    /// Fetch/execute/trap loop. Returns when console input runs out,
    /// the CPU halts, or a handler reports a fatal condition.
    pub fn run(&mut self) -> CpmResult<ExitInfo> {
        loop {
            match self.cpu.step() {
                StepEvent::Breakpoint(pc) => {
                    if let Some(&call) = self.vectors.get(&pc) {
                        if self.trace {
                            eprintln!("[BIOS] {call:?} (PC={pc:#06X})");
                        }
                        self.dispatch(call)?;
                    }
                    // Run the RET planted at the vector, unless the
                    // handler moved PC (warm boot). A breakpoint with
                    // no registered handler falls through the same way.
                    if self.cpu.pc() == pc {
                        if let StepEvent::Halted = self.cpu.step_over() {
                            return Ok(self.exit(ExitReason::Halted));
                        }
                    }
                }
                StepEvent::Halted => {
                    return Ok(self.exit(ExitReason::Halted));
                }
                StepEvent::Executed => {}
            }

            if self.done {
                return Ok(self.exit(ExitReason::EndOfInput));
            }
        }
    }

    fn exit(&self, reason: ExitReason) -> ExitInfo {
        ExitInfo {
            reason,
            pc: self.cpu.pc(),
        }
    }

    /// Service one trapped BIOS call. Handlers communicate with the
    /// guest purely through register and memory side effects.
    fn dispatch(&mut self, call: BiosCall) -> CpmResult<()> {
        match call {
            BiosCall::Boot | BiosCall::WBoot => self.warm_boot(),

            BiosCall::ConStatus => {
                // Reads are blocking; never report a pending character.
                self.cpu.set_reg_a(0);
            }

            BiosCall::ConIn => match self.reader.input() {
                Some(byte) => self.cpu.set_reg_a(byte),
                None => self.done = true,
            },

            BiosCall::ConOut => {
                let byte = self.cpu.reg_c();
                self.writer.output(byte);
            }

            BiosCall::Home => self.drive.home(),

            BiosCall::SelDsk => {
                // Only drive A exists. HL = 0 tells BDOS the select
                // failed; that is guest-visible behaviour, not a fault.
                let hl = if self.cpu.reg_c() == 0 {
                    self.dph_addr
                } else {
                    0
                };
                self.cpu.set_reg_hl(hl);
            }

            BiosCall::SetTrk => {
                let track = self.cpu.reg_bc();
                self.drive.set_track(track);
            }

            BiosCall::SetSec => {
                let sector = self.cpu.reg_bc();
                self.drive.set_sector(sector);
            }

            BiosCall::SetDma => {
                self.dma = self.cpu.reg_bc();
            }

            BiosCall::Read => {
                let sector = self.drive.read_sector();
                self.cpu.write_mem_block(self.dma, &sector);
                // No disk-error simulation: reads always succeed.
                self.cpu.set_reg_a(0);
            }

            BiosCall::Write => {
                let mut sector = [0u8; SECTOR_SIZE];
                self.cpu.read_mem_block(self.dma, &mut sector);
                self.drive.write_sector(&sector);
                self.cpu.set_reg_a(0);
            }

            BiosCall::SecTran => {
                let physical = self.drive.translate_sector(self.cpu.reg_bc())?;
                self.cpu.set_reg_hl(physical);
            }

            BiosCall::List | BiosCall::Punch | BiosCall::Reader | BiosCall::ListStatus => {
                // CCP and BDOS never call these for the supported
                // operations; reaching one is a configuration error.
                return Err(CpmError::UnimplementedBios(call));
            }
        }

        Ok(())
    }
}
