//! End-to-end sessions through the trap loop.
//!
//! Small hand-assembled 8080 programs stand in for the CCP image, so
//! every byte that reaches a BIOS handler travels the same path a real
//! CP/M system would use: CALL into the jump table, trap, RET.

use cpm80_core::{
    addr, BiosCall, CapturedOutput, CpmError, CpuCore, ExitReason, Machine, ScriptedInput,
    Z80Core, ERASED_FILL, SECTOR_SIZE,
};

type TestMachine = Machine<Z80Core, ScriptedInput, CapturedOutput>;

/// CALL nn
fn call(vector: u16) -> [u8; 3] {
    let [lo, hi] = vector.to_le_bytes();
    [0xCD, lo, hi]
}

/// LD BC,nn
fn ld_bc(value: u16) -> [u8; 3] {
    let [lo, hi] = value.to_le_bytes();
    [0x01, lo, hi]
}

fn boot_with(ccp: Vec<u8>, commands: &[&str]) -> TestMachine {
    let mut machine = Machine::new(
        Z80Core::new(),
        ScriptedInput::new(commands),
        CapturedOutput::new(),
        vec![0xC9; 16],
        ccp,
    );
    machine.boot_cold_boot().unwrap();
    machine
}

#[test]
fn scripted_echo_session() {
    // loop: CALL CONIN; LD C,A; CALL CONOUT; JP loop
    let mut ccp = Vec::new();
    ccp.extend(call(BiosCall::ConIn.vector()));
    ccp.push(0x4F); // LD C,A
    ccp.extend(call(BiosCall::ConOut.vector()));
    ccp.extend([0xC3, (addr::CCP & 0xFF) as u8, (addr::CCP >> 8) as u8]);

    let mut machine = boot_with(ccp, &["DIR", "TYPE FOO.TXT"]);
    let info = machine.run().unwrap();

    assert_eq!(info.reason, ExitReason::EndOfInput);
    assert_eq!(machine.writer().as_string(), "DIR\nTYPE FOO.TXT\n");
}

#[test]
fn seldsk_returns_dph_for_drive_a() {
    // LD C,0; CALL SELDSK; HALT
    let mut ccp = vec![0x0E, 0x00];
    ccp.extend(call(BiosCall::SelDsk.vector()));
    ccp.push(0x76);

    let mut machine = boot_with(ccp, &[]);
    let info = machine.run().unwrap();

    assert_eq!(info.reason, ExitReason::Halted);
    assert_eq!(machine.cpu().reg_hl(), machine.dph_addr());
    assert_ne!(machine.dph_addr(), 0);
}

#[test]
fn seldsk_rejects_drive_b() {
    // LD C,1; CALL SELDSK; HALT
    let mut ccp = vec![0x0E, 0x01];
    ccp.extend(call(BiosCall::SelDsk.vector()));
    ccp.push(0x76);

    let mut machine = boot_with(ccp, &[]);
    machine.run().unwrap();
    assert_eq!(machine.cpu().reg_hl(), 0);
}

#[test]
fn const_always_reports_no_character() {
    let mut ccp = Vec::new();
    ccp.extend(call(BiosCall::ConStatus.vector()));
    ccp.push(0x76);

    // Input is pending, yet CONST still reports none.
    let mut machine = boot_with(ccp, &["DIR"]);
    machine.run().unwrap();
    assert_eq!(machine.cpu().reg_a(), 0);
}

#[test]
fn sector_read_lands_at_dma() {
    // SETTRK 2; SETSEC 5; SETDMA 0x3000; READ; HALT
    let mut ccp = Vec::new();
    ccp.extend(ld_bc(2));
    ccp.extend(call(BiosCall::SetTrk.vector()));
    ccp.extend(ld_bc(5));
    ccp.extend(call(BiosCall::SetSec.vector()));
    ccp.extend(ld_bc(0x3000));
    ccp.extend(call(BiosCall::SetDma.vector()));
    ccp.extend(call(BiosCall::Read.vector()));
    ccp.push(0x76);

    let mut machine = boot_with(ccp, &[]);
    let pattern: Vec<u8> = (0..SECTOR_SIZE as u8).map(|i| i.wrapping_mul(3)).collect();
    machine
        .drive_mut()
        .image_mut()
        .sector_view(5, 2)
        .copy_from_slice(&pattern);

    let info = machine.run().unwrap();
    assert_eq!(info.reason, ExitReason::Halted);
    assert_eq!(machine.cpu().reg_a(), 0);

    let mut buf = [0u8; SECTOR_SIZE];
    machine.cpu().read_mem_block(0x3000, &mut buf);
    assert_eq!(&buf[..], &pattern[..]);
}

#[test]
fn sector_write_round_trip() {
    // SETTRK 3; SETSEC 7; SETDMA 0x3000; WRITE; HALT
    let mut ccp = Vec::new();
    ccp.extend(ld_bc(3));
    ccp.extend(call(BiosCall::SetTrk.vector()));
    ccp.extend(ld_bc(7));
    ccp.extend(call(BiosCall::SetSec.vector()));
    ccp.extend(ld_bc(0x3000));
    ccp.extend(call(BiosCall::SetDma.vector()));
    ccp.extend(call(BiosCall::Write.vector()));
    ccp.push(0x76);

    let mut machine = boot_with(ccp, &[]);
    machine
        .cpu_mut()
        .write_mem_block(0x3000, &[0x42; SECTOR_SIZE]);

    machine.run().unwrap();
    assert_eq!(machine.cpu().reg_a(), 0);
    assert_eq!(
        machine.drive().image().sector(7, 3),
        &[0x42; SECTOR_SIZE][..]
    );
    assert_eq!(
        machine.drive().image().sector(8, 3),
        &[ERASED_FILL; SECTOR_SIZE][..]
    );
}

#[test]
fn sector_write_with_dma_near_top_of_memory() {
    // SETDMA 0xFFC0; WRITE; HALT - only 64 bytes exist above the DMA
    // address, so the transfer is short but must not crash the host.
    let mut ccp = Vec::new();
    ccp.extend(ld_bc(0xFFC0));
    ccp.extend(call(BiosCall::SetDma.vector()));
    ccp.extend(call(BiosCall::Write.vector()));
    ccp.push(0x76);

    let mut machine = boot_with(ccp, &[]);
    machine.cpu_mut().write_mem_block(0xFFC0, &[0x77; 64]);

    let info = machine.run().unwrap();
    assert_eq!(info.reason, ExitReason::Halted);
    assert_eq!(machine.cpu().reg_a(), 0);

    let sector = machine.drive().image().sector(0, 0);
    assert_eq!(&sector[..64], &[0x77; 64][..]);
    assert_eq!(&sector[64..], &[0x00; 64][..]);
}

#[test]
fn sectran_identity_through_registers() {
    // LD BC,17; CALL SECTRAN; HALT
    let mut ccp = Vec::new();
    ccp.extend(ld_bc(17));
    ccp.extend(call(BiosCall::SecTran.vector()));
    ccp.push(0x76);

    let mut machine = boot_with(ccp, &[]);
    machine.run().unwrap();
    assert_eq!(machine.cpu().reg_hl(), 17);
}

#[test]
fn warm_boot_restarts_ccp() {
    // CALL CONIN; JP 0 - the reset vector jumps into the BIOS, whose
    // BOOT trap reloads the CCP and starts it over.
    let mut ccp = Vec::new();
    ccp.extend(call(BiosCall::ConIn.vector()));
    ccp.extend([0xC3, 0x00, 0x00]);

    // Empty script delivers one '\n', then ends the session on the
    // second pass through the loop.
    let mut machine = boot_with(ccp, &[]);
    let info = machine.run().unwrap();

    assert_eq!(info.reason, ExitReason::EndOfInput);
    assert_eq!(machine.cpu().reg_a(), b'\n');
}

#[test]
fn list_peripheral_is_fatal() {
    let mut ccp = Vec::new();
    ccp.extend(call(BiosCall::List.vector()));
    ccp.push(0x76);

    let mut machine = boot_with(ccp, &[]);
    assert!(matches!(
        machine.run(),
        Err(CpmError::UnimplementedBios(BiosCall::List))
    ));
}
