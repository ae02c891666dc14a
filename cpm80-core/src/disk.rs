//! Disk geometry and sector transport.
//!
//! This layer models one fixed CP/M disk format and gives the BIOS
//! byte-level access to 128-byte sectors addressed by (sector, track).
//! Directory entries and file allocation are the guest BDOS's business;
//! nothing here interprets the bytes it moves.

use crate::error::{CpmError, CpmResult};

/// CP/M logical sector size (one BDOS record).
pub const SECTOR_SIZE: usize = 128;

/// Fill byte of a freshly formatted CP/M disk.
pub const ERASED_FILL: u8 = 0xE5;

/// Packed DPB length: 2+1+1+1+2+2+1+1+2+2 bytes.
pub const DPB_LEN: usize = 15;

/// Disk Parameter Block constants for one fixed geometry.
///
/// The values describe a 399,360-byte image: 195 blocks of 2 KiB,
/// laid out as 78 tracks of 40 sectors. There are no system tracks
/// (OFF = 0) because BDOS and CCP are loaded from host files rather
/// than read off the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskFormat {
    /// Allocation block size in bytes.
    pub block_size: usize,
    /// Sectors per track (SPT).
    pub sectors_per_track: u16,
    /// Block shift factor (BSH): block_size = 128 << BSH.
    pub block_shift_factor: u8,
    /// Allocation block mask (BLM), always `2^BSH - 1`.
    pub allocation_block_mask: u8,
    /// Extent mask (EXM).
    pub extent_mask: u8,
    /// Highest allocation block number (DSM).
    pub max_disk_size_blocks: u16,
    /// Highest directory entry number (DRM).
    pub max_dir_entries: u16,
    /// Directory allocation masks (AL0/AL1).
    pub alloc_mask_0: u8,
    pub alloc_mask_1: u8,
    /// Directory check vector size (CKS).
    pub check_vector_size: u16,
    /// Reserved system tracks (OFF).
    pub system_track_offset: u16,
    /// Removable media gets a directory check vector.
    pub removable: bool,
    /// Sector skew. Only 0 (no translation) is supported.
    pub skew_factor: u16,
}

impl DiskFormat {
    /// The single-density geometry used by this emulator.
    pub fn new() -> Self {
        let block_shift_factor = 4;
        Self {
            block_size: 2048,
            sectors_per_track: 40,
            block_shift_factor,
            allocation_block_mask: (1 << block_shift_factor) - 1,
            extent_mask: 0,
            max_disk_size_blocks: 194,
            max_dir_entries: 63,
            alloc_mask_0: 0x80,
            alloc_mask_1: 0x00,
            check_vector_size: 16,
            system_track_offset: 0,
            removable: true,
            skew_factor: 0,
        }
    }

    /// Total image size in bytes.
    pub fn disk_size_bytes(&self) -> usize {
        (self.max_disk_size_blocks as usize + 1) * self.block_size
    }

    /// Number of addressable tracks.
    pub fn track_count(&self) -> u16 {
        (self.disk_size_bytes() / (self.sectors_per_track as usize * SECTOR_SIZE)) as u16
    }

    /// Size of the BDOS directory check vector scratch area.
    /// Zero for fixed media.
    pub fn check_vector_len(&self) -> usize {
        if self.removable {
            (self.max_dir_entries as usize + 1) / 4
        } else {
            0
        }
    }

    /// Size of the BDOS allocation vector scratch area.
    pub fn alloc_vector_len(&self) -> usize {
        self.max_disk_size_blocks as usize / 8 + 1
    }

    /// Pack the DPB exactly as the guest BDOS expects it
    /// (little-endian, CP/M 2.2 field order).
    pub fn dpb_bytes(&self) -> [u8; DPB_LEN] {
        let mut dpb = [0u8; DPB_LEN];
        dpb[0..2].copy_from_slice(&self.sectors_per_track.to_le_bytes());
        dpb[2] = self.block_shift_factor;
        dpb[3] = self.allocation_block_mask;
        dpb[4] = self.extent_mask;
        dpb[5..7].copy_from_slice(&self.max_disk_size_blocks.to_le_bytes());
        dpb[7..9].copy_from_slice(&self.max_dir_entries.to_le_bytes());
        dpb[9] = self.alloc_mask_0;
        dpb[10] = self.alloc_mask_1;
        dpb[11..13].copy_from_slice(&self.check_vector_size.to_le_bytes());
        dpb[13..15].copy_from_slice(&self.system_track_offset.to_le_bytes());
        dpb
    }
}

impl Default for DiskFormat {
    fn default() -> Self {
        Self::new()
    }
}

/// A flat byte buffer addressed as (sector, track).
pub struct DiskImage {
    format: DiskFormat,
    data: Vec<u8>,
}

impl DiskImage {
    /// Allocate a blank image, filled with the CP/M erased byte.
    pub fn new(format: DiskFormat) -> Self {
        Self {
            data: vec![ERASED_FILL; format.disk_size_bytes()],
            format,
        }
    }

    pub fn format(&self) -> &DiskFormat {
        &self.format
    }

    /// Byte offset of a sector window within the image.
    pub fn sector_offset(&self, sector: u16, track: u16) -> usize {
        (sector as usize + track as usize * self.format.sectors_per_track as usize) * SECTOR_SIZE
    }

    /// Immutable view of one 128-byte sector.
    ///
    /// Panics if (sector, track) is outside the image; callers are
    /// required to stay within the format's bounds.
    pub fn sector(&self, sector: u16, track: u16) -> &[u8] {
        let offset = self.checked_offset(sector, track);
        &self.data[offset..offset + SECTOR_SIZE]
    }

    /// Mutable view of one 128-byte sector. Same bounds contract as
    /// [`DiskImage::sector`].
    pub fn sector_view(&mut self, sector: u16, track: u16) -> &mut [u8] {
        let offset = self.checked_offset(sector, track);
        &mut self.data[offset..offset + SECTOR_SIZE]
    }

    fn checked_offset(&self, sector: u16, track: u16) -> usize {
        assert!(
            sector < self.format.sectors_per_track && track < self.format.track_count(),
            "sector address out of range: track {track}, sector {sector}"
        );
        self.sector_offset(sector, track)
    }
}

/// A read/write cursor over one [`DiskImage`].
pub struct DiskDrive {
    image: DiskImage,
    current_track: u16,
    current_sector: u16,
}

impl DiskDrive {
    pub fn new(image: DiskImage) -> Self {
        Self {
            image,
            current_track: 0,
            current_sector: 0,
        }
    }

    pub fn format(&self) -> &DiskFormat {
        self.image.format()
    }

    pub fn image(&self) -> &DiskImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut DiskImage {
        &mut self.image
    }

    pub fn track(&self) -> u16 {
        self.current_track
    }

    pub fn sector(&self) -> u16 {
        self.current_sector
    }

    pub fn set_track(&mut self, track: u16) {
        self.current_track = track;
    }

    pub fn set_sector(&mut self, sector: u16) {
        self.current_sector = sector;
    }

    /// BIOS HOME: seek back to track 0.
    pub fn home(&mut self) {
        self.current_track = 0;
    }

    /// Copy out the sector under the cursor.
    pub fn read_sector(&self) -> [u8; SECTOR_SIZE] {
        let mut buf = [0u8; SECTOR_SIZE];
        buf.copy_from_slice(self.image.sector(self.current_sector, self.current_track));
        buf
    }

    /// Overwrite the sector under the cursor.
    pub fn write_sector(&mut self, data: &[u8; SECTOR_SIZE]) {
        self.image
            .sector_view(self.current_sector, self.current_track)
            .copy_from_slice(data);
    }

    /// Logical-to-physical sector translation.
    ///
    /// The only supported skew factor is 0, where translation is the
    /// identity. CP/M skew tables vary by system and none is specified
    /// for this format, so a non-zero skew is refused outright rather
    /// than guessed at.
    pub fn translate_sector(&self, logical: u16) -> CpmResult<u16> {
        match self.format().skew_factor {
            0 => Ok(logical),
            skew => Err(CpmError::UnsupportedSkew(skew)),
        }
    }
}
