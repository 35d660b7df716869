//! Domain Model - Device Geometry
//!
//! Describes the four-level physical organization of the emulated device
//! (channel -> chip -> block -> page) together with its NAND timing
//! parameters, and owns all address arithmetic over that organization.

use serde::{Deserialize, Serialize};

use super::request::HOST_PAGE_SIZE;
use crate::error::{Error, Result};

/// Completion policy of the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Completions fire inline on the submitting thread
    Ramdrive,
    /// Same completion behavior as [`DeviceType::Ramdrive`]; kept distinct
    /// for userspace deployments
    UserRamdrive,
    /// Completions fire from a deferred worker context
    RamdriveIntr,
    /// Completions are delayed to mimic nominal NAND latencies
    RamdriveTiming,
}

/// Immutable organization and timing parameters of one emulated device.
///
/// Profiles are plain data and deserialize from TOML files, so alternate
/// device shapes can be swapped in without recompiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NandGeometry {
    pub nr_channels: usize,
    pub nr_chips_per_channel: usize,
    pub nr_blocks_per_chip: usize,
    pub nr_pages_per_block: usize,
    /// Equal to `nr_pages_per_block` when one logical page address covers a
    /// whole flash page; larger when every host-page slice carries its own.
    pub nr_subpages_per_block: usize,
    /// Main page area in bytes; must be a whole number of host pages
    pub page_main_size: usize,
    /// Out-of-band area in bytes (0 disables OOB transfers)
    pub page_oob_size: usize,
    pub page_prog_time_us: u64,
    pub page_read_time_us: u64,
    pub block_erase_time_us: u64,
    pub device_type: DeviceType,
}

impl NandGeometry {
    /// Small timing-less profile used when no TOML profile is given:
    /// 2 channels x 2 chips x 32 blocks x 64 pages of 8 KiB + 64 B OOB.
    pub fn default_profile() -> Self {
        Self {
            nr_channels: 2,
            nr_chips_per_channel: 2,
            nr_blocks_per_chip: 32,
            nr_pages_per_block: 64,
            nr_subpages_per_block: 64,
            page_main_size: 8192,
            page_oob_size: 64,
            page_prog_time_us: 500,
            page_read_time_us: 50,
            block_erase_time_us: 3000,
            device_type: DeviceType::Ramdrive,
        }
    }

    /// Reject geometries the drive cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.nr_channels == 0
            || self.nr_chips_per_channel == 0
            || self.nr_blocks_per_chip == 0
            || self.nr_pages_per_block == 0
        {
            return Err(Error::InvalidParameter(
                "device geometry has a zero-sized dimension".to_string(),
            ));
        }
        if self.page_main_size == 0 || self.page_main_size % HOST_PAGE_SIZE != 0 {
            return Err(Error::GeometryMismatch {
                page_main_size: self.page_main_size,
                host_page_size: HOST_PAGE_SIZE,
            });
        }
        Ok(())
    }

    /// Number of host-page slices in one flash page
    pub fn kpages_per_page(&self) -> usize {
        self.page_main_size / HOST_PAGE_SIZE
    }

    /// Whether one logical page address maps to a whole flash page
    pub fn is_page_mapped(&self) -> bool {
        self.nr_subpages_per_block == self.nr_pages_per_block
    }

    /// Stored size of one page including its OOB area
    pub fn page_size(&self) -> usize {
        self.page_main_size + self.page_oob_size
    }

    pub fn block_size(&self) -> usize {
        self.page_size() * self.nr_pages_per_block
    }

    pub fn chip_size(&self) -> usize {
        self.block_size() * self.nr_blocks_per_chip
    }

    pub fn channel_size(&self) -> usize {
        self.chip_size() * self.nr_chips_per_channel
    }

    /// Total backing-store size in bytes, OOB included
    pub fn ssd_size(&self) -> usize {
        self.channel_size() * self.nr_channels
    }

    /// Number of independent parallel units (one per chip)
    pub fn chips_per_ssd(&self) -> usize {
        self.nr_channels * self.nr_chips_per_channel
    }

    pub fn pages_per_ssd(&self) -> usize {
        self.chips_per_ssd() * self.nr_blocks_per_chip * self.nr_pages_per_block
    }

    /// Flat index of the parallel unit serving `(channel, chip)`
    pub fn punit_id(&self, channel: usize, chip: usize) -> usize {
        channel * self.nr_chips_per_channel + chip
    }

    /// Byte offset of a page within the whole backing store
    pub fn addr_of_page(
        &self,
        channel: usize,
        chip: usize,
        block: usize,
        page: usize,
    ) -> Result<usize> {
        self.check_range(channel, chip, block, page)?;
        Ok(self.channel_size() * channel
            + self.chip_size() * chip
            + self.block_size() * block
            + self.page_size() * page)
    }

    /// Byte offset of a block within the whole backing store
    pub fn addr_of_block(&self, channel: usize, chip: usize, block: usize) -> Result<usize> {
        self.check_range(channel, chip, block, 0)?;
        Ok(self.channel_size() * channel + self.chip_size() * chip + self.block_size() * block)
    }

    /// Byte offset of a page within its chip's region
    pub fn page_offset_in_chip(&self, block: usize, page: usize) -> usize {
        self.block_size() * block + self.page_size() * page
    }

    fn check_range(&self, channel: usize, chip: usize, block: usize, page: usize) -> Result<()> {
        if channel >= self.nr_channels
            || chip >= self.nr_chips_per_channel
            || block >= self.nr_blocks_per_chip
            || page >= self.nr_pages_per_block
        {
            return Err(Error::BadAddress {
                channel,
                chip,
                block,
                page,
            });
        }
        Ok(())
    }
}
