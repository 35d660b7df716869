//! CLI Handler - Info
//!
//! Prints the emulated device's organization and derived sizes.

use crate::domain::geometry::NandGeometry;
use crate::domain::types::ByteSize;
use crate::error::Result;

pub struct InfoHandler;

impl Default for InfoHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InfoHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, geometry: &NandGeometry) -> Result<()> {
        use colored::*;

        println!("Emulated device profile");
        println!("----------------------------------");
        println!(
            "Mode:           {}",
            format!("{:?}", geometry.device_type).yellow()
        );
        println!("Channels:       {}", geometry.nr_channels);
        println!("Chips/channel:  {}", geometry.nr_chips_per_channel);
        println!("Blocks/chip:    {}", geometry.nr_blocks_per_chip);
        println!("Pages/block:    {}", geometry.nr_pages_per_block);
        println!(
            "Page Size:      {} + {}",
            geometry.page_main_size,
            format!("{} OOB", geometry.page_oob_size).yellow()
        );
        println!(
            "Sub-pages:      {} per page ({})",
            geometry.kpages_per_page(),
            if geometry.is_page_mapped() {
                "page-mapped"
            } else {
                "sub-page-mapped"
            }
        );
        println!(
            "Parallel units: {}",
            geometry.chips_per_ssd().to_string().cyan()
        );
        println!(
            "Capacity:       {} ({} with OOB)",
            ByteSize((geometry.pages_per_ssd() * geometry.page_main_size) as u64)
                .to_string()
                .cyan()
                .bold(),
            ByteSize(geometry.ssd_size() as u64)
        );
        println!(
            "Timing:         read {} us, prog {} us, erase {} us",
            geometry.page_read_time_us, geometry.page_prog_time_us, geometry.block_erase_time_us
        );
        Ok(())
    }
}
