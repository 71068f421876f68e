//! Boot image loading.
//!
//! This module queues the images listed in the configuration onto the host bus. It
//! performs:
//! 1. **Binary loading:** Reads each image from disk into a transfer request when queued.
//! 2. **Queueing:** Appends the requests in configuration order, so the core sees
//!    them in that order.
//! 3. **Reporting:** A missing or empty image is logged and reported, and the
//!    remaining images are still queued.

use tracing::{info, warn};

use crate::bus::BusController;
use crate::common::SourceError;
use crate::config::BootImage;

/// Outcome of queueing a list of boot images.
#[derive(Debug, Default)]
pub struct BootReport {
    /// Images queued onto the bus.
    pub queued: usize,
    /// Images that could not be read.
    pub failed: Vec<SourceError>,
}

impl BootReport {
    /// True if every image was queued.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Queues every image in `images` as a download, in order.
pub fn queue_boot_images(bus: &mut BusController, images: &[BootImage]) -> BootReport {
    let mut report = BootReport::default();
    for image in images {
        match bus.queue_download(image.path.as_path(), image.index, image.base_address, false) {
            Ok(()) => report.queued += 1,
            Err(e) => {
                warn!(path = %image.path.display(), "boot image skipped: {e}");
                report.failed.push(e);
            }
        }
    }
    if !images.is_empty() {
        info!(
            queued = report.queued,
            failed = report.failed.len(),
            "boot images queued"
        );
    }
    report
}
