//! Progress reporting for long-running session operations

/// Callback for progress reporting during downloads and copies
pub trait ReflashProgress {
    /// Called when the download body starts, with the announced length if
    /// the transport knows it
    fn downloading(&mut self, total_hint: Option<u32>);

    /// Called after each chunk is persisted, with the running total
    fn download_progress(&mut self, bytes_written: u32);

    /// Called before the destination region is erased
    fn erasing(&mut self, len: u32);

    /// Called when the copy into the destination starts
    fn copying(&mut self, total: u32);

    /// Called after each chunk is copied, with the running total
    fn copy_progress(&mut self, bytes_copied: u32);

    /// Called when a download or copy finishes successfully
    fn complete(&mut self, bytes: u32);
}

/// A no-op progress reporter
pub struct NoProgress;

impl ReflashProgress for NoProgress {
    fn downloading(&mut self, _total_hint: Option<u32>) {}
    fn download_progress(&mut self, _bytes_written: u32) {}
    fn erasing(&mut self, _len: u32) {}
    fn copying(&mut self, _total: u32) {}
    fn copy_progress(&mut self, _bytes_copied: u32) {}
    fn complete(&mut self, _bytes: u32) {}
}
