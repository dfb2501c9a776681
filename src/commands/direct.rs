//! Direct command implementation

use reflasher_core::{direct_copy, DirectCopyConfig, Region};
use std::path::Path;

/// Run the direct command
pub fn cmd_direct(
    image: &Path,
    src: Region,
    dest: Region,
    size: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut flash = super::load_image(image)?;

    let mut config = DirectCopyConfig::new(src, dest);
    if let Some(size) = size {
        config = config.with_size(size);
    }
    log::info!(
        "Copying {} from {} to {}",
        super::format_size(config.size),
        src,
        dest
    );
    direct_copy(&mut flash, config)?;
    println!("Copied {} bytes from {} to {}", config.size, src, dest);

    super::save_image(&flash, image)
}
