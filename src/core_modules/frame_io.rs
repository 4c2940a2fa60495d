// Trivial I/O around the `image` codec: non-recursive directory listing
// with the supported extension filter, RGB decode, and JPEG encode. All
// error handling policy lives with the orchestrator; these helpers just
// surface what the codec and filesystem report.

use image::{ImageError, ImageFormat, RgbImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Lists the loadable images directly inside `dir`, lexicographically
/// sorted. Subdirectories are not entered.
pub fn list_images(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if SUPPORTED_EXTENSIONS
            .iter()
            .any(|supported| extension.eq_ignore_ascii_case(supported))
        {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Decodes a file into the canonical 8-bit RGB buffer all transforms
/// consume.
pub fn load_rgb(path: &Path) -> Result<RgbImage, ImageError> {
    Ok(image::open(path)?.to_rgb8())
}

/// Encodes a frame as JPEG at `path`.
pub fn save_jpeg(path: &Path, frame: &RgbImage) -> Result<(), ImageError> {
    frame.save_with_format(path, ImageFormat::Jpeg)
}

/// The file stem used as the base name in output filenames and provenance.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("frame")
        .to_string()
}
