use std::io::Cursor;

use image::ImageReader;

use super::error::StorageError;

/// Dimensions and format sniffed from uploaded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Canonical extension, e.g. `png`.
    pub extension: &'static str,
    pub mime: &'static str,
}

/// Inspect an upload without decoding the full image.
pub fn inspect_image(data: &[u8]) -> Result<ImageInfo, StorageError> {
    if data.is_empty() {
        return Err(StorageError::InvalidImage("empty file".into()));
    }

    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| StorageError::InvalidImage("unrecognised image format".into()))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| StorageError::InvalidImage(e.to_string()))?;

    let extension = format.extensions_str().first().copied().unwrap_or("bin");
    Ok(ImageInfo {
        width,
        height,
        extension,
        mime: format.to_mime_type(),
    })
}
