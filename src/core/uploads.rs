//! Uploaded files and images
//!
//! Text files become a user message carrying the file name and the decoded
//! text verbatim. Images are only inspected and kept for display; they never
//! reach the completion request.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::path_display;

pub const TEXT_EXTENSIONS: &[&str] = &["py", "txt", "csv", "json"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file type for {name}; expected one of: {expected}")]
    Unsupported { name: String, expected: String },

    #[error("Failed to read {}: {source}", path_display(.path))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{name} is not valid UTF-8 text: {source}")]
    NotUtf8 {
        name: String,
        source: std::string::FromUtf8Error,
    },

    #[error("{name} is not a valid {format} image")]
    InvalidImage { name: String, format: ImageFormat },
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn check_extension(path: &Path, allowed: &[&str]) -> Result<String, UploadError> {
    match extension(path) {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(ext),
        _ => Err(UploadError::Unsupported {
            name: file_name(path),
            expected: allowed
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, UploadError> {
    std::fs::read(path).map_err(|source| UploadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUpload {
    pub name: String,
    pub content: String,
}

impl TextUpload {
    /// Decode uploaded bytes. Anything that is not UTF-8 is rejected.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, UploadError> {
        let name = name.into();
        match String::from_utf8(bytes) {
            Ok(content) => Ok(Self { name, content }),
            Err(source) => Err(UploadError::NotUtf8 { name, source }),
        }
    }

    pub fn read(path: &Path) -> Result<Self, UploadError> {
        check_extension(path, TEXT_EXTENSIONS)?;
        let bytes = read_bytes(path)?;
        Self::from_bytes(file_name(path), bytes)
    }

    /// Content of the user message that carries this file.
    pub fn message_content(&self) -> String {
        format!("File `{}` uploaded.\n\n{}", self.name, self.content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "PNG"),
            ImageFormat::Jpeg => write!(f, "JPEG"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub name: String,
    pub format: ImageFormat,
    pub byte_len: usize,
    pub dimensions: Option<(u32, u32)>,
}

impl ImageAttachment {
    pub fn from_bytes(
        name: impl Into<String>,
        format: ImageFormat,
        data: &[u8],
    ) -> Result<Self, UploadError> {
        let name = name.into();
        let dimensions = match format {
            ImageFormat::Png => {
                if !data.starts_with(&PNG_SIGNATURE) {
                    return Err(UploadError::InvalidImage { name, format });
                }
                png_dimensions(data)
            }
            ImageFormat::Jpeg => {
                if !data.starts_with(&[0xFF, 0xD8]) {
                    return Err(UploadError::InvalidImage { name, format });
                }
                jpeg_dimensions(data)
            }
        };

        Ok(Self {
            name,
            format,
            byte_len: data.len(),
            dimensions,
        })
    }

    pub fn read(path: &Path) -> Result<Self, UploadError> {
        let format = match check_extension(path, IMAGE_EXTENSIONS)?.as_str() {
            "png" => ImageFormat::Png,
            _ => ImageFormat::Jpeg,
        };
        let bytes = read_bytes(path)?;
        Self::from_bytes(file_name(path), format, &bytes)
    }

    pub fn summary(&self) -> String {
        let size = format_size(self.byte_len);
        match self.dimensions {
            Some((width, height)) => {
                format!("{} ({}, {width}x{height}, {size})", self.name, self.format)
            }
            None => format!("{} ({}, {size})", self.name, self.format),
        }
    }
}

fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let bytes_f = bytes as f64;
    if bytes_f < KIB {
        format!("{bytes} B")
    } else if bytes_f < KIB * KIB {
        format!("{:.1} KiB", bytes_f / KIB)
    } else {
        format!("{:.1} MiB", bytes_f / (KIB * KIB))
    }
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Width and height from the IHDR chunk, which must directly follow the
/// signature.
fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let offset = PNG_SIGNATURE.len();
    if data.get(offset + 4..offset + 8)? != b"IHDR" {
        return None;
    }
    Some((read_u32(data, offset + 8)?, read_u32(data, offset + 12)?))
}

/// Walk JPEG segments until a start-of-frame marker.
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut offset = 2;
    loop {
        if *data.get(offset)? != 0xFF {
            return None;
        }
        let mut marker_pos = offset + 1;
        while *data.get(marker_pos)? == 0xFF {
            marker_pos += 1;
        }
        let marker = data[marker_pos];
        let segment = marker_pos + 1;

        match marker {
            0xD8 | 0x01 | 0xD0..=0xD7 => {
                offset = segment;
                continue;
            }
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = read_u16(data, segment + 3)?;
                let width = read_u16(data, segment + 5)?;
                return Some((u32::from(width), u32::from(height)));
            }
            _ => {
                let length = read_u16(data, segment)? as usize;
                if length < 2 {
                    return None;
                }
                offset = segment + length;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data.extend_from_slice(&[0, 0, 0, 0]);
        data
    }

    fn tiny_jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        // APP0 segment with a 4-byte payload.
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x06, b'J', b'F', b'I', b'F']);
        // SOF0: length, precision, height, width, components.
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn text_upload_embeds_name_and_content() {
        let upload = TextUpload::from_bytes("a.py", b"print(1)".to_vec()).unwrap();
        assert_eq!(upload.message_content(), "File `a.py` uploaded.\n\nprint(1)");
    }

    #[test]
    fn text_upload_rejects_invalid_utf8() {
        let err = TextUpload::from_bytes("bad.txt", vec![0x66, 0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, UploadError::NotUtf8 { ref name, .. } if name == "bad.txt"));
    }

    #[test]
    fn text_upload_reads_supported_extensions_only() {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("Data.CSV");
        std::fs::write(&data_path, "a,b\n1,2\n").unwrap();
        let upload = TextUpload::read(&data_path).unwrap();
        assert_eq!(upload.name, "Data.CSV");
        assert_eq!(upload.content, "a,b\n1,2\n");

        let binary_path = dir.path().join("program.exe");
        std::fs::write(&binary_path, "MZ").unwrap();
        let err = TextUpload::read(&binary_path).unwrap_err();
        assert!(err.to_string().contains(".py, .txt, .csv, .json"));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let dir = TempDir::new().unwrap();
        let err = TextUpload::read(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }

    #[test]
    fn png_dimensions_come_from_ihdr() {
        let image = ImageAttachment::from_bytes("shot.png", ImageFormat::Png, &tiny_png(640, 480))
            .unwrap();
        assert_eq!(image.dimensions, Some((640, 480)));
        assert!(image.summary().starts_with("shot.png (PNG, 640x480, "));
    }

    #[test]
    fn jpeg_dimensions_come_from_start_of_frame() {
        let image =
            ImageAttachment::from_bytes("photo.jpg", ImageFormat::Jpeg, &tiny_jpeg(320, 200))
                .unwrap();
        assert_eq!(image.dimensions, Some((320, 200)));
    }

    #[test]
    fn image_with_wrong_signature_is_rejected() {
        let err = ImageAttachment::from_bytes("fake.png", ImageFormat::Png, b"not a png")
            .unwrap_err();
        assert_eq!(err.to_string(), "fake.png is not a valid PNG image");

        let err = ImageAttachment::from_bytes("fake.jpg", ImageFormat::Jpeg, &tiny_png(1, 1))
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidImage { format: ImageFormat::Jpeg, .. }));
    }

    #[test]
    fn image_read_picks_format_from_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("diagram.jpeg");
        std::fs::write(&path, tiny_jpeg(10, 20)).unwrap();

        let image = ImageAttachment::read(&path).unwrap();
        assert_eq!(image.format, ImageFormat::Jpeg);
        assert_eq!(image.dimensions, Some((10, 20)));

        let gif = dir.path().join("anim.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        assert!(matches!(
            ImageAttachment::read(&gif),
            Err(UploadError::Unsupported { .. })
        ));
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
