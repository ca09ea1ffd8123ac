use crate::fragment::PictureSource;
use base64::Engine;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DATA_IMAGE_PREFIX: &str = "data:image/";

/// A decodable image plus its intrinsic pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub source: PictureSource,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    Missing(PathBuf),
    InvalidDataUri,
    Decode { source: String, reason: String },
}

impl AssetError {
    /// Text of the inline marker rendered in place of the picture.
    pub fn marker_text(&self) -> String {
        match self {
            AssetError::Missing(path) => format!("[Missing image: {}]", path.display()),
            AssetError::InvalidDataUri => "[Invalid base64 image data]".to_string(),
            AssetError::Decode { source, reason } => {
                format!("[Error loading image {source}: {reason}]")
            }
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::Missing(path) => write!(f, "image file not found: {}", path.display()),
            AssetError::InvalidDataUri => write!(f, "body is not a data:image/ URI"),
            AssetError::Decode { source, reason } => {
                write!(f, "cannot decode image {source}: {reason}")
            }
        }
    }
}

/// Reads the intrinsic size of an image file without decoding its pixels.
pub fn load_image_file(path: impl AsRef<Path>) -> Result<ImageAsset, AssetError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(AssetError::Missing(path.to_path_buf()));
    }
    let (pixel_width, pixel_height) =
        image::image_dimensions(path).map_err(|err| AssetError::Decode {
            source: path.display().to_string(),
            reason: err.to_string(),
        })?;
    Ok(ImageAsset {
        source: PictureSource::File(path.to_path_buf()),
        pixel_width,
        pixel_height,
    })
}

/// Decodes a `data:image/...;base64,<payload>` body into embedded picture bytes.
pub fn decode_data_uri(body: &str) -> Result<ImageAsset, AssetError> {
    let body = body.trim();
    if !body.starts_with(DATA_IMAGE_PREFIX) {
        return Err(AssetError::InvalidDataUri);
    }
    let Some((header, payload)) = body.split_once(',') else {
        return Err(AssetError::InvalidDataUri);
    };
    let source = header.to_string();
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(AssetError::Decode {
            source,
            reason: "empty payload".to_string(),
        });
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.as_bytes())
        .map_err(|err| AssetError::Decode {
            source: source.clone(),
            reason: err.to_string(),
        })?;
    let decoded = image::load_from_memory(&bytes).map_err(|err| AssetError::Decode {
        source: source.clone(),
        reason: err.to_string(),
    })?;
    Ok(ImageAsset {
        source: PictureSource::Embedded(bytes),
        pixel_width: decoded.width(),
        pixel_height: decoded.height(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([20, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn data_uri_decodes_to_embedded_bytes() {
        let bytes = png_bytes(6, 3);
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        let asset = decode_data_uri(&uri).expect("decode");
        assert_eq!((asset.pixel_width, asset.pixel_height), (6, 3));
        assert_eq!(asset.source, PictureSource::Embedded(bytes));
    }

    #[test]
    fn non_image_uri_and_garbage_payload_fail() {
        assert_eq!(
            decode_data_uri("data:text/plain;base64,aGk="),
            Err(AssetError::InvalidDataUri)
        );
        let err = decode_data_uri("data:image/png;base64,!!!not-base64").expect_err("garbage");
        assert!(matches!(err, AssetError::Decode { .. }));
        let err = decode_data_uri("data:image/png;base64,aGVsbG8=").expect_err("not an image");
        assert!(err.marker_text().starts_with("[Error loading image data:image/png;base64"));
    }

    #[test]
    fn missing_file_reports_missing() {
        let err = load_image_file("definitely/not/here.png").expect_err("missing");
        assert_eq!(err.marker_text(), "[Missing image: definitely/not/here.png]");
    }
}
