use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat};
use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("empty image payload")] Empty,
    #[error("unsupported image format (expected JPEG or PNG)")] Unsupported,
    #[error("malformed data URI")] MalformedDataUri,
    #[error("invalid base64 payload: {0}")] Base64(#[from] base64::DecodeError),
    #[error("image decode error: {0}")] Image(#[from] image::ImageError),
}

/// A still image ready to be sent inline to the model: mime type plus base64 payload without any `data:` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

impl EncodedImage {
    /// Encodes an uploaded file. JPEG passes through untouched, PNG is re-encoded as JPEG.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodeError> {
        if bytes.is_empty() {
            return Err(EncodeError::Empty);
        }
        let format = image::guess_format(bytes).map_err(|_| EncodeError::Unsupported)?;
        match format {
            ImageFormat::Jpeg => Ok(Self::jpeg(STANDARD.encode(bytes))),
            ImageFormat::Png => {
                let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
                let jpeg = encode_jpeg(&decoded)?;
                Ok(Self::jpeg(STANDARD.encode(jpeg)))
            }
            _ => Err(EncodeError::Unsupported),
        }
    }

    /// Accepts either a bare base64 payload or a full `data:<mime>;base64,<payload>` URI.
    pub fn from_payload(payload: &str) -> Result<Self, EncodeError> {
        let payload = payload.trim();
        let raw = if payload.starts_with("data:") {
            let (_, data) = split_data_uri(payload)?;
            data
        } else {
            payload
        };
        let bytes = STANDARD.decode(raw)?;
        Self::from_bytes(&bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(STANDARD.decode(&self.data)?)
    }

    fn jpeg(data: String) -> Self {
        Self { mime_type: "image/jpeg".to_string(), data }
    }
}

/// Splits `data:<mime>;base64,<payload>` into `(mime, payload)`.
pub fn split_data_uri(uri: &str) -> Result<(&str, &str), EncodeError> {
    let rest = uri.strip_prefix("data:").ok_or(EncodeError::MalformedDataUri)?;
    let (meta, payload) = rest.split_once(',').ok_or(EncodeError::MalformedDataUri)?;
    let mime = meta.strip_suffix(";base64").ok_or(EncodeError::MalformedDataUri)?;
    if mime.is_empty() || payload.is_empty() {
        return Err(EncodeError::MalformedDataUri);
    }
    Ok((mime, payload))
}

pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), EncodeError> {
    let (mime, payload) = split_data_uri(uri)?;
    Ok((mime.to_string(), STANDARD.decode(payload)?))
}

// JPEG has no alpha channel, so flatten to RGB first.
pub(crate) fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

pub(crate) fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
    encode_jpeg(&DynamicImage::ImageRgb8(img)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn jpeg_passes_through_unchanged() {
        let bytes = sample_jpeg(500, 500);
        let encoded = EncodedImage::from_bytes(&bytes).unwrap();
        assert_eq!(encoded.mime_type, "image/jpeg");
        assert_eq!(encoded.decode().unwrap(), bytes);
        assert!(encoded.to_data_uri().starts_with("data:image/jpeg;base64,/9j/"));
    }

    #[test]
    fn png_is_reencoded_as_jpeg() {
        let png = encode_png(&DynamicImage::ImageRgba8(image::RgbaImage::new(8, 8))).unwrap();
        let encoded = EncodedImage::from_bytes(&png).unwrap();
        assert_eq!(encoded.mime_type, "image/jpeg");
        let decoded = encoded.decode().unwrap();
        assert_eq!(image::guess_format(&decoded).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn data_uri_prefix_is_stripped() {
        let bytes = sample_jpeg(4, 4);
        let uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(&bytes));
        let encoded = EncodedImage::from_payload(&uri).unwrap();
        assert!(!encoded.data.starts_with("data:"));
        assert_eq!(encoded, EncodedImage::from_payload(&STANDARD.encode(&bytes)).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(EncodedImage::from_bytes(&[]), Err(EncodeError::Empty)));
        assert!(matches!(EncodedImage::from_bytes(b"GIF89a not really"), Err(EncodeError::Unsupported)));
        assert!(matches!(EncodedImage::from_payload("@@@"), Err(EncodeError::Base64(_))));
        assert!(matches!(split_data_uri("data:image/png,abc"), Err(EncodeError::MalformedDataUri)));
    }

    #[test]
    fn data_uri_round_trip_keeps_mime() {
        let (mime, bytes) = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");
    }
}
