use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, RgbaImage, codecs::jpeg::JpegEncoder};

use crate::error::Result;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Encode a frame as a `data:image/jpeg;base64,...` URL. JPEG has no alpha, so it is dropped.
pub fn encode_jpeg_data_url(frame: &RgbaImage, quality: u8) -> Result<String> {
    let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
    let mut bytes = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    let mut url = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + bytes.get_ref().len() * 4 / 3 + 4);
    url.push_str(JPEG_DATA_URL_PREFIX);
    STANDARD.encode_string(bytes.get_ref(), &mut url);
    Ok(url)
}

/// Inverse of [`encode_jpeg_data_url`]; also accepts bare base64.
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let payload = url.split_once(',').map_or(url, |(_, data)| data);
    STANDARD.decode(payload).ok()
}
