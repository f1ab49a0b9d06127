use std::io::Cursor;

use anyhow::Context;
use image::{ImageFormat, Luma};
use qrcode::QrCode;

const MIN_SIZE_PX: u32 = 200;

/// Renders `payload` as a PNG QR code.
pub fn qr_png(payload: &str) -> anyhow::Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes()).context("failed to encode QR payload")?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_SIZE_PX, MIN_SIZE_PX)
        .build();

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .context("failed to write QR png")?;
    Ok(buf.into_inner())
}
