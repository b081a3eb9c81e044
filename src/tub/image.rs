//! Camera frame side files, stored as PNG so frames come back bit-exact.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::error::TubError;
use crate::memory::Image;

fn codec_error(path: &Path) -> impl FnOnce(image::ImageError) -> TubError + '_ {
    move |source| TubError::Codec {
        path: path.to_path_buf(),
        source,
    }
}

fn malformed(path: &Path, reason: &str) -> TubError {
    TubError::Image {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

pub fn write_frame(path: impl AsRef<Path>, frame: &Image) -> Result<(), TubError> {
    let path = path.as_ref();
    let (w, h, data) = (frame.width, frame.height, frame.data.to_vec());
    let encoded = match frame.channels {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        _ => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
    };
    encoded
        .ok_or_else(|| malformed(path, "buffer does not match dimensions"))?
        .save_with_format(path, ImageFormat::Png)
        .map_err(codec_error(path))
}

/// Load a frame. Grayscale files stay single-channel, everything else
/// becomes RGB.
pub fn read_frame(path: impl AsRef<Path>) -> Result<Image, TubError> {
    let path = path.as_ref();
    let decoded = image::open(path).map_err(codec_error(path))?;
    let frame = if decoded.color().channel_count() <= 2 {
        let gray = decoded.into_luma8();
        Image::new(gray.width(), gray.height(), 1, gray.into_raw())
    } else {
        let rgb = decoded.into_rgb8();
        Image::new(rgb.width(), rgb.height(), 3, rgb.into_raw())
    };
    frame.ok_or_else(|| malformed(path, "decoded size does not match header"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_file(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("donkey_img_{}_{}", std::process::id(), name))
    }

    #[test]
    fn rgb_frame_is_lossless() {
        let path = temp_file("rgb.png");
        let frame = Image::new(2, 1, 3, vec![1, 2, 3, 250, 251, 252]).unwrap();
        write_frame(&path, &frame).unwrap();
        assert_eq!(read_frame(&path).unwrap(), frame);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn grayscale_stays_single_channel() {
        let path = temp_file("gray.png");
        let frame = Image::new(2, 2, 1, vec![10, 20, 30, 40]).unwrap();
        write_frame(&path, &frame).unwrap();
        let back = read_frame(&path).unwrap();
        assert_eq!(back.channels, 1);
        assert_eq!(back.intensity(1, 1), 40);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_file("corrupt.png");
        // PNG signature followed by an IHDR claiming a 4294967295 x 4294967295 image
        let mut bytes = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR".to_vec();
        bytes.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 8, 2, 0, 0, 0]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        fs::write(&path, bytes).unwrap();
        assert!(read_frame(&path).is_err());

        fs::write(&path, b"not an image").unwrap();
        assert!(matches!(read_frame(&path), Err(TubError::Codec { .. })));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_frame(temp_file("missing.png")).is_err());
    }
}
