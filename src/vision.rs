//! Turning a base 64 payload into the tensor a classifier consumes. Everything
//! here is request-scoped and stays in memory

use base64::{engine::general_purpose, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use serde::Deserialize;
use thiserror::Error;

/// Side length of the square model input
pub const INPUT_SIZE: u32 = 224;

/// Number of colour channels in the model input
pub const CHANNELS: usize = 3;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// The payload could not be turned into an image
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base 64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unreadable image data: {0}")]
    Image(#[from] image::ImageError),
}

/// A decoded image could not be prepared for the model
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("image has degenerate dimensions {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
}

/// Pixel transform matching the distribution a model family was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocessing {
    /// Scale to [-1, 1] (MobileNet / Inception family)
    Inception,

    /// Scale to [0, 1], then centre with the ImageNet channel statistics
    /// (torchvision models)
    ImageNet,

    /// Leave pixel values in [0, 255]
    Raw,
}

/// Memory layout of the 4-d input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, 224, 224, 3]`
    Nhwc,

    /// `[1, 3, 224, 224]`
    Nchw,
}

/// A flat, preprocessed input ready for the model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub data: Vec<f32>,
    pub shape: [i64; 4],
}

/// An image resized to the model's fixed input size. The only way to build
/// one is through a single resize, so a frame is never rescaled twice
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pixels: RgbImage,
}

/// Base 64 decode `payload` and sniff/decode the image format. ASCII
/// whitespace anywhere in the payload (MIME line wrapping) is ignored
pub fn decode_base64(payload: &str) -> Result<DynamicImage, DecodeError> {
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    Ok(image::load_from_memory(&bytes)?)
}

impl DecodedFrame {
    /// Resize `img` straight to 224x224, ignoring its aspect ratio
    pub fn from_image(img: &DynamicImage) -> Result<Self, PreprocessError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(PreprocessError::EmptyImage { width, height });
        }
        let pixels = img
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest)
            .to_rgb8();
        Ok(DecodedFrame { pixels })
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Apply `preprocessing` and lay the pixels out as `layout`
    pub fn to_input(&self, preprocessing: Preprocessing, layout: TensorLayout) -> ModelInput {
        let side = INPUT_SIZE as usize;
        let plane = side * side;
        let mut data = vec![0f32; plane * CHANNELS];

        for (x, y, pixel) in self.pixels.enumerate_pixels() {
            let offset = y as usize * side + x as usize;
            for (c, value) in pixel.0.iter().enumerate() {
                let value = preprocessing.apply(*value, c);
                let index = match layout {
                    TensorLayout::Nhwc => offset * CHANNELS + c,
                    TensorLayout::Nchw => c * plane + offset,
                };
                data[index] = value;
            }
        }

        let (size, channels) = (INPUT_SIZE as i64, CHANNELS as i64);
        let shape = match layout {
            TensorLayout::Nhwc => [1, size, size, channels],
            TensorLayout::Nchw => [1, channels, size, size],
        };
        ModelInput { data, shape }
    }
}

impl Preprocessing {
    fn apply(self, value: u8, channel: usize) -> f32 {
        let value = value as f32;
        match self {
            Preprocessing::Inception => value / 127.5 - 1.0,
            Preprocessing::ImageNet => {
                (value / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            }
            Preprocessing::Raw => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test;
    use image::Rgb;

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode_base64("not-valid-base64").unwrap_err();
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn test_decode_rejects_non_image_bytes() {
        let payload = general_purpose::STANDARD.encode(b"definitely not a picture");
        let err = decode_base64(&payload).unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }

    #[test]
    fn test_decode_png_and_jpeg() {
        let png = decode_base64(&test::b64_png(40, 30)).unwrap();
        assert_eq!(png.dimensions(), (40, 30));

        // trailing newline as sent by some camera firmwares
        let jpeg = decode_base64(&format!("{}\n", test::b64_jpeg(64, 48))).unwrap();
        assert_eq!(jpeg.dimensions(), (64, 48));
    }

    #[test]
    fn test_decode_line_wrapped_payload() {
        let payload = test::b64_png(40, 30);
        let wrapped = payload
            .as_bytes()
            .chunks(76)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.len() > payload.len());

        let img = decode_base64(&wrapped).unwrap();
        assert_eq!(img.dimensions(), (40, 30));
    }

    #[test]
    fn test_frame_is_model_sized() {
        for (w, h) in [(1, 1), (50, 300), (640, 480)] {
            let img = decode_base64(&test::b64_png(w, h)).unwrap();
            let frame = DecodedFrame::from_image(&img).unwrap();
            assert_eq!(frame.pixels().dimensions(), (INPUT_SIZE, INPUT_SIZE));
        }
    }

    #[test]
    fn test_frame_rejects_empty_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        let err = DecodedFrame::from_image(&img).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::EmptyImage {
                width: 0,
                height: 10
            }
        ));
    }

    fn solid_frame(colour: [u8; 3]) -> DecodedFrame {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(colour)));
        DecodedFrame::from_image(&img).unwrap()
    }

    #[test]
    fn test_inception_range() {
        let input = solid_frame([0, 255, 0]).to_input(Preprocessing::Inception, TensorLayout::Nhwc);
        assert_eq!(input.shape, [1, 224, 224, 3]);
        assert_eq!(input.data.len(), 224 * 224 * 3);
        assert_eq!(&input.data[..3], &[-1.0, 1.0, -1.0]);
        assert!(input.data.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_imagenet_normalisation() {
        let input = solid_frame([255, 0, 128]).to_input(Preprocessing::ImageNet, TensorLayout::Nhwc);
        let expected = [
            (1.0 - 0.485) / 0.229,
            (0.0 - 0.456) / 0.224,
            (128.0 / 255.0 - 0.406) / 0.225,
        ];
        for (got, want) in input.data[..3].iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{got} != {want}");
        }
    }

    #[test]
    fn test_nchw_layout_is_planar() {
        let input = solid_frame([10, 20, 30]).to_input(Preprocessing::Raw, TensorLayout::Nchw);
        assert_eq!(input.shape, [1, 3, 224, 224]);
        let plane = 224 * 224;
        assert!(input.data[..plane].iter().all(|v| *v == 10.0));
        assert!(input.data[plane..2 * plane].iter().all(|v| *v == 20.0));
        assert!(input.data[2 * plane..].iter().all(|v| *v == 30.0));
    }

    #[test]
    fn test_nhwc_layout_is_interleaved() {
        let input = solid_frame([10, 20, 30]).to_input(Preprocessing::Raw, TensorLayout::Nhwc);
        assert!(input
            .data
            .chunks(3)
            .all(|px| px == [10.0, 20.0, 30.0]));
    }
}
