// Eye artwork: fixed-size RGB565 pixel grids, loaded once at startup.
// Two on-disk forms are accepted:
//   *.bin  raw little-endian RGB565, exactly width*height*2 bytes
//   other  anything the `image` crate decodes (PNG, BMP, ...), converted on load
// `convert_image` produces the .bin form from any picture.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use tracing::info;

use crate::error::{Error, Result};

/// Pack 8-bit RGB into RGB565.
#[inline]
pub fn rgb888_to_565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Immutable eye image, `pixels` in native RGB565 (not bus order).
#[derive(Clone, Debug)]
pub struct Texture {
    width: usize,
    height: usize,
    pixels: Vec<u16>,
}

impl Texture {
    /// Wrap an existing pixel grid. Returns `None` if the length is wrong.
    #[cfg(test)]
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u16>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self { width, height, pixels })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// One source row.
    #[inline]
    pub fn row(&self, y: usize) -> &[u16] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    /// Load by extension: `.bin` is raw RGB565, anything else is decoded.
    pub fn load(path: &Path, width: usize, height: usize) -> Result<Self> {
        let is_raw = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bin"));
        let texture = if is_raw {
            Self::load_raw(path, width, height)?
        } else {
            Self::load_image(path, width, height)?
        };
        info!(path = %path.display(), width, height, "Texture loaded");
        Ok(texture)
    }

    /// Raw little-endian RGB565 file whose size must match exactly.
    pub fn load_raw(path: &Path, width: usize, height: usize) -> Result<Self> {
        let mut file = File::open(path).map_err(|source| Error::TextureOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let expected = width * height * 2;
        let actual = file.metadata()?.len() as usize;
        if actual != expected {
            return Err(Error::TextureSize {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(expected)
            .map_err(|_| Error::Allocation { bytes: expected })?;
        file.read_to_end(&mut bytes)?;
        if bytes.len() != expected {
            // file changed between stat and read
            return Err(Error::TextureSize {
                path: path.to_path_buf(),
                expected,
                actual: bytes.len(),
            });
        }

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(width * height)
            .map_err(|_| Error::Allocation { bytes: expected })?;
        pixels.extend(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
        );
        Ok(Self { width, height, pixels })
    }

    /// Any decodable picture; must already be `width` x `height`.
    pub fn load_image(path: &Path, width: usize, height: usize) -> Result<Self> {
        let img = image::open(path)
            .map_err(|e| Error::TextureDecode(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (w, h) = img.dimensions();
        if w as usize != width || h as usize != height {
            return Err(Error::TextureDecode(format!(
                "{}: expected {width}x{height}, got {w}x{h}",
                path.display()
            )));
        }
        Ok(Self::from_rgb(&img))
    }

    fn from_rgb(img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| rgb888_to_565(p[0], p[1], p[2]))
            .collect();
        Self {
            width: w as usize,
            height: h as usize,
            pixels,
        }
    }
}

/// Resize any picture to `width` x `height` and write it as raw RGB565.
pub fn convert_image(input: &Path, output: &Path, width: u32, height: u32) -> Result<()> {
    let img = image::open(input)
        .map_err(|e| Error::TextureDecode(format!("{}: {e}", input.display())))?
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgb8();

    let mut out = BufWriter::new(File::create(output)?);
    for p in img.pixels() {
        out.write_all(&rgb888_to_565(p[0], p[1], p[2]).to_le_bytes())?;
    }
    out.flush()?;
    info!(
        input = %input.display(),
        output = %output.display(),
        width,
        height,
        "Converted image to RGB565"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    #[test]
    fn test_rgb565_packing() {
        assert_eq!(rgb888_to_565(0, 0, 0), 0x0000);
        assert_eq!(rgb888_to_565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb888_to_565(255, 0, 0), 0xF800);
        assert_eq!(rgb888_to_565(0, 255, 0), 0x07E0);
        assert_eq!(rgb888_to_565(0, 0, 255), 0x001F);
    }

    #[test]
    fn test_load_raw_little_endian() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eye.bin");
        std::fs::write(&path, [0x34, 0x12, 0x00, 0xF8, 0x1F, 0x00, 0xE0, 0x07]).unwrap();
        let tex = Texture::load(&path, 2, 2).unwrap();
        assert_eq!(tex.row(0), &[0x1234, 0xF800]);
        assert_eq!(tex.row(1), &[0x001F, 0x07E0]);
    }

    #[test]
    fn test_load_raw_size_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eye.bin");
        std::fs::write(&path, [0u8; 6]).unwrap();
        match Texture::load(&path, 2, 2) {
            Err(Error::TextureSize { expected, actual, .. }) => {
                assert_eq!((expected, actual), (8, 6));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Texture::load(Path::new("/definitely/not/here.bin"), 2, 2).unwrap_err();
        assert!(matches!(err, Error::TextureOpen { .. }));
    }

    #[test]
    fn test_png_load_converts_pixels() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("eye.png");
        let mut img = RgbImage::new(4, 4);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 60) as u8, (y * 60) as u8, 200]);
        }
        img.save(&png).unwrap();

        let decoded = Texture::load(&png, 4, 4).unwrap();
        assert_eq!(decoded.row(1)[2], rgb888_to_565(120, 60, 200));
    }

    #[test]
    fn test_convert_resizes_and_writes_rgb565() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("flat.png");
        RgbImage::from_pixel(10, 6, Rgb([255, 0, 0])).save(&png).unwrap();

        let bin = dir.path().join("flat.bin");
        convert_image(&png, &bin, 4, 4).unwrap();
        assert_eq!(std::fs::metadata(&bin).unwrap().len(), 4 * 4 * 2);

        let raw = Texture::load(&bin, 4, 4).unwrap();
        assert!(raw.pixels.iter().all(|&p| p == 0xF800));
    }

    #[test]
    fn test_image_wrong_size_rejected() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("eye.png");
        RgbImage::new(3, 3).save(&png).unwrap();
        assert!(matches!(Texture::load(&png, 4, 4), Err(Error::TextureDecode(_))));
    }

    #[test]
    fn test_from_pixels_checks_length() {
        assert!(Texture::from_pixels(2, 2, vec![0; 3]).is_none());
        assert!(Texture::from_pixels(2, 2, vec![0; 4]).is_some());
    }
}
