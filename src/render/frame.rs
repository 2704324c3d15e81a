pub const POWER_TRACE: u32 = 0x00FF_0000;
pub const SIMILARITY_TRACE: u32 = 0x0000_FF00;
pub const ACTIVE_MARKER: u32 = 0x00FF_00FF;
pub const ONSET_MARKER: u32 = 0x00FF_FF00;
pub const MATCH_MARKER: u32 = 0x00FF_FFFF;

/// ffmpeg `-pixel_format` matching the in-memory layout of [`VideoFrame`].
#[cfg(target_endian = "little")]
pub const FFMPEG_PIXEL_FORMAT: &str = "bgr0";
#[cfg(target_endian = "big")]
pub const FFMPEG_PIXEL_FORMAT: &str = "0rgb";

/// One `0x00RRGGBB` cell per pixel, kept in host byte order (BGRx on
/// little-endian hosts, xRGB on big-endian ones).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    /// Row 0 is the top of the image.
    pub fn set(&mut self, x: usize, y: usize, color: u32) {
        let width = self.width as usize;
        if x < width && y < self.height as usize {
            self.pixels[y * width + x] = color;
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}
