use clap::ValueEnum;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Black to white
    #[default]
    Grey,
    /// Black to yellow to red to magenta to white
    Gold,
}

/// Maps spectrogram intensities to `0x00RRGGBB`. The gold map normalises
/// against the largest intensity this painter has seen, so each scope keeps
/// its own painter.
#[derive(Debug, Clone)]
pub struct Painter {
    colormap: Colormap,
    max: u32,
}

impl Painter {
    pub fn new(colormap: Colormap) -> Self {
        Self { colormap, max: 1 }
    }

    pub fn color(&mut self, intensity: u8) -> u32 {
        match self.colormap {
            Colormap::Grey => grey(intensity),
            Colormap::Gold => {
                let intensity = u32::from(intensity);
                if intensity > self.max {
                    self.max = intensity;
                    log::debug!("Colormap max raised to {}", self.max);
                }
                gold(intensity as f32 / self.max as f32)
            }
        }
    }

    pub fn reset(&mut self) {
        self.max = 1;
    }
}

fn grey(intensity: u8) -> u32 {
    let i = u32::from(intensity);
    (i << 16) | (i << 8) | i
}

/// Four quarter bands over `[0, 1)`; anything at or past 1 is white.
fn gold(normalised: f32) -> u32 {
    let color_number = normalised / 0.25;
    let group = color_number.floor();
    let residue = (255.0 * (color_number - group)).floor() as u32;

    let (red, green, blue) = match group as i32 {
        0 => (residue, residue, 0),
        1 => (255, 255 - residue, 0),
        2 => (255, 0, residue),
        3 => (255, residue, 255),
        _ => (255, 255, 255),
    };
    (red << 16) | (green << 8) | blue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grey_replicates_intensity() {
        let mut painter = Painter::new(Colormap::Grey);
        assert_eq!(painter.color(0), 0x000000);
        assert_eq!(painter.color(0x80), 0x808080);
        assert_eq!(painter.color(255), 0xFFFFFF);
    }

    #[test]
    fn gold_bands() {
        assert_eq!(gold(0.0), 0x000000);
        assert_eq!(gold(0.125), 0x7F7F00);
        assert_eq!(gold(0.25), 0xFFFF00);
        assert_eq!(gold(0.5), 0xFF0000);
        assert_eq!(gold(0.75), 0xFF00FF);
        assert_eq!(gold(1.0), 0xFFFFFF);
    }

    #[test]
    fn gold_max_is_per_painter() {
        let mut first = Painter::new(Colormap::Gold);
        let mut second = Painter::new(Colormap::Gold);
        assert_eq!(first.color(200), 0xFFFFFF);
        // 100 / 200 is the red band for the first painter only
        assert_eq!(first.color(100), 0xFF0000);
        assert_eq!(second.color(100), 0xFFFFFF);
        first.reset();
        assert_eq!(first.color(1), 0xFFFFFF);
    }
}
