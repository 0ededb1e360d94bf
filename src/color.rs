use serde_derive::{Deserialize, Serialize};

/// An 8-bit RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl std::str::FromStr for Rgb {
    type Err = String;

    /// Accepts `#rrggbb` or `r,g,b`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(format!("Invalid hex color `{text}`"));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|err| format!("Invalid hex color `{text}`: {err}"))
            };
            return Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?));
        }

        let channels = text
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("Invalid color `{text}`: {err}"))?;
        if let [r, g, b] = channels[..] {
            Ok(Rgb::new(r, g, b))
        } else {
            Err(format!("A color needs 3 channels, got `{text}`"))
        }
    }
}

/// Colors of the first five classes: red, green, blue, deep pink and cyan.
pub const CLASS_COLORS: [Rgb; 5] = [
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(255, 20, 147),
    Rgb::new(0, 255, 255),
];

/// A palette with one color per class. The first classes use [`CLASS_COLORS`],
/// the following ones step the hue by the golden angle so neighbours stay distinct.
pub fn default_palette(num_classes: usize) -> Vec<Rgb> {
    const GOLDEN_ANGLE: f32 = 137.507_77;
    (0..num_classes)
        .map(|class| {
            CLASS_COLORS.get(class).copied().unwrap_or_else(|| {
                let hue = (class - CLASS_COLORS.len()) as f32 * GOLDEN_ANGLE + 30.0;
                hsv_to_rgb(hue % 360.0, 0.8, 0.95)
            })
        })
        .collect()
}

/// Converts a color from HSV. `hue` is in degrees, `saturation` and `value` in [0, 1].
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgb {
    let chroma = value * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let to_u8 = |c: f32| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb::new(to_u8(r), to_u8(g), to_u8(b))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("#ff1493", Rgb::new(255, 20, 147))]
    #[case("0, 255,255", Rgb::new(0, 255, 255))]
    fn test_parse(#[case] text: &str, #[case] expected: Rgb) {
        assert_eq!(text.parse::<Rgb>().unwrap(), expected);
    }

    #[rstest]
    #[case("#ff14")]
    #[case("1,2")]
    #[case("256,0,0")]
    fn test_parse_invalid(#[case] text: &str) {
        assert!(text.parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let color = Rgb::new(255, 20, 147);
        assert_eq!(color.to_string(), "#ff1493");
    }

    #[test]
    fn test_default_palette_extends_class_colors() {
        let palette = default_palette(12);
        assert_eq!(palette.len(), 12);
        assert_eq!(palette[..5], CLASS_COLORS);
        for (i, a) in palette.iter().enumerate() {
            for b in palette.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb::new(0, 255, 0));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Rgb::new(0, 0, 255));
    }
}
