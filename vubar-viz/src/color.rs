use alloc::vec::Vec;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

/// Convert an HSV triple (all channels 0..=255) to RGB.
pub fn hsv(h: u8, s: u8, v: u8) -> Rgb888 {
    if s == 0 {
        return Rgb888::new(v, v, v);
    }

    let region = h / 43;
    let remainder = ((h as u32 - region as u32 * 43) * 6).min(255);

    let v32 = v as u32;
    let s32 = s as u32;
    let p = (v32 * (255 - s32) / 255) as u8;
    let q = (v32 * (255 - s32 * remainder / 255) / 255) as u8;
    let t = (v32 * (255 - s32 * (255 - remainder) / 255) / 255) as u8;

    match region {
        0 => Rgb888::new(v, t, p),
        1 => Rgb888::new(q, v, p),
        2 => Rgb888::new(p, v, t),
        3 => Rgb888::new(p, q, v),
        4 => Rgb888::new(t, p, v),
        _ => Rgb888::new(v, p, q),
    }
}

/// Default palette: per-column hue gradient running from green at the
/// bottom row towards red at the top, column-major (`col * rows + row`).
pub fn default_palette(rows: u16, cols: u16) -> Vec<Rgb888> {
    let mut palette = Vec::with_capacity(rows as usize * cols as usize);
    for _col in 0..cols {
        for row in 0..rows {
            let hue = 100u16.saturating_sub(row as u16 * 99 / rows.max(1) as u16) as u8;
            palette.push(hsv(hue, 255, 255));
        }
    }
    palette
}

/// Scale a color by a 0..=255 brightness factor.
pub fn scale_brightness(color: Rgb888, brightness: u8) -> Rgb888 {
    let scale = |channel: u8| (channel as u16 * brightness as u16 / 255) as u8;
    Rgb888::new(scale(color.r()), scale(color.g()), scale(color.b()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv(0, 255, 255), Rgb888::new(255, 0, 0));
        assert_eq!(hsv(0, 0, 128), Rgb888::new(128, 128, 128));
    }

    #[test]
    fn test_default_palette_dimensions() {
        let palette = default_palette(10, 8);
        assert_eq!(palette.len(), 80);
    }

    #[test]
    fn test_default_palette_runs_green_to_red() {
        let rows = 10;
        let palette = default_palette(rows, 1);
        let bottom = palette[0];
        let top = palette[rows as usize - 1];
        assert!(bottom.g() > bottom.r(), "bottom row should lean green");
        assert!(top.r() > top.g(), "top row should lean red");
    }

    #[test]
    fn test_scale_brightness_bounds() {
        let color = Rgb888::new(200, 100, 50);
        assert_eq!(scale_brightness(color, 255), color);
        assert_eq!(scale_brightness(color, 0), Rgb888::new(0, 0, 0));
        let half = scale_brightness(color, 128);
        assert!(half.r() > 90 && half.r() < 110);
    }
}
