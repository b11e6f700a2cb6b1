//! Claim border visuals: color animation and edge sampling.

use claims_types::ChunkPos;
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(s, 16).ok()?;
        Some(Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8))
    }

    fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: u8, b: u8| {
            let v = f32::from(a) + (f32::from(b) - f32::from(a)) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    const fn distance_sq(self, other: Self) -> u32 {
        let dr = self.r.abs_diff(other.r) as u32;
        let dg = self.g.abs_diff(other.g) as u32;
        let db = self.b.abs_diff(other.b) as u32;
        dr * dr + dg * dg + db * db
    }

    /// Closest of the sixteen chat colors.
    #[must_use]
    pub fn nearest_named(self) -> ChatColor {
        let mut best = ChatColor::White;
        let mut best_d = u32::MAX;
        for c in ChatColor::ALL {
            let d = self.distance_sq(c.rgb());
            if d < best_d {
                best = c;
                best_d = d;
            }
        }
        best
    }
}

/// The sixteen legacy chat colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatColor {
    Black,
    DarkBlue,
    DarkGreen,
    DarkAqua,
    DarkRed,
    DarkPurple,
    Gold,
    Gray,
    DarkGray,
    Blue,
    Green,
    Aqua,
    Red,
    LightPurple,
    Yellow,
    White,
}

impl ChatColor {
    pub const ALL: [Self; 16] = [
        Self::Black,
        Self::DarkBlue,
        Self::DarkGreen,
        Self::DarkAqua,
        Self::DarkRed,
        Self::DarkPurple,
        Self::Gold,
        Self::Gray,
        Self::DarkGray,
        Self::Blue,
        Self::Green,
        Self::Aqua,
        Self::Red,
        Self::LightPurple,
        Self::Yellow,
        Self::White,
    ];

    #[must_use]
    pub const fn rgb(self) -> Rgb {
        match self {
            Self::Black => Rgb::new(0x00, 0x00, 0x00),
            Self::DarkBlue => Rgb::new(0x00, 0x00, 0xAA),
            Self::DarkGreen => Rgb::new(0x00, 0xAA, 0x00),
            Self::DarkAqua => Rgb::new(0x00, 0xAA, 0xAA),
            Self::DarkRed => Rgb::new(0xAA, 0x00, 0x00),
            Self::DarkPurple => Rgb::new(0xAA, 0x00, 0xAA),
            Self::Gold => Rgb::new(0xFF, 0xAA, 0x00),
            Self::Gray => Rgb::new(0xAA, 0xAA, 0xAA),
            Self::DarkGray => Rgb::new(0x55, 0x55, 0x55),
            Self::Blue => Rgb::new(0x55, 0x55, 0xFF),
            Self::Green => Rgb::new(0x55, 0xFF, 0x55),
            Self::Aqua => Rgb::new(0x55, 0xFF, 0xFF),
            Self::Red => Rgb::new(0xFF, 0x55, 0x55),
            Self::LightPurple => Rgb::new(0xFF, 0x55, 0xFF),
            Self::Yellow => Rgb::new(0xFF, 0xFF, 0x55),
            Self::White => Rgb::new(0xFF, 0xFF, 0xFF),
        }
    }
}

/// A two-color pulse. `size` is the particle scale hint.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DustEffect {
    pub from: Rgb,
    pub to: Rgb,
    pub period_ticks: u32,
    pub size: f32,
}

impl DustEffect {
    /// Triangle wave: `from` at tick 0, `to` at half period, back to `from`.
    #[must_use]
    pub fn color_at(&self, tick: u64) -> Rgb {
        if self.period_ticks == 0 {
            return self.from;
        }
        let period = u64::from(self.period_ticks);
        let phase = (tick % period) as f32 / period as f32;
        let t = if phase < 0.5 { phase * 2.0 } else { (1.0 - phase) * 2.0 };
        self.from.lerp(self.to, t)
    }
}

/// Full-saturation hue rotation over `period` ticks.
#[must_use]
pub fn rainbow(tick: u64, period: u32) -> Rgb {
    if period == 0 {
        return Rgb::new(255, 0, 0);
    }
    let period = u64::from(period);
    let hue = (tick % period) as f32 / period as f32 * 6.0;
    let sector = hue.floor() as u8;
    let f = hue - hue.floor();
    let up = (f * 255.0).round() as u8;
    let down = 255 - up;
    match sector {
        0 => Rgb::new(255, up, 0),
        1 => Rgb::new(down, 255, 0),
        2 => Rgb::new(0, 255, up),
        3 => Rgb::new(0, down, 255),
        4 => Rgb::new(up, 0, 255),
        _ => Rgb::new(255, 0, down),
    }
}

/// Block-space points along the outer edges of a set of chunks, `spacing`
/// blocks apart. Edges shared by two chunks of the set are skipped.
#[must_use]
pub fn border_points(chunks: &BTreeSet<ChunkPos>, spacing: f64) -> Vec<(f64, f64)> {
    let spacing = if spacing > 0.0 { spacing.min(16.0) } else { 1.0 };
    let steps = (16.0 / spacing).floor() as u32;
    let mut out = Vec::new();
    for chunk in chunks {
        let (bx, bz) = chunk.min_block();
        let (x0, z0) = (f64::from(bx), f64::from(bz));
        let (x1, z1) = (x0 + 16.0, z0 + 16.0);
        let [north, south, west, east] = chunk.neighbors();
        for i in 0..steps {
            let d = f64::from(i) * spacing;
            if !chunks.contains(&north) {
                out.push((x0 + d, z0));
            }
            if !chunks.contains(&south) {
                out.push((x1 - d, z1));
            }
            if !chunks.contains(&west) {
                out.push((x0, z1 - d));
            }
            if !chunks.contains(&east) {
                out.push((x1, z0 + d));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    #[test]
    fn triangle_wave_returns_to_start() {
        let fx = DustEffect { from: RED, to: BLUE, period_ticks: 40, size: 1.0 };
        assert_eq!(fx.color_at(0), RED);
        assert_eq!(fx.color_at(20), BLUE);
        assert_eq!(fx.color_at(40), RED);
        assert_eq!(fx.color_at(10), fx.color_at(30));
    }

    #[test]
    fn zero_period_is_static() {
        let fx = DustEffect { from: RED, to: BLUE, period_ticks: 0, size: 1.0 };
        assert_eq!(fx.color_at(17), RED);
    }

    #[test]
    fn rainbow_cycles() {
        assert_eq!(rainbow(0, 60), RED);
        assert_eq!(rainbow(20, 60), Rgb::new(0, 255, 0));
        assert_eq!(rainbow(40, 60), BLUE);
        assert_eq!(rainbow(60, 60), RED);
    }

    #[test]
    fn nearest_named_colors() {
        assert_eq!(Rgb::new(250, 80, 80).nearest_named(), ChatColor::Red);
        assert_eq!(Rgb::new(10, 10, 10).nearest_named(), ChatColor::Black);
        assert_eq!(Rgb::from_hex("#55ff55").map(Rgb::nearest_named), Some(ChatColor::Green));
        assert_eq!(Rgb::from_hex("zz"), None);
    }

    #[test]
    fn shared_edges_are_skipped() {
        let single: BTreeSet<ChunkPos> = [ChunkPos::new(0, 0)].into();
        assert_eq!(border_points(&single, 4.0).len(), 16);

        let pair: BTreeSet<ChunkPos> = [ChunkPos::new(0, 0), ChunkPos::new(1, 0)].into();
        let points = border_points(&pair, 4.0);
        assert_eq!(points.len(), 24);
        assert!(!points.contains(&(16.0, 4.0)));
    }
}
