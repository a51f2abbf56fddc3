use crate::foundation::error::{SubrastError, SubrastResult};

/// Identifier of one subtitle track within a transport stream.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TrackId(pub u32);

/// 0-based position of a cue within its track's source order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct CueIndex(pub u32);

/// Ticks per millisecond in the 90 kHz presentation clock.
pub const TICKS_PER_MS: i64 = 90;

/// Presentation timestamp in 90 kHz ticks, the muxer's clock domain.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PtsTicks(pub i64);

impl PtsTicks {
    /// Convert a millisecond value into 90 kHz ticks.
    pub fn from_ms(ms: i64) -> Self {
        Self(ms.saturating_mul(TICKS_PER_MS))
    }

    /// The smallest representable increment after `self`.
    pub fn next_tick(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Packed ARGB color, 8 bits per channel, alpha in the top byte.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Argb(pub u32);

impl Argb {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self(0);

    /// Pack channels into an ARGB word.
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
    }

    /// Alpha channel.
    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Red channel.
    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Green channel.
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Blue channel.
    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Squared component-wise distance over all four channels.
    ///
    /// Alpha participates like any other channel so translucent pixels sort
    /// toward the transparent background entry.
    pub fn distance_sq(self, other: Self) -> u32 {
        fn d(a: u8, b: u8) -> u32 {
            let diff = i32::from(a) - i32::from(b);
            (diff * diff) as u32
        }

        d(self.a(), other.a()) + d(self.r(), other.r()) + d(self.g(), other.g())
            + d(self.b(), other.b())
    }
}

/// Source/destination frame-rate pair used to remap cue timestamps.
///
/// The remap multiplies cue-local milliseconds by `src_fps / dst_fps` before
/// delay and clock conversion are applied.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FpsRemap {
    /// Frame rate the cue timestamps were authored against.
    pub src_fps: f64,
    /// Frame rate of the destination stream.
    pub dst_fps: f64,
}

impl FpsRemap {
    /// Create a validated remap; both rates must be finite and positive.
    pub fn new(src_fps: f64, dst_fps: f64) -> SubrastResult<Self> {
        if !src_fps.is_finite() || src_fps <= 0.0 {
            return Err(SubrastError::validation("src_fps must be finite and > 0"));
        }
        if !dst_fps.is_finite() || dst_fps <= 0.0 {
            return Err(SubrastError::validation("dst_fps must be finite and > 0"));
        }
        Ok(Self { src_fps, dst_fps })
    }

    /// The millisecond scale factor `src_fps / dst_fps`.
    pub fn scale(self) -> f64 {
        self.src_fps / self.dst_fps
    }

    /// Return `true` when the remap is a no-op.
    pub fn is_identity(self) -> bool {
        self.scale() == 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_from_ms_uses_90khz_ticks() {
        assert_eq!(PtsTicks::from_ms(0), PtsTicks(0));
        assert_eq!(PtsTicks::from_ms(1), PtsTicks(90));
        assert_eq!(PtsTicks::from_ms(1500), PtsTicks(135_000));
        assert_eq!(PtsTicks::from_ms(-20), PtsTicks(-1800));
    }

    #[test]
    fn next_tick_is_minimal_increment() {
        assert_eq!(PtsTicks(41).next_tick(), PtsTicks(42));
        assert_eq!(PtsTicks(i64::MAX).next_tick(), PtsTicks(i64::MAX));
    }

    #[test]
    fn argb_packs_and_unpacks_channels() {
        let c = Argb::new(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.0, 0x1234_5678);
        assert_eq!((c.a(), c.r(), c.g(), c.b()), (0x12, 0x34, 0x56, 0x78));
    }

    #[test]
    fn distance_is_component_wise_over_argb() {
        let a = Argb::new(255, 0, 0, 0);
        let b = Argb::new(255, 3, 4, 0);
        assert_eq!(a.distance_sq(b), 25);
        assert_eq!(b.distance_sq(a), 25);
        assert_eq!(a.distance_sq(a), 0);
        // Alpha counts like any color channel.
        assert_eq!(Argb(0).distance_sq(Argb::new(255, 0, 0, 0)), 255 * 255);
    }

    #[test]
    fn fps_remap_validates_rates() {
        assert!(FpsRemap::new(25.0, 0.0).is_err());
        assert!(FpsRemap::new(f64::NAN, 24.0).is_err());
        let remap = FpsRemap::new(25.0, 50.0).unwrap();
        assert_eq!(remap.scale(), 0.5);
        assert!(!remap.is_identity());
        assert!(FpsRemap::new(24.0, 24.0).unwrap().is_identity());
    }
}
