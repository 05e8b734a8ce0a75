//! Frame orientation and fit modes.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Rotation and mirroring applied to a frame before it is fitted to the view.
    ///
    /// Rotations are clockwise. A set holding several rotation bits rotates by
    /// their sum. `MIRROR` flips the rotated image horizontally.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RotateMode: u32 {
        const NONE = 1 << 1;
        const MIRROR = 1 << 2;
        /// 90° (or -270°)
        const ROTATE_90 = 1 << 3;
        const ROTATE_180 = 1 << 4;
        /// 270° (or -90°)
        const ROTATE_270 = 1 << 5;

        const ROTATE_90_MIRROR = Self::ROTATE_90.bits() | Self::MIRROR.bits();
        const ROTATE_180_MIRROR = Self::ROTATE_180.bits() | Self::MIRROR.bits();
        const ROTATE_270_MIRROR = Self::ROTATE_270.bits() | Self::MIRROR.bits();
    }
}

impl Default for RotateMode {
    fn default() -> Self {
        Self::NONE
    }
}

impl RotateMode {
    /// Clockwise quarter turns, 0..=3.
    pub fn quarter_turns(self) -> u32 {
        let mut turns = 0;
        if self.contains(Self::ROTATE_90) {
            turns += 1;
        }
        if self.contains(Self::ROTATE_180) {
            turns += 2;
        }
        if self.contains(Self::ROTATE_270) {
            turns += 3;
        }
        turns % 4
    }

    /// Clockwise rotation in degrees: 0, 90, 180 or 270.
    pub fn degrees(self) -> u32 {
        self.quarter_turns() * 90
    }

    /// Whether the rotated frame swaps width and height.
    pub fn swaps_axes(self) -> bool {
        self.quarter_turns() % 2 == 1
    }

    pub fn is_mirrored(self) -> bool {
        self.contains(Self::MIRROR)
    }

    /// Canonical mode for a clockwise angle in degrees.
    ///
    /// Returns `None` unless the angle is a multiple of 90.
    pub fn from_degrees(degrees: i32, mirror: bool) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        let base = match degrees.rem_euclid(360) {
            0 => Self::NONE,
            90 => Self::ROTATE_90,
            180 => Self::ROTATE_180,
            _ => Self::ROTATE_270,
        };
        Some(if mirror { base | Self::MIRROR } else { base })
    }
}

/// How a frame is scaled into the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Scale uniformly to fit inside the view (letterbox)
    #[default]
    ScaleIn,
    /// Scale uniformly to cover the view (crop)
    ScaleOut,
    /// Stretch to the full view, ignoring aspect ratio
    ScaleFull,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [Self::ScaleIn, Self::ScaleOut, Self::ScaleFull];

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ScaleIn => "Scale In",
            Self::ScaleOut => "Scale Out",
            Self::ScaleFull => "Scale Full",
        }
    }
}
