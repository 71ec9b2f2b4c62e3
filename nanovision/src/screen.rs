use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The display resolutions we know how to ask a camera for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    /// Let the source decide, we fall back to the 640x480 baseline.
    Auto,
    P480,
    P720,
    P1080,
}

impl Resolution {
    pub const ALL: [Resolution; 4] =
        [Self::Auto, Self::P480, Self::P720, Self::P1080];

    /// Pixel dimensions of the code as `(width, height)`.
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Auto | Self::P480 => (640, 480),
            Self::P720 => (1280, 720),
            Self::P1080 => (1920, 1080),
        }
    }

    /// The code whose height is closest to the given frame size.
    pub fn nearest(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return Self::Auto;
        }
        [Self::P480, Self::P720, Self::P1080]
            .iter()
            .copied()
            .min_by_key(|code| {
                let (_, h) = code.dimensions();
                (i64::from(h) - i64::from(height)).abs()
            })
            .unwrap_or(Self::Auto)
    }

    /// Like [`str::parse`], but unknown codes fall back to
    /// [`Resolution::Auto`].
    pub fn parse_lenient(code: &str) -> Self {
        code.parse().unwrap_or_else(|e| {
            log::warn!("{}, using the default resolution", e);
            Self::Auto
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
        }
    }
}

impl Default for Resolution {
    fn default() -> Self { Self::Auto }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "480p" | "480" => Ok(Self::P480),
            "720p" | "720" => Ok(Self::P720),
            "1080p" | "1080" => Ok(Self::P1080),
            other => Err(Error::Configuration(format!(
                "unknown resolution code `{}`",
                other
            ))),
        }
    }
}

/// Holds the display resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Screen {
    pub width: u32,
    pub height: u32,
}

impl Default for Screen {
    fn default() -> Self {
        let (width, height) = Resolution::Auto.dimensions();
        Self { width, height }
    }
}

impl Screen {
    pub fn new(code: Resolution) -> Self {
        let mut screen = Self::default();
        screen.set_resolution(code);
        screen
    }

    pub fn set_resolution(&mut self, code: Resolution) {
        let (width, height) = code.dimensions();
        self.width = width;
        self.height = height;
    }

    pub fn log_state(&self) {
        log::debug!("screen: width={} height={}", self.width, self.height);
    }
}
