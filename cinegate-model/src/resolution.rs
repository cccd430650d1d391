use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Playback resolution ceiling. Variants are declared in ascending order so
/// the derived `Ord` is the total order `360p < 480p < 720p < 1080p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResolutionTier {
    #[cfg_attr(feature = "serde", serde(rename = "360p"))]
    P360,
    #[cfg_attr(feature = "serde", serde(rename = "480p"))]
    P480,
    #[cfg_attr(feature = "serde", serde(rename = "720p"))]
    P720,
    #[cfg_attr(feature = "serde", serde(rename = "1080p", alias = "FHD"))]
    P1080,
}

impl ResolutionTier {
    pub const ALL: [ResolutionTier; 4] = [
        ResolutionTier::P360,
        ResolutionTier::P480,
        ResolutionTier::P720,
        ResolutionTier::P1080,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::P360 => "360p",
            ResolutionTier::P480 => "480p",
            ResolutionTier::P720 => "720p",
            ResolutionTier::P1080 => "1080p",
        }
    }

    /// Vertical line count of the tier.
    pub fn height(&self) -> u16 {
        match self {
            ResolutionTier::P360 => 360,
            ResolutionTier::P480 => 480,
            ResolutionTier::P720 => 720,
            ResolutionTier::P1080 => 1080,
        }
    }

    /// Every tier up to and including `ceiling`, ascending.
    pub fn up_to(ceiling: ResolutionTier) -> Vec<ResolutionTier> {
        Self::ALL
            .into_iter()
            .filter(|tier| *tier <= ceiling)
            .collect()
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionTier {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "360p" | "360" => Ok(ResolutionTier::P360),
            "480p" | "480" => Ok(ResolutionTier::P480),
            "720p" | "720" | "hd" => Ok(ResolutionTier::P720),
            "1080p" | "1080" | "fhd" => Ok(ResolutionTier::P1080),
            _ => Err(ModelError::UnknownResolution(s.to_string())),
        }
    }
}
