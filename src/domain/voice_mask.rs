use std::fmt;
use std::str::FromStr;

/// Resample factor and tempo compensation applied to disguise a speaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchShift {
    pub resample_factor: f64,
    pub tempo: f64,
}

/// Voice-disguising tier requested by the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VoiceMask {
    #[default]
    None,
    Basic,
    Studio,
}

impl VoiceMask {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceMask::None => "none",
            VoiceMask::Basic => "basic",
            VoiceMask::Studio => "studio",
        }
    }

    /// Lowering the sample rate drops the pitch; the tempo factor restores
    /// the original speaking speed.
    pub fn pitch_shift(&self) -> Option<PitchShift> {
        match self {
            VoiceMask::None => None,
            VoiceMask::Basic => Some(PitchShift {
                resample_factor: 0.94,
                tempo: 1.06,
            }),
            VoiceMask::Studio => Some(PitchShift {
                resample_factor: 0.90,
                tempo: 1.11,
            }),
        }
    }
}

impl FromStr for VoiceMask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(VoiceMask::None),
            "basic" => Ok(VoiceMask::Basic),
            "studio" => Ok(VoiceMask::Studio),
            _ => Err(format!("Invalid voice mask: {}", s)),
        }
    }
}

impl fmt::Display for VoiceMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
