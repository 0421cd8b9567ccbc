use std::fmt;
use std::str::FromStr;

/// The embedding space a vector belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modality {
    /// Speaker identity embedding computed from audio alone.
    Voiceprint,
    /// Speaking style embedding computed from audio plus its reference text.
    Prosody,
}

impl Modality {
    /// Both modalities, in feature-vector order.
    pub const ALL: [Modality; 2] = [Modality::Voiceprint, Modality::Prosody];

    /// Lowercase name used for directory names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voiceprint => "voiceprint",
            Self::Prosody => "prosody",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voiceprint" => Ok(Self::Voiceprint),
            "prosody" => Ok(Self::Prosody),
            other => Err(format!("unknown modality {other:?}")),
        }
    }
}
