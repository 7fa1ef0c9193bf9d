use crate::common::error::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Energetic,
    Relaxed,
    Upbeat,
    Melancholic,
    Party,
    Focused,
    Romantic,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Energetic,
        Mood::Relaxed,
        Mood::Upbeat,
        Mood::Melancholic,
        Mood::Party,
        Mood::Focused,
        Mood::Romantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Energetic => "energetic",
            Mood::Relaxed => "relaxed",
            Mood::Upbeat => "upbeat",
            Mood::Melancholic => "melancholic",
            Mood::Party => "party",
            Mood::Focused => "focused",
            Mood::Romantic => "romantic",
        }
    }

    pub fn target(&self) -> &'static MoodTarget {
        match self {
            Mood::Energetic => &ENERGETIC,
            Mood::Relaxed => &RELAXED,
            Mood::Upbeat => &UPBEAT,
            Mood::Melancholic => &MELANCHOLIC,
            Mood::Party => &PARTY,
            Mood::Focused => &FOCUSED,
            Mood::Romantic => &ROMANTIC,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| DiscoveryError::InvalidInput(format!("unknown mood '{}'", s)))
    }
}

/// Target audio features, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioFeatures {
    pub energy: f64,
    pub danceability: f64,
    pub valence: f64,
}

/// Static description of a mood
#[derive(Debug, Clone, Serialize)]
pub struct MoodTarget {
    pub label: &'static str,
    pub description: &'static str,
    /// Matched as substrings against event text
    pub keywords: &'static [&'static str],
    /// Catalog genre seeds, also used to find moods that suit a listener
    pub genres: &'static [&'static str],
    pub features: AudioFeatures,
}

static ENERGETIC: MoodTarget = MoodTarget {
    label: "Energetic",
    description: "Loud, fast and sweaty",
    keywords: &["rock", "punk", "metal", "edm", "hardcore", "high energy", "mosh"],
    genres: &["rock", "punk", "metal", "edm", "hard-rock"],
    features: AudioFeatures {
        energy: 0.85,
        danceability: 0.6,
        valence: 0.6,
    },
};

static RELAXED: MoodTarget = MoodTarget {
    label: "Relaxed",
    description: "Low-key sets to unwind to",
    keywords: &["acoustic", "ambient", "chill", "folk", "jazz", "lounge", "unplugged"],
    genres: &["acoustic", "ambient", "chill", "folk", "jazz"],
    features: AudioFeatures {
        energy: 0.3,
        danceability: 0.4,
        valence: 0.5,
    },
};

static UPBEAT: MoodTarget = MoodTarget {
    label: "Upbeat",
    description: "Bright, catchy and feel-good",
    keywords: &["pop", "funk", "disco", "soul", "ska", "happy"],
    genres: &["pop", "funk", "disco", "soul", "happy"],
    features: AudioFeatures {
        energy: 0.7,
        danceability: 0.7,
        valence: 0.85,
    },
};

static MELANCHOLIC: MoodTarget = MoodTarget {
    label: "Melancholic",
    description: "Bittersweet and introspective",
    keywords: &["blues", "emo", "sad", "slowcore", "ballad", "shoegaze"],
    genres: &["blues", "emo", "sad", "indie", "singer-songwriter"],
    features: AudioFeatures {
        energy: 0.35,
        danceability: 0.35,
        valence: 0.2,
    },
};

static PARTY: MoodTarget = MoodTarget {
    label: "Party",
    description: "Dance floors and DJ sets",
    keywords: &["electronic", "dance", "hip-hop", "rap", "r&b", "latin", "reggaeton"],
    genres: &["dance", "electronic", "hip-hop", "latin", "reggaeton"],
    features: AudioFeatures {
        energy: 0.8,
        danceability: 0.85,
        valence: 0.75,
    },
};

static FOCUSED: MoodTarget = MoodTarget {
    label: "Focused",
    description: "Instrumental and immersive",
    keywords: &["instrumental", "classical", "post-rock", "minimal", "piano", "orchestra"],
    genres: &["classical", "ambient", "piano", "study", "post-rock"],
    features: AudioFeatures {
        energy: 0.4,
        danceability: 0.3,
        valence: 0.4,
    },
};

static ROMANTIC: MoodTarget = MoodTarget {
    label: "Romantic",
    description: "Slow dances and date nights",
    keywords: &["r&b", "soul", "jazz", "love", "ballad", "bossa"],
    genres: &["r-n-b", "soul", "jazz", "romance", "bossanova"],
    features: AudioFeatures {
        energy: 0.45,
        danceability: 0.55,
        valence: 0.6,
    },
};

/// Display view of one mood for the mood catalog
#[derive(Debug, Clone, Serialize)]
pub struct MoodInfo {
    pub mood: Mood,
    pub label: &'static str,
    pub description: &'static str,
    /// Comma-joined keywords, for display
    pub keywords: String,
}

pub fn mood_catalog() -> Vec<MoodInfo> {
    Mood::ALL
        .into_iter()
        .map(|mood| {
            let target = mood.target();
            MoodInfo {
                mood,
                label: target.label,
                description: target.description,
                keywords: target.keywords.join(", "),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_moods_case_insensitively() {
        assert_eq!("Party".parse::<Mood>().unwrap(), Mood::Party);
        assert_eq!(" relaxed ".parse::<Mood>().unwrap(), Mood::Relaxed);
        assert!("grumpy".parse::<Mood>().is_err());
    }

    #[test]
    fn test_audio_features_in_unit_range() {
        for mood in Mood::ALL {
            let f = mood.target().features;
            for v in [f.energy, f.danceability, f.valence] {
                assert!((0.0..=1.0).contains(&v), "{} out of range", mood);
            }
            assert!(!mood.target().keywords.is_empty());
            assert!(!mood.target().genres.is_empty());
        }
    }

    #[test]
    fn test_party_keywords() {
        let keywords = Mood::Party.target().keywords;
        for k in ["electronic", "dance", "hip-hop", "rap", "r&b", "latin", "reggaeton"] {
            assert!(keywords.contains(&k));
        }
    }

    #[test]
    fn test_catalog_lists_every_mood() {
        let catalog = mood_catalog();
        assert_eq!(catalog.len(), 7);
        assert!(catalog[4].keywords.contains("reggaeton"));
    }
}
