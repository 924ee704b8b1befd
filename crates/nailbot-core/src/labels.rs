//! Classifier labels and their retrieval aliases.
//!
//! The image classifier emits one of a closed set of labels. Each label maps
//! to a short list of Indonesian and English phrases used to broaden
//! retrieval queries. Labels outside the set have no aliases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Broadening terms appended to every query, in both supported languages.
pub const GENERAL_ALIASES: &[&str] = &[
    "kuku",
    "kesehatan kuku",
    "perubahan kuku",
    "perawatan kuku",
    "nail",
    "nail plate",
    "nail bed",
    "nail color",
    "nail shape",
];

/// A label produced by the nail image classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NailLabel {
    #[serde(rename = "pitting")]
    Pitting,
    #[serde(rename = "clubbing")]
    Clubbing,
    #[serde(rename = "Onychogryphosis")]
    Onychogryphosis,
    #[serde(rename = "Acral_Lentiginous_Melanoma")]
    AcralLentiginousMelanoma,
    #[serde(rename = "blue_finger")]
    BlueFinger,
    #[serde(rename = "Healthy_Nail")]
    HealthyNail,
}

impl NailLabel {
    pub const ALL: [NailLabel; 6] = [
        NailLabel::Pitting,
        NailLabel::Clubbing,
        NailLabel::Onychogryphosis,
        NailLabel::AcralLentiginousMelanoma,
        NailLabel::BlueFinger,
        NailLabel::HealthyNail,
    ];

    /// Canonical label string, as emitted by the classifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            NailLabel::Pitting => "pitting",
            NailLabel::Clubbing => "clubbing",
            NailLabel::Onychogryphosis => "Onychogryphosis",
            NailLabel::AcralLentiginousMelanoma => "Acral_Lentiginous_Melanoma",
            NailLabel::BlueFinger => "blue_finger",
            NailLabel::HealthyNail => "Healthy_Nail",
        }
    }

    /// Alias phrases used for label-aware query expansion.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            NailLabel::Pitting => &[
                "pitting",
                "cekungan kuku",
                "cekungan kecil pada kuku",
                "nail pitting",
            ],
            NailLabel::Clubbing => &[
                "clubbing",
                "ujung jari membulat",
                "kuku membulat",
                "clubbing finger",
                "nail clubbing",
            ],
            NailLabel::Onychogryphosis => &[
                "onychogryphosis",
                "kuku menebal melengkung",
                "ram's horn nail",
            ],
            NailLabel::AcralLentiginousMelanoma => &[
                "acral lentiginous melanoma",
                "ALM",
                "garis gelap pada kuku",
                "melanonychia",
            ],
            NailLabel::BlueFinger => &[
                "blue finger",
                "jari kebiruan",
                "sianosis jari",
                "kuku kebiruan",
            ],
            NailLabel::HealthyNail => &["kuku sehat", "healthy nail", "normal nail", "anatomy nail"],
        }
    }

    /// Parse a label, returning `None` for anything outside the closed set.
    pub fn parse(label: &str) -> Option<Self> {
        label.parse().ok()
    }
}

/// Aliases for a raw label string; empty for unknown labels.
pub fn aliases_for(label: &str) -> &'static [&'static str] {
    NailLabel::parse(label).map(|l| l.aliases()).unwrap_or(&[])
}

impl fmt::Display for NailLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NailLabel {
    type Err = String;

    /// Case-insensitive match against the canonical names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NailLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown label: '{}'", s))
    }
}
