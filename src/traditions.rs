//! The 26 sacred traditions
//!
//! Traditions are a closed enum: unknown identifiers are rejected at load
//! time instead of flowing through the system as strings. The authenticity
//! multiplier table is canonical; changing any value is a protocol change.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::fixed::Fixed;
use crate::{EnochianError, Result};

/// Number of sacred traditions.
pub const TRADITION_COUNT: usize = 26;

/// One of the 26 bodies of source material indexing the lighthouse.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tradition {
    Enochian,
    HermeticQabalah,
    Gnosticism,
    Thelema,
    GoldenDawn,
    SacredGeometry,
    Alchemy,
    Sufism,
    Taoism,
    ChaosMagic,
    Kabbalah,
    IChing,
    Tarot,
    Astrology,
    NorseTraditions,
    CelticDruidic,
    EgyptianMagic,
    Shamanism,
    Numerology,
    QuantumPhysics,
    KujiKiri,
    GreekMythology,
    GreekPhilosophy,
    DigitalPhysics,
    MTheory,
    NatalAstrology,
}

/// All 26 traditions in canonical declaration order.
pub const ALL_TRADITIONS: [Tradition; TRADITION_COUNT] = [
    Tradition::Enochian,
    Tradition::HermeticQabalah,
    Tradition::Gnosticism,
    Tradition::Thelema,
    Tradition::GoldenDawn,
    Tradition::SacredGeometry,
    Tradition::Alchemy,
    Tradition::Sufism,
    Tradition::Taoism,
    Tradition::ChaosMagic,
    Tradition::Kabbalah,
    Tradition::IChing,
    Tradition::Tarot,
    Tradition::Astrology,
    Tradition::NorseTraditions,
    Tradition::CelticDruidic,
    Tradition::EgyptianMagic,
    Tradition::Shamanism,
    Tradition::Numerology,
    Tradition::QuantumPhysics,
    Tradition::KujiKiri,
    Tradition::GreekMythology,
    Tradition::GreekPhilosophy,
    Tradition::DigitalPhysics,
    Tradition::MTheory,
    Tradition::NatalAstrology,
];

// Canonical per-mille multipliers. natal_astrology and astrology are distinct
// traditions with independent entries.
static MULTIPLIER_TABLE: Lazy<BTreeMap<Tradition, i64>> = Lazy::new(|| {
    let mut table = BTreeMap::new();
    table.insert(Tradition::Enochian, 1300);
    table.insert(Tradition::HermeticQabalah, 1200);
    table.insert(Tradition::Gnosticism, 1200);
    table.insert(Tradition::Thelema, 1150);
    table.insert(Tradition::GoldenDawn, 1100);
    table.insert(Tradition::SacredGeometry, 1100);
    table.insert(Tradition::Alchemy, 1100);
    table.insert(Tradition::Sufism, 1050);
    table.insert(Tradition::Taoism, 1050);
    table.insert(Tradition::ChaosMagic, 1050);
    table
});

impl Tradition {
    /// Stable snake_case identifier (file names, JSON, logs).
    pub fn id(&self) -> &'static str {
        match self {
            Tradition::Enochian => "enochian",
            Tradition::HermeticQabalah => "hermetic_qabalah",
            Tradition::Gnosticism => "gnosticism",
            Tradition::Thelema => "thelema",
            Tradition::GoldenDawn => "golden_dawn",
            Tradition::SacredGeometry => "sacred_geometry",
            Tradition::Alchemy => "alchemy",
            Tradition::Sufism => "sufism",
            Tradition::Taoism => "taoism",
            Tradition::ChaosMagic => "chaos_magic",
            Tradition::Kabbalah => "kabbalah",
            Tradition::IChing => "i_ching",
            Tradition::Tarot => "tarot",
            Tradition::Astrology => "astrology",
            Tradition::NorseTraditions => "norse_traditions",
            Tradition::CelticDruidic => "celtic_druidic",
            Tradition::EgyptianMagic => "egyptian_magic",
            Tradition::Shamanism => "shamanism",
            Tradition::Numerology => "numerology",
            Tradition::QuantumPhysics => "quantum_physics",
            Tradition::KujiKiri => "kuji_kiri",
            Tradition::GreekMythology => "greek_mythology",
            Tradition::GreekPhilosophy => "greek_philosophy",
            Tradition::DigitalPhysics => "digital_physics",
            Tradition::MTheory => "m_theory",
            Tradition::NatalAstrology => "natal_astrology",
        }
    }

    /// Parse a stable identifier; unknown values are a typed failure.
    pub fn from_id(id: &str) -> Result<Tradition> {
        ALL_TRADITIONS
            .iter()
            .copied()
            .find(|t| t.id() == id)
            .ok_or_else(|| EnochianError::TraditionUnknown {
                value: id.to_string(),
            })
    }

    /// Authenticity multiplier from the canonical table.
    /// Traditions absent from the table contribute 1.000.
    pub fn multiplier(&self) -> Fixed {
        let mills = MULTIPLIER_TABLE.get(self).copied().unwrap_or(1000);
        Fixed::from_micros(mills * 1000)
    }

    /// The primary tradition.
    pub fn is_enochian(&self) -> bool {
        matches!(self, Tradition::Enochian)
    }
}

impl fmt::Display for Tradition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
