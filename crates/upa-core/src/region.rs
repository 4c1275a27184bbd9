//! Known transport regions

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::UpaError;

/// Broad zone a region belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    North,
    Centre,
    South,
}

/// A region that goods can be moved from or to.
///
/// Regions form a closed set; anything else is an unknown location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Porto,
    Braga,
    VianaDoCastelo,
    VilaReal,
    Braganca,
    Lisboa,
    Leiria,
    Santarem,
    CasteloBranco,
    Coimbra,
    Aveiro,
    Viseu,
    Guarda,
    Setubal,
    Evora,
    Portalegre,
    Beja,
    Faro,
}

impl Region {
    /// Every known region, north to south
    pub const ALL: [Region; 18] = [
        Region::Porto,
        Region::Braga,
        Region::VianaDoCastelo,
        Region::VilaReal,
        Region::Braganca,
        Region::Lisboa,
        Region::Leiria,
        Region::Santarem,
        Region::CasteloBranco,
        Region::Coimbra,
        Region::Aveiro,
        Region::Viseu,
        Region::Guarda,
        Region::Setubal,
        Region::Evora,
        Region::Portalegre,
        Region::Beja,
        Region::Faro,
    ];

    /// Display name as exchanged on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Region::Porto => "Porto",
            Region::Braga => "Braga",
            Region::VianaDoCastelo => "Viana do Castelo",
            Region::VilaReal => "Vila Real",
            Region::Braganca => "Bragança",
            Region::Lisboa => "Lisboa",
            Region::Leiria => "Leiria",
            Region::Santarem => "Santarém",
            Region::CasteloBranco => "Castelo Branco",
            Region::Coimbra => "Coimbra",
            Region::Aveiro => "Aveiro",
            Region::Viseu => "Viseu",
            Region::Guarda => "Guarda",
            Region::Setubal => "Setúbal",
            Region::Evora => "Évora",
            Region::Portalegre => "Portalegre",
            Region::Beja => "Beja",
            Region::Faro => "Faro",
        }
    }

    pub fn zone(&self) -> Zone {
        match self {
            Region::Porto
            | Region::Braga
            | Region::VianaDoCastelo
            | Region::VilaReal
            | Region::Braganca => Zone::North,
            Region::Lisboa
            | Region::Leiria
            | Region::Santarem
            | Region::CasteloBranco
            | Region::Coimbra
            | Region::Aveiro
            | Region::Viseu
            | Region::Guarda => Zone::Centre,
            _ => Zone::South,
        }
    }

    /// Membership test for a wire-level location string
    pub fn is_known(location: &str) -> bool {
        location.parse::<Region>().is_ok()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = UpaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.name().to_lowercase() == wanted)
            .ok_or_else(|| UpaError::UnknownRegion(s.to_string()))
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
