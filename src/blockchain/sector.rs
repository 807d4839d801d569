use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::chain::BlockchainError;

/// The domain a block's payload belongs to
///
/// `Genesis` is the sentinel carried only by the first block; it is never
/// accepted for submitted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Genesis,
    Agriculture,
    Health,
    Logistics,
}

/// Display metadata for a user-facing sector
#[derive(Debug, Clone, Serialize)]
pub struct SectorDescriptor {
    /// Sector tag as used on the wire
    pub sector: Sector,

    /// Human readable name
    pub name: &'static str,

    /// Icon shown next to the sector name
    pub icon: &'static str,

    /// Payload fields documented for this sector (not enforced)
    pub fields: &'static [&'static str],
}

impl Sector {
    /// Sectors that accept submitted records
    pub const USER_SECTORS: [Sector; 3] = [Sector::Agriculture, Sector::Health, Sector::Logistics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Genesis => "genesis",
            Sector::Agriculture => "agriculture",
            Sector::Health => "health",
            Sector::Logistics => "logistics",
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, Sector::Genesis)
    }

    /// Parses a sector for a new record, rejecting the genesis sentinel
    pub fn parse_user(s: &str) -> Result<Self, BlockchainError> {
        match s.parse::<Sector>()? {
            Sector::Genesis => Err(BlockchainError::InvalidSector(s.to_string())),
            sector => Ok(sector),
        }
    }

    /// Payload fields documented for the sector
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Sector::Genesis => &["description"],
            Sector::Agriculture => &["farmName", "cropType", "harvestDate", "location"],
            Sector::Health => &["patientName", "hospital", "diagnosis", "visitDate"],
            Sector::Logistics => &["shipmentId", "origin", "destination", "status"],
        }
    }

    /// Returns the descriptor of a user sector, `None` for genesis
    pub fn descriptor(&self) -> Option<SectorDescriptor> {
        let (name, icon) = match self {
            Sector::Genesis => return None,
            Sector::Agriculture => ("Agriculture", "🌾"),
            Sector::Health => ("Health", "🏥"),
            Sector::Logistics => ("Logistics", "🚚"),
        };

        Some(SectorDescriptor {
            sector: *self,
            name,
            icon,
            fields: self.fields(),
        })
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "genesis" => Ok(Sector::Genesis),
            "agriculture" => Ok(Sector::Agriculture),
            "health" => Ok(Sector::Health),
            "logistics" => Ok(Sector::Logistics),
            other => Err(BlockchainError::InvalidSector(other.to_string())),
        }
    }
}
