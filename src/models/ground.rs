use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ground {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub address: Option<String>,
    pub price_per_hour: Decimal,
    pub status: GroundStatus,
    pub created_at: NaiveDateTime,
}

impl Ground {
    pub fn summary(&self) -> GroundSummary {
        GroundSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            price_per_hour: self.price_per_hour,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundSummary {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub price_per_hour: Decimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroundStatus {
    Active,
    Inactive,
    Maintenance,
}

impl GroundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroundStatus::Active => "active",
            GroundStatus::Inactive => "inactive",
            GroundStatus::Maintenance => "maintenance",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => GroundStatus::Active,
            "maintenance" => GroundStatus::Maintenance,
            _ => GroundStatus::Inactive,
        }
    }
}
