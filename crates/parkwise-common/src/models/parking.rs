use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Occupancy status of a parking slot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    Empty,
    Occupied,
    Reserved,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Empty => "empty",
            SlotStatus::Occupied => "occupied",
            SlotStatus::Reserved => "reserved",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(SlotStatus::Empty),
            "occupied" => Ok(SlotStatus::Occupied),
            "reserved" => Ok(SlotStatus::Reserved),
            other => Err(format!("unknown slot status: {}", other)),
        }
    }
}

/// A single parking spot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub slot_number: i32,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A parking session of one user in one slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters for the dashboard view
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_slots: i64,
    pub empty_slots: i64,
    pub occupied_slots: i64,
    pub reserved_slots: i64,
    pub total_bookings: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_status_round_trip_str() {
        for status in [SlotStatus::Empty, SlotStatus::Occupied, SlotStatus::Reserved] {
            assert_eq!(status.as_str().parse::<SlotStatus>().unwrap(), status);
        }
        assert!("broken".parse::<SlotStatus>().is_err());
    }

    #[test]
    fn test_slot_omits_missing_vehicle_type() {
        let slot = Slot {
            id: Uuid::new_v4(),
            slot_number: 7,
            status: SlotStatus::default(),
            vehicle_type: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&slot).unwrap();
        assert_eq!(value["status"], "empty");
        assert!(value.get("vehicle_type").is_none());
    }
}
