use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::cell;

/// Direction of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum TripType {
    #[default]
    #[serde(rename = "迎え")]
    Pickup,
    #[serde(rename = "送り")]
    Dropoff,
}

impl TripType {
    /// Value the backend stores in the `type` column.
    pub fn as_wire(&self) -> &'static str {
        match self {
            TripType::Pickup => "迎え",
            TripType::Dropoff => "送り",
        }
    }

    /// Status that marks this trip as finished for the driver.
    pub fn done_status(&self) -> RideStatus {
        match self {
            TripType::Pickup => RideStatus::Boarded,
            TripType::Dropoff => RideStatus::Alighted,
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripType::Pickup => write!(f, "Pickup"),
            TripType::Dropoff => write!(f, "Dropoff"),
        }
    }
}

impl FromStr for TripType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pickup" | "迎え" => Ok(TripType::Pickup),
            "dropoff" | "送り" => Ok(TripType::Dropoff),
            other => Err(format!("unknown trip type: {other}")),
        }
    }
}

/// Status of a scheduled ride. A ride with no status has not boarded yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RideStatus {
    Boarded,
    Alighted,
    Absent,
    Cancelled,
    /// A status string this client does not know. Kept verbatim.
    Other(String),
}

impl RideStatus {
    pub fn as_wire(&self) -> &str {
        match self {
            RideStatus::Boarded => "乗車済",
            RideStatus::Alighted => "降車済",
            RideStatus::Absent => "欠席",
            RideStatus::Cancelled => "キャンセル",
            RideStatus::Other(s) => s,
        }
    }

    fn from_wire(s: &str) -> Self {
        match s {
            "乗車済" => RideStatus::Boarded,
            "降車済" => RideStatus::Alighted,
            "欠席" => RideStatus::Absent,
            "キャンセル" => RideStatus::Cancelled,
            other => RideStatus::Other(other.to_string()),
        }
    }

    /// Boarded or alighted.
    pub fn is_done(&self) -> bool {
        matches!(self, RideStatus::Boarded | RideStatus::Alighted)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideStatus::Boarded => write!(f, "Boarded"),
            RideStatus::Alighted => write!(f, "Alighted"),
            RideStatus::Absent => write!(f, "Absent"),
            RideStatus::Cancelled => write!(f, "Cancelled"),
            RideStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "boarded" => Ok(RideStatus::Boarded),
            "alighted" => Ok(RideStatus::Alighted),
            "absent" => Ok(RideStatus::Absent),
            "cancelled" | "canceled" => Ok(RideStatus::Cancelled),
            _ => match RideStatus::from_wire(trimmed) {
                RideStatus::Other(other) => Err(format!("unknown status: {other}")),
                known => Ok(known),
            },
        }
    }
}

impl Serialize for RideStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for RideStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(RideStatus::from_wire(&s))
    }
}

/// Blank status cells come back as `""`; treat them as no status.
fn opt_status<'de, D>(deserializer: D) -> Result<Option<RideStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(cell::opt_text(deserializer)?.map(|s| RideStatus::from_wire(&s)))
}

/// One rider's pickup or dropoff on a given day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Absent for rows the editor has not saved yet.
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub schedule_id: Option<String>,
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub course_id: Option<String>,
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub facility_id: Option<String>,
    #[serde(default, deserialize_with = "cell::text")]
    pub user_id: String,
    #[serde(default, deserialize_with = "cell::text")]
    pub user_name: String,
    #[serde(rename = "type", default)]
    pub trip_type: TripType,
    #[serde(default, deserialize_with = "cell::text")]
    pub scheduled_time: String,
    #[serde(default, deserialize_with = "opt_status")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub status: Option<RideStatus>,
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub vehicle_id: Option<String>,
    #[serde(default, deserialize_with = "cell::opt_text")]
    pub vehicle_name: Option<String>,
    #[serde(default, deserialize_with = "cell::opt_number")]
    pub route_order: Option<u32>,
}

impl Schedule {
    pub fn is_done(&self) -> bool {
        self.status.as_ref().is_some_and(RideStatus::is_done)
    }

    /// Status after a one-tap check: set the done status, or clear it if
    /// the ride is already in that state.
    pub fn toggled_status(&self) -> Option<RideStatus> {
        let done = self.trip_type.done_status();
        if self.status.as_ref() == Some(&done) {
            None
        } else {
            Some(done)
        }
    }
}

/// One row of a `bulkUpdateSchedules` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    /// `None` asks the backend to create the row.
    pub schedule_id: Option<String>,
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "type")]
    pub trip_type: TripType,
    pub time: String,
    pub vehicle_id: Option<String>,
    pub vehicle_name: Option<String>,
    pub route_order: u32,
    pub facility_id: String,
}

/// Tab filter applied to a driver's schedule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleFilter {
    #[default]
    All,
    Pickup,
    Dropoff,
    /// No status recorded yet.
    Unfinished,
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &Schedule) -> bool {
        match self {
            ScheduleFilter::All => true,
            ScheduleFilter::Pickup => schedule.trip_type == TripType::Pickup,
            ScheduleFilter::Dropoff => schedule.trip_type == TripType::Dropoff,
            ScheduleFilter::Unfinished => schedule.status.is_none(),
        }
    }
}

impl FromStr for ScheduleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ScheduleFilter::All),
            "pickup" => Ok(ScheduleFilter::Pickup),
            "dropoff" => Ok(ScheduleFilter::Dropoff),
            "unfinished" => Ok(ScheduleFilter::Unfinished),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

/// Schedules a driver in `vehicle_id` should see: rides assigned to that
/// vehicle plus rides with no vehicle yet, narrowed by `filter`.
pub fn visible_schedules<'a>(
    schedules: &'a [Schedule],
    vehicle_id: Option<&str>,
    filter: ScheduleFilter,
) -> Vec<&'a Schedule> {
    schedules
        .iter()
        .filter(|s| s.vehicle_id.is_none() || s.vehicle_id.as_deref() == vehicle_id)
        .filter(|s| filter.matches(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(id: &str, trip_type: TripType, vehicle: Option<&str>, status: Option<RideStatus>) -> Schedule {
        Schedule {
            schedule_id: Some(id.to_string()),
            user_id: format!("U{id}"),
            user_name: format!("user {id}"),
            trip_type,
            scheduled_time: "09:00".to_string(),
            vehicle_id: vehicle.map(String::from),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_schedule_row() {
        let json = r#"{
            "scheduleId": 101, "date": "2026-10-19", "courseId": "C1", "userId": "U1",
            "userName": "山田 太郎", "type": "送り", "scheduledTime": "16:30",
            "status": "", "note": "", "vehicleId": "", "routeOrder": "3"
        }"#;
        let s: Schedule = serde_json::from_str(json).unwrap();
        assert_eq!(s.schedule_id.as_deref(), Some("101"));
        assert_eq!(s.trip_type, TripType::Dropoff);
        assert_eq!(s.status, None);
        assert_eq!(s.vehicle_id, None);
        assert_eq!(s.route_order, Some(3));
    }

    #[test]
    fn test_status_wire_values() {
        let s: Schedule = serde_json::from_str(r#"{"type": "迎え", "status": "乗車済"}"#).unwrap();
        assert_eq!(s.status, Some(RideStatus::Boarded));

        let s: Schedule = serde_json::from_str(r#"{"type": "迎え", "status": "遅刻"}"#).unwrap();
        assert_eq!(s.status, Some(RideStatus::Other("遅刻".to_string())));

        let value = serde_json::to_value(RideStatus::Alighted).unwrap();
        assert_eq!(value, "降車済");
    }

    #[test]
    fn test_parse_status_from_cli_text() {
        assert_eq!("boarded".parse::<RideStatus>(), Ok(RideStatus::Boarded));
        assert_eq!("欠席".parse::<RideStatus>(), Ok(RideStatus::Absent));
        assert!("late".parse::<RideStatus>().is_err());
    }

    #[test]
    fn test_toggle_pickup_and_dropoff() {
        let pickup = schedule("1", TripType::Pickup, None, None);
        assert_eq!(pickup.toggled_status(), Some(RideStatus::Boarded));

        let boarded = schedule("1", TripType::Pickup, None, Some(RideStatus::Boarded));
        assert_eq!(boarded.toggled_status(), None);

        let dropoff = schedule("2", TripType::Dropoff, None, Some(RideStatus::Absent));
        assert_eq!(dropoff.toggled_status(), Some(RideStatus::Alighted));
    }

    #[test]
    fn test_visible_schedules_by_vehicle() {
        let schedules = vec![
            schedule("1", TripType::Pickup, Some("V1"), None),
            schedule("2", TripType::Pickup, Some("V2"), None),
            schedule("3", TripType::Dropoff, None, Some(RideStatus::Alighted)),
        ];

        let visible = visible_schedules(&schedules, Some("V1"), ScheduleFilter::All);
        let ids: Vec<_> = visible.iter().filter_map(|s| s.schedule_id.as_deref()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        let unfinished = visible_schedules(&schedules, Some("V1"), ScheduleFilter::Unfinished);
        assert_eq!(unfinished.len(), 1);

        let dropoffs = visible_schedules(&schedules, Some("V1"), ScheduleFilter::Dropoff);
        assert_eq!(dropoffs.len(), 1);
        assert_eq!(dropoffs[0].schedule_id.as_deref(), Some("3"));

        // No vehicle selected: only unassigned rides.
        assert_eq!(visible_schedules(&schedules, None, ScheduleFilter::All).len(), 1);
    }
}
