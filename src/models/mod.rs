use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type UserId = i64;
pub type ListingId = i64;
pub type BookingId = i64;
pub type ImageId = i64;

/// Error returned when a status or role label does not match any variant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

// Labels travel as plain strings on the wire and are matched
// case-insensitively, since rows written by older clients mix "declined"
// and "Declined".
macro_rules! labeled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseLabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| ParseLabelError {
                        kind: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseLabelError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.as_str().to_string()
            }
        }
    };
}

labeled_enum! {
    /// Account role
    Role {
        Admin => "Admin",
        Staff => "Staff",
        Agent => "Agent",
        Customer => "Customer",
    }
}

impl Role {
    /// Admin, Staff and Agent accounts are employees; customers are not
    pub fn is_employee(&self) -> bool {
        !matches!(self, Role::Customer)
    }
}

labeled_enum! {
    /// Availability of an employee. Only `Available` agents receive new listings.
    EmployeeStatus {
        Available => "Available",
        Busy => "Busy",
        OnLeave => "OnLeave",
    }
}

impl Default for EmployeeStatus {
    fn default() -> Self {
        EmployeeStatus::Available
    }
}

labeled_enum! {
    /// Kind of lot being listed
    LotType {
        Residential => "residential",
        Commercial => "commercial",
        Agricultural => "agricultural",
        Industrial => "industrial",
        Vacant => "vacant",
        Beachfront => "beachfront",
        Mountain => "mountain",
    }
}

labeled_enum! {
    /// Unit the lot area is expressed in
    AreaUnit {
        Sqm => "sqm",
        Hectare => "hectare",
    }
}

impl Default for AreaUnit {
    fn default() -> Self {
        AreaUnit::Sqm
    }
}

labeled_enum! {
    /// Listing lifecycle. New listings wait in `Pending` for admin review.
    PropertyStatus {
        Pending => "Pending",
        Available => "Available",
        Declined => "Declined",
        Sold => "Sold",
    }
}

labeled_enum! {
    /// Viewing appointment lifecycle
    BookingStatus {
        Pending => "Pending",
        Confirmed => "Confirmed",
        Scheduled => "Scheduled",
        Declined => "Declined",
        Cancelled => "Cancelled",
        Done => "Done",
    }
}

impl BookingStatus {
    /// Whether an appointment may move from `self` to `next`
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed | Scheduled | Declined | Cancelled)
                | (Confirmed, Scheduled | Done | Cancelled)
                | (Scheduled, Done | Cancelled)
        )
    }

    /// Cancelled appointments free their slot and never make an agent busy
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }
}

/// Account record shared by employees and customers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub image: Option<String>,
    pub status: EmployeeStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Split the display name into first and last name.
    /// A single-word name has an empty last name.
    pub fn split_name(&self) -> (String, String) {
        let name = self.name.trim();
        match name.rsplit_once(char::is_whitespace) {
            Some((first, last)) => (first.trim().to_string(), last.to_string()),
            None => (name.to_string(), String::new()),
        }
    }
}

/// Account to be inserted; the store assigns the id and timestamp
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub image: Option<String>,
    pub status: EmployeeStatus,
}

/// Image attached to a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyImage {
    pub image_id: ImageId,
    pub listing_id: ListingId,
    /// Served under `/uploads`
    pub path: String,
    pub position: u32,
}

/// Property listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub listing_id: ListingId,
    pub lot_name: String,
    pub lot_number: Option<String>,
    pub lot_type: LotType,
    pub price: f64,
    pub province: String,
    pub lot_area: f64,
    pub area_unit: AreaUnit,
    pub location: String,
    /// Virtual tour or video link
    pub description: String,
    pub status: PropertyStatus,
    pub assigned_agent_id: UserId,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub images: Vec<PropertyImage>,
}

/// Listing to be inserted. `image_paths` keep upload order.
#[derive(Debug, Clone)]
pub struct NewProperty {
    pub lot_name: String,
    pub lot_number: Option<String>,
    pub lot_type: LotType,
    pub price: f64,
    pub province: String,
    pub lot_area: f64,
    pub area_unit: AreaUnit,
    pub location: String,
    pub description: String,
    pub assigned_agent_id: UserId,
    pub created_by: Option<UserId>,
    pub image_paths: Vec<String>,
}

/// Viewing appointment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub listing_id: ListingId,
    pub agent_id: UserId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub listing_id: ListingId,
    pub agent_id: UserId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub visit_date: NaiveDate,
    pub visit_time: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("declined".parse::<BookingStatus>(), Ok(BookingStatus::Declined));
        assert_eq!(" AGENT ".parse::<Role>(), Ok(Role::Agent));
        assert_eq!("Beachfront".parse::<LotType>(), Ok(LotType::Beachfront));
        assert!("castle".parse::<LotType>().is_err());
    }

    #[test]
    fn labels_serialize_as_strings() {
        let json = serde_json::to_string(&PropertyStatus::Available).unwrap();
        assert_eq!(json, "\"Available\"");

        let status: BookingStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, BookingStatus::Cancelled);
        assert!(serde_json::from_str::<BookingStatus>("\"lost\"").is_err());
    }

    #[test]
    fn booking_transitions() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Done));
        assert!(Scheduled.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Done));
        assert!(!Declined.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Done.can_transition_to(Cancelled));
    }

    #[test]
    fn only_customers_are_not_employees() {
        assert!(Role::Admin.is_employee());
        assert!(Role::Agent.is_employee());
        assert!(!Role::Customer.is_employee());
    }

    #[test]
    fn split_name_keeps_middle_names_in_first() {
        let mut user = User {
            id: 1,
            name: "James Andrei Naluz".to_string(),
            email: "james@example.com".to_string(),
            phone: None,
            address: None,
            username: None,
            password_hash: String::new(),
            role: Role::Agent,
            image: None,
            status: EmployeeStatus::Available,
            created_at: Utc::now(),
        };
        assert_eq!(
            user.split_name(),
            ("James Andrei".to_string(), "Naluz".to_string())
        );

        user.name = "Cher".to_string();
        assert_eq!(user.split_name(), ("Cher".to_string(), String::new()));
    }
}
