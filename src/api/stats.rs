use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::error::AppError;
use crate::models::{Booking, BookingStatus, Property, PropertyStatus, Role, User};
use crate::stores::{BookingFilter, PropertyFilter};

/// Counters shown on the admin and staff dashboards
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_users: usize,
    pub customers: usize,
    pub agents: usize,
    pub staff: usize,
    pub total_properties: usize,
    pub properties_by_status: BTreeMap<String, usize>,
    pub total_bookings: usize,
    pub bookings_by_status: BTreeMap<String, usize>,
}

impl DashboardStats {
    pub fn tally(users: &[User], properties: &[Property], bookings: &[Booking]) -> Self {
        let count_role = |role: Role| users.iter().filter(|u| u.role == role).count();

        // every status is present, even at zero, so dashboards need no defaults
        let mut properties_by_status: BTreeMap<String, usize> = PropertyStatus::ALL
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        for p in properties {
            *properties_by_status.entry(p.status.to_string()).or_default() += 1;
        }

        let mut bookings_by_status: BTreeMap<String, usize> = BookingStatus::ALL
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        for b in bookings {
            *bookings_by_status.entry(b.status.to_string()).or_default() += 1;
        }

        Self {
            total_users: users.len(),
            customers: count_role(Role::Customer),
            agents: count_role(Role::Agent),
            staff: count_role(Role::Staff),
            total_properties: properties.len(),
            properties_by_status,
            total_bookings: bookings.len(),
            bookings_by_status,
        }
    }
}

pub async fn dashboard_stats(
    State(state): State<ApiState>,
) -> Result<Json<DashboardStats>, AppError> {
    let property_filter = PropertyFilter::default();
    let booking_filter = BookingFilter::default();

    let (users, properties, bookings) = tokio::try_join!(
        state.users.list_users(),
        state.properties.list_properties(&property_filter),
        state.bookings.list_bookings(&booking_filter),
    )?;

    Ok(Json(DashboardStats::tally(&users, &properties, &bookings)))
}
