use std::collections::BTreeSet;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::accounts::StatusRequest;
use super::{parse_label, required, ApiState};
use crate::error::AppError;
use crate::models::{
    Booking, BookingId, BookingStatus, ListingId, NewBooking, Property, PropertyStatus, Role,
    UserId,
};
use crate::stores::BookingFilter;

const FIRST_SLOT_HOUR: u32 = 8;
const LAST_SLOT_HOUR: u32 = 16;

/// Start times of the fixed hourly viewing slots
pub fn viewing_slots() -> Vec<NaiveTime> {
    (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .collect()
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, AppError> {
    let raw = required(value, field)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("{field} must be a YYYY-MM-DD date")))
}

fn parse_time(value: Option<&str>, field: &str) -> Result<NaiveTime, AppError> {
    let raw = required(value, field)?;
    NaiveTime::parse_from_str(&raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
        .map_err(|_| AppError::bad_request(format!("{field} must be an HH:MM time")))
}

async fn load_property(state: &ApiState, id: ListingId) -> Result<Property, AppError> {
    state
        .properties
        .get_property(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("property {id}")))
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Slot {
    pub time: String,
    pub available: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotsResponse {
    pub listing_id: ListingId,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Hourly slots for one listing and day, marking the ones already booked
/// or already past
pub async fn property_slots(
    State(state): State<ApiState>,
    Path(id): Path<ListingId>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let date = parse_date(query.date.as_deref(), "date")?;
    load_property(&state, id).await?;

    let filter = BookingFilter {
        listing_id: Some(id),
        visit_date: Some(date),
        ..Default::default()
    };
    let taken: BTreeSet<NaiveTime> = state
        .bookings
        .list_bookings(&filter)
        .await?
        .into_iter()
        .filter(|b| !b.status.is_cancelled())
        .map(|b| b.visit_time)
        .collect();

    let now = state.clock.now();
    let slots = viewing_slots()
        .into_iter()
        .map(|time| Slot {
            time: time.format("%H:%M").to_string(),
            available: !taken.contains(&time) && NaiveDateTime::new(date, time) > now,
        })
        .collect();

    Ok(Json(SlotsResponse {
        listing_id: id,
        date,
        slots,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub listing_id: Option<ListingId>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub visit_date: Option<String>,
    pub visit_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub msg: String,
    pub booking: Booking,
}

pub async fn create_booking(
    State(state): State<ApiState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let listing_id = req
        .listing_id
        .ok_or_else(|| AppError::bad_request("listing_id is required"))?;
    let customer_name = required(req.customer_name.as_deref(), "customer_name")?;
    let customer_email = required(req.customer_email.as_deref(), "customer_email")?;
    let customer_phone = required(req.customer_phone.as_deref(), "customer_phone")?;
    let visit_date = parse_date(req.visit_date.as_deref(), "visit_date")?;
    let visit_time = parse_time(req.visit_time.as_deref(), "visit_time")?;

    if !viewing_slots().contains(&visit_time) {
        return Err(AppError::bad_request(format!(
            "Viewings start on the hour between {FIRST_SLOT_HOUR:02}:00 and {LAST_SLOT_HOUR:02}:00"
        )));
    }
    if NaiveDateTime::new(visit_date, visit_time) <= state.clock.now() {
        return Err(AppError::bad_request("Cannot book a viewing in the past"));
    }

    let property = load_property(&state, listing_id).await?;
    if property.status != PropertyStatus::Available {
        warn!(listing_id, status = %property.status, "Booking attempt on unlisted property");
        return Err(AppError::bad_request("Property is not open for viewings"));
    }

    let booking = state
        .bookings
        .insert_booking(NewBooking {
            listing_id,
            agent_id: property.assigned_agent_id,
            customer_name,
            customer_email,
            customer_phone,
            visit_date,
            visit_time,
        })
        .await?;
    info!(
        booking_id = booking.booking_id,
        listing_id,
        agent_id = booking.agent_id,
        "Viewing booked"
    );

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            msg: "Appointment booked".to_string(),
            booking,
        }),
    ))
}

/// Appointments matching the query, e.g. one customer's by email
pub async fn list_bookings(
    State(state): State<ApiState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_bookings(&filter).await?))
}

pub async fn agent_appointments(
    State(state): State<ApiState>,
    Path(id): Path<UserId>,
    Query(mut filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    match state.users.get_user(id).await? {
        Some(user) if user.role == Role::Agent => {}
        _ => return Err(AppError::NotFound(format!("agent {id}"))),
    }

    filter.agent_id = Some(id);
    Ok(Json(state.bookings.list_bookings(&filter).await?))
}

pub async fn set_booking_status(
    State(state): State<ApiState>,
    Path(id): Path<BookingId>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let next: BookingStatus = parse_label(req.status.as_deref(), "status")?;

    let booking = state.bookings.transition_booking(id, next).await?;
    info!(booking_id = id, to = %next, "Booking status changed");

    Ok(Json(BookingResponse {
        msg: format!("Appointment {next}"),
        booking,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_cover_business_hours() {
        let slots = viewing_slots();
        assert_eq!(slots.len(), 9);
        assert_eq!(slots[0], NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(slots[8], NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    }

    #[test]
    fn times_accept_with_or_without_seconds() {
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(parse_time(Some("10:00"), "visit_time").unwrap(), ten);
        assert_eq!(parse_time(Some("10:00:00"), "visit_time").unwrap(), ten);
        assert!(parse_time(Some("ten"), "visit_time").is_err());
    }

    #[test]
    fn dates_must_be_iso() {
        assert!(parse_date(Some("2025-10-01"), "date").is_ok());
        assert!(parse_date(Some("10/01/2025"), "date").is_err());
        assert!(parse_date(None, "date").is_err());
    }
}
