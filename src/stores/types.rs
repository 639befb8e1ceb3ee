use crate::models::{Booking, BookingStatus, ListingId, LotType, Property, PropertyStatus, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Filter for listing queries. Every field is optional; unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub status: Option<PropertyStatus>,
    /// Province, matched case-insensitively
    pub province: Option<String>,
    pub lot_type: Option<LotType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub assigned_agent_id: Option<UserId>,
}

impl PropertyFilter {
    pub fn matches(&self, property: &Property) -> bool {
        self.status.map_or(true, |s| property.status == s)
            && self
                .province
                .as_deref()
                .map_or(true, |p| property.province.eq_ignore_ascii_case(p.trim()))
            && self.lot_type.map_or(true, |t| property.lot_type == t)
            && self.min_price.map_or(true, |min| property.price >= min)
            && self.max_price.map_or(true, |max| property.price <= max)
            && self
                .assigned_agent_id
                .map_or(true, |id| property.assigned_agent_id == id)
    }
}

/// Filter for appointment queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub customer_email: Option<String>,
    pub agent_id: Option<UserId>,
    pub listing_id: Option<ListingId>,
    pub status: Option<BookingStatus>,
    pub visit_date: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.customer_email
            .as_deref()
            .map_or(true, |e| booking.customer_email.eq_ignore_ascii_case(e.trim()))
            && self.agent_id.map_or(true, |id| booking.agent_id == id)
            && self.listing_id.map_or(true, |id| booking.listing_id == id)
            && self.status.map_or(true, |s| booking.status == s)
            && self.visit_date.map_or(true, |d| booking.visit_date == d)
    }
}
