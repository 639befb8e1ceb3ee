use crate::models::{
    Booking, BookingId, BookingStatus, EmployeeStatus, ListingId, NewBooking, NewProperty,
    NewUser, Property, PropertyStatus, Role, User, UserId,
};
use crate::stores::types::{BookingFilter, PropertyFilter};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

/// Failure raised by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Conflict(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Account storage for employees and customers
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert an account. Emails are unique, compared case-insensitively.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_by_role(&self, role: Role) -> StoreResult<Vec<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn set_status(&self, id: UserId, status: EmployeeStatus) -> StoreResult<User>;
}

/// Source of agents eligible for listing assignment
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Ids of users with role Agent and status Available
    async fn available_agents(&self) -> StoreResult<Vec<UserId>>;
}

/// Viewing appointments
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Distinct agent ids holding a non-cancelled booking on `date`
    /// with a visit time in `[from, to]`
    async fn busy_agents(
        &self,
        date: NaiveDate,
        from: NaiveTime,
        to: NaiveTime,
    ) -> StoreResult<Vec<UserId>>;

    /// Insert a booking. Fails with `Conflict` when the listing or the
    /// agent already holds a non-cancelled booking at the same date and time.
    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking>;

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;

    /// Move a booking to `next`. The current status is checked against
    /// [`BookingStatus::can_transition_to`] atomically with the write;
    /// a disallowed move fails with `Conflict`.
    async fn transition_booking(&self, id: BookingId, next: BookingStatus)
        -> StoreResult<Booking>;
}

/// Property listings and their images
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn insert_property(&self, property: NewProperty) -> StoreResult<Property>;

    async fn get_property(&self, id: ListingId) -> StoreResult<Option<Property>>;

    async fn list_properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>>;

    async fn set_property_status(
        &self,
        id: ListingId,
        status: PropertyStatus,
    ) -> StoreResult<Property>;
}

/// Blob storage for uploaded listing images
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist an image and return the URL clients fetch it from
    async fn save_image(&self, file_name: &str, bytes: &[u8]) -> StoreResult<String>;

    /// Delete an image by the URL `save_image` returned
    async fn remove_image(&self, url: &str) -> StoreResult<()>;
}
