use crate::models::{
    Booking, BookingId, BookingStatus, EmployeeStatus, ListingId, NewBooking, NewProperty,
    NewUser, Property, PropertyImage, PropertyStatus, Role, User, UserId,
};
use crate::stores::traits::{
    AgentDirectory, BookingLedger, PropertyStore, StoreError, StoreResult, UserStore,
};
use crate::stores::types::{BookingFilter, PropertyFilter};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    properties: BTreeMap<ListingId, Property>,
    bookings: BTreeMap<BookingId, Booking>,
    next_user_id: i64,
    next_listing_id: i64,
    next_image_id: i64,
    next_booking_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-process store backing every repository trait.
///
/// Ids are assigned sequentially from 1, like a serial column.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        let email = user.email.trim().to_string();
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&email))
        {
            return Err(StoreError::Conflict(format!(
                "An account with email {email} already exists"
            )));
        }

        let id = next_id(&mut tables.next_user_id);
        let record = User {
            id,
            name: user.name,
            email,
            phone: user.phone,
            address: user.address,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            image: user.image,
            status: user.status,
            created_at: Utc::now(),
        };
        tables.users.insert(id, record.clone());
        debug!(user_id = id, role = %record.role, "Inserted user");

        Ok(record)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim();
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_by_role(&self, role: Role) -> StoreResult<Vec<User>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn set_status(&self, id: UserId, status: EmployeeStatus) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "user", id })?;
        user.status = status;
        Ok(user.clone())
    }
}

#[async_trait]
impl AgentDirectory for MemoryStore {
    async fn available_agents(&self) -> StoreResult<Vec<UserId>> {
        let agents: Vec<UserId> = self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|u| u.role == Role::Agent && u.status == EmployeeStatus::Available)
            .map(|u| u.id)
            .collect();
        debug!(count = agents.len(), "Queried available agents");
        Ok(agents)
    }
}

#[async_trait]
impl BookingLedger for MemoryStore {
    async fn busy_agents(
        &self,
        date: NaiveDate,
        from: NaiveTime,
        to: NaiveTime,
    ) -> StoreResult<Vec<UserId>> {
        let busy: BTreeSet<UserId> = self
            .tables
            .read()
            .await
            .bookings
            .values()
            .filter(|b| {
                !b.status.is_cancelled()
                    && b.visit_date == date
                    && b.visit_time >= from
                    && b.visit_time <= to
            })
            .map(|b| b.agent_id)
            .collect();
        debug!(%date, %from, %to, count = busy.len(), "Queried busy agents");
        Ok(busy.into_iter().collect())
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<Booking> {
        let mut tables = self.tables.write().await;

        let clash = tables.bookings.values().find(|b| {
            !b.status.is_cancelled()
                && b.visit_date == booking.visit_date
                && b.visit_time == booking.visit_time
                && (b.listing_id == booking.listing_id || b.agent_id == booking.agent_id)
        });
        if let Some(existing) = clash {
            let reason = if existing.listing_id == booking.listing_id {
                "This time slot is already booked for the property"
            } else {
                "The assigned agent already has an appointment at this time"
            };
            return Err(StoreError::Conflict(reason.to_string()));
        }

        let id = next_id(&mut tables.next_booking_id);
        let record = Booking {
            booking_id: id,
            listing_id: booking.listing_id,
            agent_id: booking.agent_id,
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            customer_phone: booking.customer_phone,
            visit_date: booking.visit_date,
            visit_time: booking.visit_time,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        };
        tables.bookings.insert(id, record.clone());

        Ok(record)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .tables
            .read()
            .await
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.visit_date, b.visit_time, b.booking_id));
        Ok(bookings)
    }

    async fn transition_booking(
        &self,
        id: BookingId,
        next: BookingStatus,
    ) -> StoreResult<Booking> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "booking", id })?;

        if !booking.status.can_transition_to(next) {
            return Err(StoreError::Conflict(format!(
                "Cannot change booking from {} to {}",
                booking.status, next
            )));
        }
        booking.status = next;
        Ok(booking.clone())
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn insert_property(&self, property: NewProperty) -> StoreResult<Property> {
        let mut tables = self.tables.write().await;

        let listing_id = next_id(&mut tables.next_listing_id);
        let mut images = Vec::with_capacity(property.image_paths.len());
        for (position, path) in property.image_paths.into_iter().enumerate() {
            images.push(PropertyImage {
                image_id: next_id(&mut tables.next_image_id),
                listing_id,
                path,
                position: position as u32,
            });
        }

        let record = Property {
            listing_id,
            lot_name: property.lot_name,
            lot_number: property.lot_number,
            lot_type: property.lot_type,
            price: property.price,
            province: property.province,
            lot_area: property.lot_area,
            area_unit: property.area_unit,
            location: property.location,
            description: property.description,
            status: PropertyStatus::Pending,
            assigned_agent_id: property.assigned_agent_id,
            created_by: property.created_by,
            created_at: Utc::now(),
            images,
        };
        tables.properties.insert(listing_id, record.clone());

        Ok(record)
    }

    async fn get_property(&self, id: ListingId) -> StoreResult<Option<Property>> {
        Ok(self.tables.read().await.properties.get(&id).cloned())
    }

    async fn list_properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>> {
        Ok(self
            .tables
            .read()
            .await
            .properties
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn set_property_status(
        &self,
        id: ListingId,
        status: PropertyStatus,
    ) -> StoreResult<Property> {
        let mut tables = self.tables.write().await;
        let property = tables
            .properties
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "property", id })?;
        property.status = status;
        Ok(property.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AreaUnit, LotType};

    fn agent(name: &str, email: &str, status: EmployeeStatus) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
            address: None,
            username: None,
            password_hash: "x".to_string(),
            role: Role::Agent,
            image: None,
            status,
        }
    }

    fn booking(listing_id: ListingId, agent_id: UserId, time: &str) -> NewBooking {
        NewBooking {
            listing_id,
            agent_id,
            customer_name: "Juan Dela Cruz".to_string(),
            customer_email: "juan@example.com".to_string(),
            customer_phone: "09123456789".to_string(),
            visit_date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            visit_time: time.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store
            .insert_user(agent("Ana Dizon", "ana@example.com", EmployeeStatus::Available))
            .await
            .unwrap();

        let err = store
            .insert_user(agent("Ana D", "ANA@example.com", EmployeeStatus::Available))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn available_agents_excludes_other_statuses_and_roles() {
        let store = MemoryStore::new();
        let a = store
            .insert_user(agent("Ana Dizon", "ana@example.com", EmployeeStatus::Available))
            .await
            .unwrap();
        store
            .insert_user(agent("Mark Reyes", "mark@example.com", EmployeeStatus::OnLeave))
            .await
            .unwrap();
        let mut staff = agent("Maria Santos", "maria@example.com", EmployeeStatus::Available);
        staff.role = Role::Staff;
        store.insert_user(staff).await.unwrap();

        assert_eq!(store.available_agents().await.unwrap(), vec![a.id]);
    }

    #[tokio::test]
    async fn busy_agents_window_is_inclusive_and_skips_cancelled() {
        let store = MemoryStore::new();
        let first = store.insert_booking(booking(1, 10, "09:00:00")).await.unwrap();
        store.insert_booking(booking(2, 11, "11:00:00")).await.unwrap();
        store.insert_booking(booking(3, 12, "11:30:00")).await.unwrap();
        store
            .transition_booking(first.booking_id, BookingStatus::Cancelled)
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let busy = store
            .busy_agents(date, "09:00:00".parse().unwrap(), "11:00:00".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(busy, vec![11]);

        let other_day = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        let busy = store
            .busy_agents(other_day, "00:00:00".parse().unwrap(), "23:59:59".parse().unwrap())
            .await
            .unwrap();
        assert!(busy.is_empty());
    }

    #[tokio::test]
    async fn double_booking_a_slot_is_rejected_until_cancelled() {
        let store = MemoryStore::new();
        let first = store.insert_booking(booking(1, 10, "10:00:00")).await.unwrap();

        let same_listing = store.insert_booking(booking(1, 11, "10:00:00")).await;
        assert!(matches!(same_listing, Err(StoreError::Conflict(_))));

        let same_agent = store.insert_booking(booking(2, 10, "10:00:00")).await;
        assert!(matches!(same_agent, Err(StoreError::Conflict(_))));

        store
            .transition_booking(first.booking_id, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert!(store.insert_booking(booking(1, 11, "10:00:00")).await.is_ok());
    }

    #[tokio::test]
    async fn transitions_follow_the_status_table() {
        let store = MemoryStore::new();
        let b = store.insert_booking(booking(1, 10, "10:00:00")).await.unwrap();

        let confirmed = store
            .transition_booking(b.booking_id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = store
            .transition_booking(b.booking_id, BookingStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot change booking from Confirmed to Pending");

        let missing = store.transition_booking(99, BookingStatus::Done).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn concurrent_transitions_from_pending_admit_one() {
        let store = MemoryStore::new();
        let b = store.insert_booking(booking(1, 10, "10:00:00")).await.unwrap();

        let (declined, confirmed) = tokio::join!(
            store.transition_booking(b.booking_id, BookingStatus::Declined),
            store.transition_booking(b.booking_id, BookingStatus::Confirmed),
        );
        assert_ne!(declined.is_ok(), confirmed.is_ok());

        let stored = store
            .list_bookings(&BookingFilter::default())
            .await
            .unwrap()
            .remove(0);
        let winner = if declined.is_ok() {
            BookingStatus::Declined
        } else {
            BookingStatus::Confirmed
        };
        assert_eq!(stored.status, winner);
    }

    #[tokio::test]
    async fn property_images_keep_upload_order() {
        let store = MemoryStore::new();
        let property = store
            .insert_property(NewProperty {
                lot_name: "Beachfront Paradise".to_string(),
                lot_number: None,
                lot_type: LotType::Beachfront,
                price: 5_000_000.0,
                province: "Batangas".to_string(),
                lot_area: 2000.0,
                area_unit: AreaUnit::Sqm,
                location: "Cuta, Batangas City".to_string(),
                description: String::new(),
                assigned_agent_id: 1,
                created_by: None,
                image_paths: vec!["a.png".into(), "b.png".into(), "c.png".into()],
            })
            .await
            .unwrap();

        assert_eq!(property.status, PropertyStatus::Pending);
        let paths: Vec<_> = property.images.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, ["a.png", "b.png", "c.png"]);
        assert_eq!(property.images[2].position, 2);

        let missing = store.set_property_status(99, PropertyStatus::Available).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }
}
