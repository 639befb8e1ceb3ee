//! Agent auto-assignment for new property listings.
//!
//! Every new listing gets one agent picked from the agents whose status is
//! `Available`. Agents with a non-cancelled booking on today's date inside
//! the next [`BUFFER_WINDOW_MINUTES`] are considered busy and are skipped
//! when any other agent is free. When every available agent is busy the
//! pick falls back to the whole available pool.
//!
//! Two listings created at nearly the same instant read independent
//! snapshots of the booking ledger and may both receive the same free
//! agent. Nothing here prevents that.

use crate::models::UserId;
use crate::stores::{AgentDirectory, BookingLedger, StoreError};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lookahead from now during which a booking makes an agent busy
pub const BUFFER_WINDOW_MINUTES: i64 = 120;

/// Source of the current local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the host's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Uniform choice over a candidate list
pub trait Chooser: Send + Sync {
    /// Pick one candidate, or `None` if the slice is empty
    fn choose(&self, candidates: &[UserId]) -> Option<UserId>;
}

/// Thread-local pseudorandom choice. Not suitable for anything secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomChooser;

impl Chooser for RandomChooser {
    fn choose(&self, candidates: &[UserId]) -> Option<UserId> {
        candidates.choose(&mut rand::thread_rng()).copied()
    }
}

/// Which pool the assigned agent was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentBranch {
    /// At least one available agent had no booking in the window
    FreeAgent,
    /// Every available agent was busy; drawn from the full available pool
    AllBusy,
}

impl AssignmentBranch {
    pub fn label(&self) -> &'static str {
        match self {
            AssignmentBranch::FreeAgent => "assigned from free agents",
            AssignmentBranch::AllBusy => "all busy, assigned from full available pool",
        }
    }
}

impl fmt::Display for AssignmentBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub agent_id: UserId,
    pub branch: AssignmentBranch,
}

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("No eligible agents available to assign")]
    NoEligibleAgents,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Same-day time range used to decide whether an agent is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyWindow {
    pub date: NaiveDate,
    pub from: NaiveTime,
    pub to: NaiveTime,
}

impl BusyWindow {
    /// Window from `now` to `now + BUFFER_WINDOW_MINUTES`, clamped to the
    /// last second of `now`'s calendar date.
    pub fn starting_at(now: NaiveDateTime) -> Self {
        let date = now.date();
        let end = now + Duration::minutes(BUFFER_WINDOW_MINUTES);
        let to = if end.date() == date {
            end.time()
        } else {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
        };

        Self {
            date,
            from: now.time(),
            to,
        }
    }
}

/// Pick an agent given the available pool and the busy set.
///
/// Duplicate ids in either input are ignored.
pub fn select_agent(
    available: &[UserId],
    busy: &[UserId],
    chooser: &dyn Chooser,
) -> Result<Assignment, AssignmentError> {
    let available: BTreeSet<UserId> = available.iter().copied().collect();
    if available.is_empty() {
        return Err(AssignmentError::NoEligibleAgents);
    }

    let busy: BTreeSet<UserId> = busy.iter().copied().collect();
    let free: Vec<UserId> = available.difference(&busy).copied().collect();

    let (pool, branch) = if free.is_empty() {
        (available.into_iter().collect(), AssignmentBranch::AllBusy)
    } else {
        (free, AssignmentBranch::FreeAgent)
    };

    let agent_id = chooser
        .choose(&pool)
        .ok_or(AssignmentError::NoEligibleAgents)?;

    Ok(Assignment { agent_id, branch })
}

/// Runs agent selection against live collaborators
#[derive(Clone)]
pub struct AgentSelector {
    agents: Arc<dyn AgentDirectory>,
    bookings: Arc<dyn BookingLedger>,
    clock: Arc<dyn Clock>,
    chooser: Arc<dyn Chooser>,
}

impl AgentSelector {
    pub fn new(
        agents: Arc<dyn AgentDirectory>,
        bookings: Arc<dyn BookingLedger>,
        clock: Arc<dyn Clock>,
        chooser: Arc<dyn Chooser>,
    ) -> Self {
        Self {
            agents,
            bookings,
            clock,
            chooser,
        }
    }

    /// Choose the agent for a listing being created now.
    ///
    /// Both collaborator reads happen on every call; nothing is cached.
    pub async fn assign(&self) -> Result<Assignment, AssignmentError> {
        let window = BusyWindow::starting_at(self.clock.now());
        debug!(date = %window.date, from = %window.from, to = %window.to, "Selecting agent");

        let (available, busy) = tokio::try_join!(
            self.agents.available_agents(),
            self.bookings.busy_agents(window.date, window.from, window.to),
        )?;

        match select_agent(&available, &busy, self.chooser.as_ref()) {
            Ok(assignment) => {
                info!(
                    agent_id = assignment.agent_id,
                    branch = %assignment.branch,
                    available = available.len(),
                    busy = busy.len(),
                    "Assigned agent to new listing"
                );
                Ok(assignment)
            }
            Err(e) => {
                warn!(error = %e, "Agent assignment failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmployeeStatus, NewBooking, NewUser, Role};
    use crate::stores::MemoryStore;
    use crate::stores::UserStore;

    /// Always picks the first candidate
    struct FirstChooser;

    impl Chooser for FirstChooser {
        fn choose(&self, candidates: &[UserId]) -> Option<UserId> {
            candidates.first().copied()
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn no_busy_agents_picks_from_everyone() {
        let available = [1, 2, 3];
        for _ in 0..50 {
            let a = select_agent(&available, &[], &RandomChooser).unwrap();
            assert!(available.contains(&a.agent_id));
            assert_eq!(a.branch, AssignmentBranch::FreeAgent);
        }
    }

    #[test]
    fn busy_agents_are_skipped_while_someone_is_free() {
        for _ in 0..50 {
            let a = select_agent(&[1, 2, 3], &[2], &RandomChooser).unwrap();
            assert!(a.agent_id == 1 || a.agent_id == 3);
            assert_eq!(a.branch, AssignmentBranch::FreeAgent);
        }
    }

    #[test]
    fn all_busy_falls_back_to_full_pool() {
        let a = select_agent(&[5], &[5], &RandomChooser).unwrap();
        assert_eq!(a.agent_id, 5);
        assert_eq!(a.branch, AssignmentBranch::AllBusy);

        for _ in 0..50 {
            let a = select_agent(&[4, 7], &[7, 4, 9], &RandomChooser).unwrap();
            assert!(a.agent_id == 4 || a.agent_id == 7);
            assert_eq!(a.branch, AssignmentBranch::AllBusy);
        }
    }

    #[test]
    fn empty_pool_is_an_error() {
        assert!(matches!(
            select_agent(&[], &[], &RandomChooser),
            Err(AssignmentError::NoEligibleAgents)
        ));
        assert!(matches!(
            select_agent(&[], &[1, 2], &RandomChooser),
            Err(AssignmentError::NoEligibleAgents)
        ));
    }

    #[test]
    fn chooser_sees_deduplicated_free_candidates() {
        let a = select_agent(&[3, 3, 1, 2], &[1], &FirstChooser).unwrap();
        assert_eq!(a.agent_id, 2);
    }

    #[test]
    fn window_spans_two_hours() {
        let window = BusyWindow::starting_at(at("2025-10-01 09:30:00"));
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(window.from, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(window.to, NaiveTime::from_hms_opt(11, 30, 0).unwrap());
    }

    #[test]
    fn window_is_clamped_at_midnight() {
        let window = BusyWindow::starting_at(at("2025-10-01 23:00:00"));
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(window.from, NaiveTime::from_hms_opt(23, 0, 0).unwrap());
        assert_eq!(window.to, NaiveTime::from_hms_opt(23, 59, 59).unwrap());
    }

    async fn add_agent(store: &MemoryStore, email: &str) -> UserId {
        store
            .insert_user(NewUser {
                name: "Test Agent".to_string(),
                email: email.to_string(),
                phone: None,
                address: None,
                username: None,
                password_hash: String::new(),
                role: Role::Agent,
                image: None,
                status: EmployeeStatus::Available,
            })
            .await
            .unwrap()
            .id
    }

    async fn book(store: &MemoryStore, agent_id: UserId, date: &str, time: &str) {
        store
            .insert_booking(NewBooking {
                listing_id: agent_id * 100,
                agent_id,
                customer_name: "Pedro Garcia".to_string(),
                customer_email: "pedro@example.com".to_string(),
                customer_phone: "09221234567".to_string(),
                visit_date: date.parse().unwrap(),
                visit_time: time.parse().unwrap(),
            })
            .await
            .unwrap();
    }

    fn selector(store: &Arc<MemoryStore>, now: &str) -> AgentSelector {
        AgentSelector::new(
            store.clone(),
            store.clone(),
            Arc::new(FixedClock(at(now))),
            Arc::new(RandomChooser),
        )
    }

    #[tokio::test]
    async fn assign_skips_agent_booked_inside_window() {
        let store = Arc::new(MemoryStore::new());
        let busy = add_agent(&store, "busy@example.com").await;
        let free = add_agent(&store, "free@example.com").await;
        book(&store, busy, "2025-10-01", "10:00:00").await;

        let selector = selector(&store, "2025-10-01 09:00:00");
        for _ in 0..20 {
            let a = selector.assign().await.unwrap();
            assert_eq!(a.agent_id, free);
            assert_eq!(a.branch, AssignmentBranch::FreeAgent);
        }
    }

    #[tokio::test]
    async fn bookings_outside_window_do_not_count() {
        let store = Arc::new(MemoryStore::new());
        let a = add_agent(&store, "a@example.com").await;
        // later today, and same time tomorrow
        book(&store, a, "2025-10-01", "15:00:00").await;
        book(&store, a, "2025-10-02", "10:00:00").await;

        let assignment = selector(&store, "2025-10-01 09:00:00").assign().await.unwrap();
        assert_eq!(assignment.agent_id, a);
        assert_eq!(assignment.branch, AssignmentBranch::FreeAgent);
    }

    #[tokio::test]
    async fn assign_without_agents_fails() {
        let store = Arc::new(MemoryStore::new());
        let result = selector(&store, "2025-10-01 09:00:00").assign().await;
        assert!(matches!(result, Err(AssignmentError::NoEligibleAgents)));
    }

    #[tokio::test]
    async fn unavailable_agents_are_never_assigned() {
        let store = Arc::new(MemoryStore::new());
        let away = add_agent(&store, "away@example.com").await;
        let here = add_agent(&store, "here@example.com").await;
        store.set_status(away, EmployeeStatus::OnLeave).await.unwrap();
        book(&store, here, "2025-10-01", "09:30:00").await;

        let a = selector(&store, "2025-10-01 09:00:00").assign().await.unwrap();
        assert_eq!(a.agent_id, here);
        assert_eq!(a.branch, AssignmentBranch::AllBusy);
    }
}
