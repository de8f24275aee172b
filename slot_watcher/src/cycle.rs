use crate::error::CycleError;
use crate::notifier::{Notify, SlotEmail};
use shared::locations::LocationTarget;
use shared::store::{NotificationKey, NotificationStore, NotifiedSet};
use shared::ttp::client::AvailabilityClient;
use shared::ttp::slots::Slot;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub trait SlotSource {
    async fn slots(&self, location: &LocationTarget) -> Vec<Slot>;
}

impl SlotSource for AvailabilityClient {
    async fn slots(&self, location: &LocationTarget) -> Vec<Slot> {
        self.fetch(&location.id).await
    }
}

/// Wait between locations.
pub trait Pause {
    async fn pause(&self, duration: Duration);
}

pub struct TokioPause;

impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub locations_checked: usize,
    pub notifications_sent: usize,
    pub tracked_keys: usize,
    /// False when the notified set could not be written back.
    pub persisted: bool,
}

/// Whether `slot` should trigger an email: earlier than the target date and not seen before.
pub fn qualifies(location: &LocationTarget, slot: &Slot, notified: &NotifiedSet) -> bool {
    slot.is_before(&location.target_date)
        && !notified.contains(&NotificationKey::new(&location.id, &slot.start_timestamp))
}

/// One poll-compare-notify-persist pass over every configured location.
pub struct Cycle<S, N, P> {
    source: S,
    notifier: N,
    pause: P,
    courtesy_delay: Duration,
    booking_url: String,
}

impl<S: SlotSource, N: Notify, P: Pause> Cycle<S, N, P> {
    pub fn new(
        source: S,
        notifier: N,
        pause: P,
        courtesy_delay: Duration,
        booking_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            notifier,
            pause,
            courtesy_delay,
            booking_url: booking_url.into(),
        }
    }

    /// Loads the notified set, checks each location in order and saves the set once at the
    /// end. A failed save is reported in the summary rather than as an error, so progress
    /// made during this run is lost if the process dies before the final save.
    pub async fn run(
        &self,
        locations: &[LocationTarget],
        store: &NotificationStore,
    ) -> Result<CycleSummary, CycleError> {
        if locations.is_empty() {
            return Err(CycleError::NoLocations);
        }

        let mut notified = store.load();
        info!(
            locations = locations.len(),
            tracked_keys = notified.len(),
            "starting availability check"
        );

        let mut notifications_sent = 0;
        for (i, location) in locations.iter().enumerate() {
            if i > 0 {
                self.pause.pause(self.courtesy_delay).await;
            }
            notifications_sent += self.check_location(location, &mut notified).await;
        }

        let persisted = match store.save(&notified) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    path = %store.path().display(),
                    error = ?e,
                    "failed to save notified appointments"
                );
                false
            }
        };

        Ok(CycleSummary {
            locations_checked: locations.len(),
            notifications_sent,
            tracked_keys: notified.len(),
            persisted,
        })
    }

    async fn check_location(
        &self,
        location: &LocationTarget,
        notified: &mut NotifiedSet,
    ) -> usize {
        let slots = self.source.slots(location).await;
        if slots.is_empty() {
            info!(location = %location, "no available slots");
            return 0;
        }
        info!(location = %location, count = slots.len(), "found available slots");

        let mut sent = 0;
        for slot in &slots {
            let key = NotificationKey::new(&location.id, &slot.start_timestamp);
            if !qualifies(location, slot, notified) {
                if slot.is_before(&location.target_date) {
                    debug!(key = %key, "already notified for slot");
                } else {
                    debug!(
                        location = %location,
                        slot = %slot.start_timestamp,
                        target_date = %location.target_date,
                        "slot is not earlier than target date"
                    );
                }
                continue;
            }

            let email = SlotEmail::new(location, slot, &self.booking_url);
            if self.notifier.send(&email.subject, &email.body).await {
                info!(location = %location, slot = %slot.start_timestamp, "notified about earlier slot");
                notified.insert(key);
                sent += 1;
            } else {
                warn!(key = %key, "notification not sent, slot stays eligible for the next run");
            }
        }

        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSource {
        slots: HashMap<String, Vec<Slot>>,
    }

    impl FakeSource {
        fn with(mut self, location_id: &str, starts: &[&str]) -> Self {
            self.slots.insert(
                location_id.to_string(),
                starts.iter().map(|s| Slot::starting_at(*s)).collect(),
            );
            self
        }
    }

    impl SlotSource for FakeSource {
        async fn slots(&self, location: &LocationTarget) -> Vec<Slot> {
            self.slots.get(&location.id).cloned().unwrap_or_default()
        }
    }

    struct RecordingNotifier {
        succeed: bool,
        subjects: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                subjects: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> usize {
            self.subjects.lock().unwrap().len()
        }
    }

    impl Notify for RecordingNotifier {
        async fn send(&self, subject: &str, _body: &str) -> bool {
            self.subjects.lock().unwrap().push(subject.to_string());
            self.succeed
        }
    }

    #[derive(Default)]
    struct RecordingPause {
        calls: Mutex<Vec<Duration>>,
    }

    impl Pause for RecordingPause {
        async fn pause(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }

    fn location(id: &str, name: &str, target_date: &str) -> LocationTarget {
        LocationTarget {
            id: id.to_string(),
            name: name.to_string(),
            target_date: target_date.to_string(),
        }
    }

    fn cycle<S: SlotSource>(
        source: S,
        succeed: bool,
    ) -> Cycle<S, RecordingNotifier, RecordingPause> {
        Cycle::new(
            source,
            RecordingNotifier::new(succeed),
            RecordingPause::default(),
            Duration::from_secs(2),
            "https://ttp.cbp.dhs.gov/",
        )
    }

    fn temp_store() -> (TempDir, NotificationStore) {
        let dir = TempDir::new().unwrap();
        let store = NotificationStore::new(dir.path().join("notified.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn earlier_slot_sends_one_email_and_is_recorded() {
        let (_dir, store) = temp_store();
        let cycle = cycle(FakeSource::default().with("5140", &["2025-03-15T09:00:00"]), true);

        let summary = cycle
            .run(&[location("5140", "JFK", "2025-04-01")], &store)
            .await
            .unwrap();

        assert_eq!(
            summary,
            CycleSummary {
                locations_checked: 1,
                notifications_sent: 1,
                tracked_keys: 1,
                persisted: true,
            }
        );
        assert_eq!(cycle.notifier.attempts(), 1);
        assert!(store
            .load()
            .contains(&NotificationKey::new("5140", "2025-03-15T09:00:00")));
    }

    #[tokio::test]
    async fn later_slot_sends_nothing() {
        let (_dir, store) = temp_store();
        let cycle = cycle(FakeSource::default().with("5140", &["2025-05-01T09:00:00"]), true);

        let summary = cycle
            .run(&[location("5140", "JFK", "2025-04-01")], &store)
            .await
            .unwrap();

        assert_eq!(summary.notifications_sent, 0);
        assert_eq!(summary.tracked_keys, 0);
        assert_eq!(cycle.notifier.attempts(), 0);
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn slot_on_target_date_does_not_qualify() {
        let (_dir, store) = temp_store();
        let cycle = cycle(FakeSource::default().with("5140", &["2025-04-01T08:00"]), true);

        let summary = cycle
            .run(&[location("5140", "JFK", "2025-04-01")], &store)
            .await
            .unwrap();

        assert_eq!(summary.notifications_sent, 0);
    }

    #[tokio::test]
    async fn no_locations_is_fatal() {
        let (_dir, store) = temp_store();
        let cycle = cycle(FakeSource::default(), true);

        assert!(matches!(
            cycle.run(&[], &store).await,
            Err(CycleError::NoLocations)
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn previously_notified_slot_is_not_resent() {
        let (_dir, store) = temp_store();
        let first = cycle(FakeSource::default().with("5140", &["2025-03-15T09:00"]), true);
        let locations = [location("5140", "JFK", "2025-04-01")];
        first.run(&locations, &store).await.unwrap();

        let second = cycle(FakeSource::default().with("5140", &["2025-03-15T09:00"]), true);
        let summary = second.run(&locations, &store).await.unwrap();

        assert_eq!(summary.notifications_sent, 0);
        assert_eq!(summary.tracked_keys, 1);
        assert_eq!(second.notifier.attempts(), 0);
    }

    #[tokio::test]
    async fn duplicate_slot_within_a_run_notifies_once() {
        let (_dir, store) = temp_store();
        let cycle = cycle(
            FakeSource::default().with("5140", &["2025-03-15T09:00", "2025-03-15T09:00"]),
            true,
        );
        let jfk = location("5140", "JFK", "2025-04-01");

        let summary = cycle.run(&[jfk.clone(), jfk], &store).await.unwrap();

        assert_eq!(summary.notifications_sent, 1);
        assert_eq!(cycle.notifier.attempts(), 1);
    }

    #[tokio::test]
    async fn failed_send_leaves_slot_eligible() {
        let (_dir, store) = temp_store();
        let locations = [location("5140", "JFK", "2025-04-01")];
        let failing = cycle(FakeSource::default().with("5140", &["2025-03-15T09:00"]), false);

        let summary = failing.run(&locations, &store).await.unwrap();
        assert_eq!(summary.notifications_sent, 0);
        assert_eq!(summary.tracked_keys, 0);
        assert_eq!(failing.notifier.attempts(), 1);

        let retry = cycle(FakeSource::default().with("5140", &["2025-03-15T09:00"]), true);
        let summary = retry.run(&locations, &store).await.unwrap();
        assert_eq!(summary.notifications_sent, 1);
    }

    #[tokio::test]
    async fn location_without_slots_does_not_stop_the_cycle() {
        let (_dir, store) = temp_store();
        let cycle = cycle(FakeSource::default().with("5446", &["2025-02-01T13:30"]), true);

        let summary = cycle
            .run(
                &[
                    location("5140", "JFK", "2025-04-01"),
                    location("5446", "SFO", "2025-06-15"),
                ],
                &store,
            )
            .await
            .unwrap();

        assert_eq!(summary.locations_checked, 2);
        assert_eq!(summary.notifications_sent, 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_counts_as_no_slots() {
        let (_dir, store) = temp_store();
        let client =
            AvailabilityClient::new("http://127.0.0.1:9", Duration::from_secs(1), 5).unwrap();
        let cycle = cycle(client, true);

        let summary = cycle
            .run(&[location("5140", "JFK", "2025-04-01")], &store)
            .await
            .unwrap();

        assert_eq!(summary.notifications_sent, 0);
        assert!(summary.persisted);
    }

    #[tokio::test]
    async fn pauses_between_locations_only() {
        let (_dir, store) = temp_store();
        let cycle = cycle(FakeSource::default(), true);

        cycle
            .run(
                &[
                    location("5140", "JFK", "2025-04-01"),
                    location("5446", "SFO", "2025-06-15"),
                    location("5003", "ORD", "2025-05-01"),
                ],
                &store,
            )
            .await
            .unwrap();

        assert_eq!(
            *cycle.pause.calls.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn save_failure_is_reported_in_summary() {
        let dir = TempDir::new().unwrap();
        let store = NotificationStore::new(dir.path().join("missing").join("notified.json"));
        let cycle = cycle(FakeSource::default().with("5140", &["2025-03-15T09:00"]), true);

        let summary = cycle
            .run(&[location("5140", "JFK", "2025-04-01")], &store)
            .await
            .unwrap();

        assert_eq!(summary.notifications_sent, 1);
        assert!(!summary.persisted);
    }

    #[test]
    fn qualification_needs_earlier_date_and_unseen_key() {
        let jfk = location("5140", "JFK", "2025-04-01");
        let early = Slot::starting_at("2025-03-15T09:00");
        let late = Slot::starting_at("2025-04-02T09:00");
        let mut notified = NotifiedSet::new();

        assert!(qualifies(&jfk, &early, &notified));
        assert!(!qualifies(&jfk, &late, &notified));

        notified.insert(NotificationKey::new("5140", "2025-03-15T09:00"));
        assert!(!qualifies(&jfk, &early, &notified));

        notified.insert(NotificationKey::new("5140", "2025-04-02T09:00"));
        assert!(!qualifies(&jfk, &late, &notified));
    }
}
