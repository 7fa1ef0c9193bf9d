use crate::common::error::{DiscoveryError, Result};
use crate::common::types::{Event, GeoPoint, TasteProfile};
use crate::discovery::geo::within_radius;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Persistence for normalized events
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Event>>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Event>>;

    /// Insert as a new row, assigning `event.id`
    async fn insert(&self, event: &mut Event) -> Result<()>;

    /// Overwrite the row with `event.id` in place
    async fn update(&self, event: &Event) -> Result<()>;

    /// Update-or-insert keyed by `external_id`. Events without one always insert.
    async fn upsert(&self, event: &mut Event) -> Result<UpsertOutcome> {
        if let Some(external_id) = event.external_id.clone() {
            if let Some(existing) = self.get_by_external_id(&external_id).await? {
                event.id = existing.id;
                event.created_at = existing.created_at;
                event.updated_at = Utc::now();
                self.update(event).await?;
                return Ok(UpsertOutcome::Updated);
            }
        }
        event.id = None;
        self.insert(event).await?;
        Ok(UpsertOutcome::Inserted)
    }

    /// Every stored event, in store order
    async fn all(&self) -> Result<Vec<Event>>;

    /// Events within `radius_km` of `center`; events without coordinates are excluded
    async fn query_by_radius(&self, center: GeoPoint, radius_km: f64) -> Result<Vec<Event>> {
        let events = self.all().await?;
        Ok(events
            .into_iter()
            .filter(|e| within_radius(e, center, radius_km))
            .collect())
    }

    /// Administrative removal; ingestion never deletes
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Taste profiles keyed by user id
#[async_trait]
pub trait TasteProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<TasteProfile>>;
    /// Replaces any previous profile for the user
    async fn put_profile(&self, profile: TasteProfile) -> Result<()>;
}

#[derive(Default)]
struct EventTable {
    rows: Vec<Event>,
    by_id: HashMap<Uuid, usize>,
    by_external_id: HashMap<String, usize>,
}

impl EventTable {
    fn reindex(&mut self) {
        self.by_id.clear();
        self.by_external_id.clear();
        for (idx, event) in self.rows.iter().enumerate() {
            if let Some(id) = event.id {
                self.by_id.insert(id, idx);
            }
            if let Some(ext) = &event.external_id {
                self.by_external_id.insert(ext.clone(), idx);
            }
        }
    }
}

/// In-memory event store for development and testing.
/// Rows keep insertion order, which is the order rankings fall back to on ties.
#[derive(Default)]
pub struct InMemoryEventStore {
    table: RwLock<EventTable>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get(&self, id: Uuid) -> Result<Option<Event>> {
        let table = self.table.read().await;
        Ok(table.by_id.get(&id).map(|&idx| table.rows[idx].clone()))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Event>> {
        let table = self.table.read().await;
        Ok(table
            .by_external_id
            .get(external_id)
            .map(|&idx| table.rows[idx].clone()))
    }

    async fn insert(&self, event: &mut Event) -> Result<()> {
        let id = Uuid::new_v4();
        event.id = Some(id);

        let mut table = self.table.write().await;
        if let Some(ext) = &event.external_id {
            if table.by_external_id.contains_key(ext) {
                return Err(DiscoveryError::InvalidInput(format!(
                    "external id '{}' already stored",
                    ext
                )));
            }
        }
        let idx = table.rows.len();
        table.rows.push(event.clone());
        table.by_id.insert(id, idx);
        if let Some(ext) = &event.external_id {
            table.by_external_id.insert(ext.clone(), idx);
        }

        debug!("Created event: {} with id {}", event.name, id);
        Ok(())
    }

    async fn update(&self, event: &Event) -> Result<()> {
        let event_id = event
            .id
            .ok_or_else(|| DiscoveryError::InvalidInput("Cannot update event without ID".into()))?;

        let mut table = self.table.write().await;
        let idx = *table
            .by_id
            .get(&event_id)
            .ok_or_else(|| DiscoveryError::NotFound(format!("event {}", event_id)))?;
        table.rows[idx] = event.clone();
        table.reindex();

        debug!("Updated event: {} with id {}", event.name, event_id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Event>> {
        Ok(self.table.read().await.rows.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut table = self.table.write().await;
        let Some(idx) = table.by_id.get(&id).copied() else {
            return Ok(false);
        };
        table.rows.remove(idx);
        table.reindex();
        debug!("Deleted event {}", id);
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryTasteProfileStore {
    profiles: RwLock<HashMap<String, TasteProfile>>,
}

impl InMemoryTasteProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TasteProfileStore for InMemoryTasteProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<TasteProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn put_profile(&self, profile: TasteProfile) -> Result<()> {
        debug!("Stored taste profile for {}", profile.user_id);
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn show(name: &str, external_id: Option<&str>) -> Event {
        let date = Utc.with_ymd_and_hms(2025, 11, 1, 20, 0, 0).unwrap();
        let mut e = Event::new(name, "Neumos", date, "test");
        e.external_id = external_id.map(str::to_string);
        e
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let store = InMemoryEventStore::new();
        let mut first = show("Show", Some("x1"));
        assert_eq!(store.upsert(&mut first).await.unwrap(), UpsertOutcome::Inserted);

        let mut second = show("Show (Rescheduled)", Some("x1"));
        assert_eq!(store.upsert(&mut second).await.unwrap(), UpsertOutcome::Updated);

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Show (Rescheduled)");
        assert_eq!(all[0].id, first.id);
    }

    #[tokio::test]
    async fn test_events_without_external_id_always_insert() {
        let store = InMemoryEventStore::new();
        store.upsert(&mut show("Open Mic", None)).await.unwrap();
        store.upsert(&mut show("Open Mic", None)).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_delete_keeps_indexes_consistent() {
        let store = InMemoryEventStore::new();
        let mut a = show("A", Some("a"));
        let mut b = show("B", Some("b"));
        store.insert(&mut a).await.unwrap();
        store.insert(&mut b).await.unwrap();

        assert!(store.delete(a.id.unwrap()).await.unwrap());
        assert!(!store.delete(a.id.unwrap()).await.unwrap());
        let found = store.get_by_external_id("b").await.unwrap().unwrap();
        assert_eq!(found.name, "B");
        assert!(store.get(b.id.unwrap()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_profile_put_replaces() {
        let store = InMemoryTasteProfileStore::new();
        let mut p = TasteProfile::new("u1");
        p.mood_score = 0.2;
        store.put_profile(p.clone()).await.unwrap();
        p.mood_score = 0.9;
        store.put_profile(p).await.unwrap();
        let got = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(got.mood_score, 0.9);
        assert!(store.get_profile("nobody").await.unwrap().is_none());
    }
}
