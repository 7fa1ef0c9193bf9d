use crate::common::error::Result;
use crate::common::types::{Event, GeoPoint};
use crate::storage::EventStore;
use std::sync::Arc;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points (haversine)
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// True when the event has both coordinates and lies within `radius_km` of `center`.
/// Events without coordinates never match, whatever the radius.
pub fn within_radius(event: &Event, center: GeoPoint, radius_km: f64) -> bool {
    event
        .location()
        .map(|point| haversine_km(center, point) <= radius_km)
        .unwrap_or(false)
}

/// Sort ascending by start time; stable, so equal dates keep store order
pub fn sort_by_date(events: &mut [Event]) {
    events.sort_by(|a, b| a.date.cmp(&b.date));
}

/// Location filter applied to the event store before any scoring
#[derive(Clone)]
pub struct GeoQuery {
    store: Arc<dyn EventStore>,
}

impl GeoQuery {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Events within `radius_km` of (`lat`, `lng`).
    ///
    /// Without a full location the unfiltered set is returned sorted by start time.
    pub async fn query(
        &self,
        lat: Option<f64>,
        lng: Option<f64>,
        radius_km: f64,
    ) -> Result<Vec<Event>> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => {
                self.store
                    .query_by_radius(GeoPoint::new(lat, lng), radius_km)
                    .await
            }
            _ => {
                let mut events = self.store.all().await?;
                sort_by_date(&mut events);
                Ok(events)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event_at(point: Option<GeoPoint>) -> Event {
        let date = Utc.with_ymd_and_hms(2025, 9, 1, 20, 0, 0).unwrap();
        let event = Event::new("Show", "Venue", date, "test");
        match point {
            Some(p) => event.with_location(p),
            None => event,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Seattle to Portland is roughly 233 km
        let seattle = GeoPoint::new(47.6062, -122.3321);
        let portland = GeoPoint::new(45.5152, -122.6784);
        let d = haversine_km(seattle, portland);
        assert!((d - 233.0).abs() < 3.0, "distance was {}", d);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = GeoPoint::new(41.8781, -87.6298);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_within_radius_excludes_missing_coordinates() {
        let center = GeoPoint::new(47.6062, -122.3321);
        assert!(!within_radius(&event_at(None), center, 20_000.0));

        let mut half = event_at(None);
        half.latitude = Some(47.6);
        assert!(!within_radius(&half, center, 20_000.0));
    }

    #[test]
    fn test_within_radius_boundary() {
        let center = GeoPoint::new(47.6062, -122.3321);
        let nearby = event_at(Some(GeoPoint::new(47.6205, -122.3493)));
        assert!(within_radius(&nearby, center, 5.0));
        assert!(!within_radius(&nearby, center, 0.5));
    }
}
