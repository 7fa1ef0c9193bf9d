//! Relevance scoring.
//!
//! Two independent, side-effect-free modes:
//! - taste: an event against a listener's [`TasteProfile`]
//! - mood: an event against a mood's keyword set
//!
//! Rankings sort by score descending with a stable sort, so ties keep the
//! order of the input collection. No secondary key is applied.

use crate::common::constants::TOP_EVENTS_PER_MOOD;
use crate::common::types::{Event, GenreWeight, ScoredEvent, TasteProfile};
use crate::discovery::mood::Mood;
use serde::Serialize;
use std::cmp::Ordering;

/// Every candidate starts here, so zero overlap still ranks above nothing
pub const BASE_TASTE_SCORE: f64 = 1.0;
pub const GENRE_MATCH_FACTOR: f64 = 3.0;
pub const ARTIST_MATCH_FACTOR: f64 = 5.0;
/// Keyword hits needed for a full mood score
pub const MOOD_SATURATION_HITS: f64 = 3.0;

enum GenreSource {
    Top,
    Recent,
}

/// First listener genre contained in the event genre, or None.
/// Scanning stops at the first hit; weights of later matches are ignored.
fn first_genre_match<'a>(event_genre: &str, genres: &'a [GenreWeight]) -> Option<&'a GenreWeight> {
    genres.iter().find(|g| {
        let token = g.genre.trim().to_lowercase();
        !token.is_empty() && event_genre.contains(&token)
    })
}

/// Score an event against a taste profile.
///
/// `1 + 3 * (genre_weight / 10)` for the first top genre contained in the event
/// genre (recent genres are consulted only when no top genre matches), plus
/// `5 * (artist_weight / 10)` for the first top artist contained in the event name.
pub fn taste_score(event: &Event, profile: &TasteProfile) -> ScoredEvent {
    let mut score = BASE_TASTE_SCORE;
    let mut genre_reason = None;
    let mut artist_reason = None;

    if let Some(event_genre) = event.genre.as_deref().map(str::to_lowercase) {
        let matched = first_genre_match(&event_genre, &profile.top_genres)
            .map(|g| (g, GenreSource::Top))
            .or_else(|| {
                first_genre_match(&event_genre, &profile.recent_genres)
                    .map(|g| (g, GenreSource::Recent))
            });
        if let Some((genre, source)) = matched {
            score += GENRE_MATCH_FACTOR * (genre.weight.max(0.0) / 10.0);
            genre_reason = Some(match source {
                GenreSource::Top => format!("Matches your top genre: {}", genre.genre),
                GenreSource::Recent => {
                    format!("Matches a genre you've been playing lately: {}", genre.genre)
                }
            });
        }
    }

    let event_name = event.name.to_lowercase();
    let artist = profile.top_artists.iter().find(|a| {
        let token = a.name.trim().to_lowercase();
        !token.is_empty() && event_name.contains(&token)
    });
    if let Some(artist) = artist {
        score += ARTIST_MATCH_FACTOR * (artist.weight.max(0.0) / 10.0);
        artist_reason = Some(format!("Because you listen to {}", artist.name));
    }

    ScoredEvent {
        event: event.clone(),
        relevance_score: score,
        personal_reason: artist_reason.or(genre_reason),
    }
}

fn sort_descending(scored: &mut [ScoredEvent]) {
    scored.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
}

/// Taste-score every event and sort by score descending
pub fn rank_by_taste(events: &[Event], profile: &TasteProfile) -> Vec<ScoredEvent> {
    let mut scored: Vec<ScoredEvent> = events.iter().map(|e| taste_score(e, profile)).collect();
    sort_descending(&mut scored);
    scored
}

fn mood_text(event: &Event) -> String {
    format!(
        "{} {} {}",
        event.name,
        event.description.as_deref().unwrap_or(""),
        event.genre.as_deref().unwrap_or("")
    )
    .to_lowercase()
}

/// Mood keywords found in the event's name, description and genre
pub fn mood_matches(event: &Event, mood: Mood) -> Vec<&'static str> {
    let text = mood_text(event);
    mood.target()
        .keywords
        .iter()
        .copied()
        .filter(|k| text.contains(k))
        .collect()
}

/// `min(hits / 3, 1)`: zero hits score 0, three or more saturate at 1
pub fn mood_score(event: &Event, mood: Mood) -> f64 {
    let hits = mood_matches(event, mood).len() as f64;
    (hits / MOOD_SATURATION_HITS).min(1.0)
}

/// Mood-score every event, drop zero scores, sort descending
pub fn rank_by_mood(events: &[Event], mood: Mood) -> Vec<ScoredEvent> {
    let mut scored: Vec<ScoredEvent> = events
        .iter()
        .filter_map(|event| {
            let matches = mood_matches(event, mood);
            if matches.is_empty() {
                return None;
            }
            let score = (matches.len() as f64 / MOOD_SATURATION_HITS).min(1.0);
            Some(ScoredEvent {
                event: event.clone(),
                relevance_score: score,
                personal_reason: Some(format!(
                    "{} vibe: {}",
                    mood.target().label,
                    matches.join(", ")
                )),
            })
        })
        .collect();
    sort_descending(&mut scored);
    scored
}

/// Bidirectional substring test between a listener genre and a mood genre
fn genres_overlap(user_genre: &str, mood_genre: &str) -> bool {
    !user_genre.is_empty() && (user_genre.contains(mood_genre) || mood_genre.contains(user_genre))
}

/// Listener genres (top and recent) that overlap the mood's genre seeds
pub fn overlapping_genres(profile: &TasteProfile, mood: Mood) -> Vec<String> {
    let mut matched: Vec<String> = Vec::new();
    for g in profile.top_genres.iter().chain(profile.recent_genres.iter()) {
        let user_genre = g.genre.trim().to_lowercase();
        let hit = mood
            .target()
            .genres
            .iter()
            .any(|mood_genre| genres_overlap(&user_genre, mood_genre));
        if hit && !matched.contains(&user_genre) {
            matched.push(user_genre);
        }
    }
    matched
}

/// Moods with at least one genre overlap, in catalog order
pub fn recommended_moods(profile: &TasteProfile) -> Vec<Mood> {
    Mood::ALL
        .into_iter()
        .filter(|mood| !overlapping_genres(profile, *mood).is_empty())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodRecommendation {
    pub mood: Mood,
    pub label: &'static str,
    pub matched_genres: Vec<String>,
    pub events: Vec<ScoredEvent>,
}

/// Recommended moods with the top five mood-scored events for each
pub fn recommend_moods(profile: &TasteProfile, events: &[Event]) -> Vec<MoodRecommendation> {
    Mood::ALL
        .into_iter()
        .filter_map(|mood| {
            let matched_genres = overlapping_genres(profile, mood);
            if matched_genres.is_empty() {
                return None;
            }
            let mut ranked = rank_by_mood(events, mood);
            ranked.truncate(TOP_EVENTS_PER_MOOD);
            Some(MoodRecommendation {
                mood,
                label: mood.target().label,
                matched_genres,
                events: ranked,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::ArtistWeight;
    use chrono::{TimeZone, Utc};

    fn event(name: &str, genre: Option<&str>) -> Event {
        let date = Utc.with_ymd_and_hms(2025, 10, 3, 20, 0, 0).unwrap();
        let mut e = Event::new(name, "The Dawson", date, "test");
        e.genre = genre.map(str::to_string);
        e
    }

    fn profile(genres: &[(&str, f64)], artists: &[(&str, f64)]) -> TasteProfile {
        let mut p = TasteProfile::new("u1");
        p.top_genres = genres
            .iter()
            .map(|(g, w)| GenreWeight {
                genre: g.to_string(),
                weight: *w,
            })
            .collect();
        p.top_artists = artists
            .iter()
            .map(|(a, w)| ArtistWeight {
                name: a.to_string(),
                weight: *w,
            })
            .collect();
        p
    }

    #[test]
    fn test_jazz_night_scores_four() {
        let p = profile(&[("Jazz", 10.0)], &[]);
        let scored = taste_score(&event("Jazz Night @ The Dawson", Some("Jazz")), &p);
        assert!((scored.relevance_score - 4.0).abs() < 1e-9);
        let reason = scored.personal_reason.unwrap();
        assert!(reason.contains("genre"));
        assert!(reason.contains("Jazz"));
    }

    #[test]
    fn test_no_overlap_keeps_base_score() {
        let p = profile(&[("metal", 10.0)], &[("Slayer", 10.0)]);
        let scored = taste_score(&event("Quiet Evening", Some("folk")), &p);
        assert_eq!(scored.relevance_score, BASE_TASTE_SCORE);
        assert!(scored.personal_reason.is_none());
    }

    #[test]
    fn test_first_matching_genre_wins() {
        // "indie rock" contains both; only the first listed genre counts
        let p = profile(&[("rock", 2.0), ("indie", 10.0)], &[]);
        let scored = taste_score(&event("Show", Some("Indie Rock")), &p);
        assert!((scored.relevance_score - (1.0 + 3.0 * 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_recent_genres_only_when_top_misses() {
        let mut p = profile(&[("jazz", 10.0)], &[]);
        p.recent_genres = vec![GenreWeight {
            genre: "punk".into(),
            weight: 5.0,
        }];

        let punk = taste_score(&event("Show", Some("punk")), &p);
        assert!((punk.relevance_score - 2.5).abs() < 1e-9);
        assert!(punk.personal_reason.unwrap().contains("lately"));

        p.recent_genres[0].genre = "jazz".into();
        p.recent_genres[0].weight = 100.0;
        let jazz = taste_score(&event("Show", Some("jazz")), &p);
        assert!((jazz.relevance_score - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_artist_and_genre_are_additive() {
        let p = profile(&[("rock", 10.0)], &[("Alvvays", 10.0)]);
        let genre_only = taste_score(&event("Local Openers", Some("rock")), &p);
        let both = taste_score(&event("Alvvays with Local Openers", Some("rock")), &p);
        assert!((both.relevance_score - 9.0).abs() < 1e-9);
        assert!(both.relevance_score > genre_only.relevance_score);
        assert_eq!(
            both.personal_reason.as_deref(),
            Some("Because you listen to Alvvays")
        );
    }

    #[test]
    fn test_genre_match_beats_no_match() {
        let p = profile(&[("soul", 4.0)], &[]);
        let hit = taste_score(&event("Show", Some("Neo Soul")), &p);
        let miss = taste_score(&event("Show", Some("Country")), &p);
        assert!(hit.relevance_score > miss.relevance_score);
    }

    #[test]
    fn test_rank_by_taste_is_stable_on_ties() {
        let p = profile(&[("jazz", 10.0)], &[]);
        let events = vec![
            event("First", Some("folk")),
            event("Jazz Trio", Some("jazz")),
            event("Second", Some("folk")),
        ];
        let ranked = rank_by_taste(&events, &p);
        let names: Vec<&str> = ranked.iter().map(|s| s.event.name.as_str()).collect();
        assert_eq!(names, vec!["Jazz Trio", "First", "Second"]);
    }

    #[test]
    fn test_mood_score_scales_and_saturates() {
        let none = event("Poetry Reading", None);
        assert_eq!(mood_score(&none, Mood::Party), 0.0);

        let one = event("Latin Night", None);
        assert!((mood_score(&one, Mood::Party) - 1.0 / 3.0).abs() < 1e-9);

        let two = event("DJ spinning dance and electronic hits", None);
        assert!((mood_score(&two, Mood::Party) - 2.0 / 3.0).abs() < 1e-9);

        let mut many = event("Dance party", Some("hip-hop"));
        many.description = Some("electronic, latin and reggaeton".into());
        assert_eq!(mood_score(&many, Mood::Party), 1.0);
    }

    #[test]
    fn test_rank_by_mood_drops_zero_scores() {
        let events = vec![
            event("Spoken Word", None),
            event("Latin Night", None),
            event("DJ spinning dance and electronic hits", None),
        ];
        let ranked = rank_by_mood(&events, Mood::Party);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].event.name, "DJ spinning dance and electronic hits");
        assert!(ranked.iter().all(|s| s.relevance_score > 0.0));
    }

    #[test]
    fn test_recommended_moods_bidirectional_overlap() {
        // "hip-hop" equals a party seed; "neo-soul" contains the seed "soul"
        let mut p = profile(&[("hip-hop", 8.0)], &[]);
        p.recent_genres = vec![GenreWeight {
            genre: "neo-soul".into(),
            weight: 3.0,
        }];
        let moods = recommended_moods(&p);
        assert!(moods.contains(&Mood::Party));
        assert!(moods.contains(&Mood::Upbeat));
        assert!(moods.contains(&Mood::Romantic));
        assert!(!moods.contains(&Mood::Focused));
    }

    #[test]
    fn test_recommend_moods_caps_events() {
        let p = profile(&[("electronic", 8.0)], &[]);
        let events: Vec<Event> = (0..8)
            .map(|i| event(&format!("Dance Night {}", i), Some("electronic")))
            .collect();
        let recs = recommend_moods(&p, &events);
        let party = recs.iter().find(|r| r.mood == Mood::Party).unwrap();
        assert_eq!(party.events.len(), TOP_EVENTS_PER_MOOD);
        assert_eq!(party.matched_genres, vec!["electronic".to_string()]);
    }
}
