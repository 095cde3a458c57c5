//! Mood-based recommendation presets.
//!
//! Movie and TV genre ids differ on TMDb (e.g. Action 28 vs. Action & Adventure
//! 10759), so each mood carries one list per media type. Genres are matched with
//! "any" semantics when discovering.

use marquee_core::types::MediaType;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mood {
    pub slug: &'static str,
    pub label: &'static str,
    #[serde(skip)]
    pub movie_genres: &'static [i64],
    #[serde(skip)]
    pub tv_genres: &'static [i64],
}

impl Mood {
    pub fn genres_for(&self, media: MediaType) -> &'static [i64] {
        match media {
            MediaType::Movie => self.movie_genres,
            MediaType::Tv => self.tv_genres,
        }
    }
}

pub const MOODS: &[Mood] = &[
    Mood {
        slug: "feel-good",
        label: "Feel-good",
        movie_genres: &[35, 10751, 10402],
        tv_genres: &[35, 10751],
    },
    Mood {
        slug: "thrilling",
        label: "Thrilling",
        movie_genres: &[28, 53, 12],
        tv_genres: &[10759, 80],
    },
    Mood {
        slug: "mind-bending",
        label: "Mind-bending",
        movie_genres: &[878, 9648],
        tv_genres: &[10765, 9648],
    },
    Mood {
        slug: "romantic",
        label: "Romantic",
        movie_genres: &[10749],
        tv_genres: &[18, 10766],
    },
    Mood {
        slug: "scary",
        label: "Scary",
        movie_genres: &[27],
        tv_genres: &[9648, 10765],
    },
    Mood {
        slug: "family",
        label: "Family night",
        movie_genres: &[10751, 16],
        tv_genres: &[10751, 10762],
    },
    Mood {
        slug: "documentary",
        label: "Curious",
        movie_genres: &[99],
        tv_genres: &[99],
    },
    Mood {
        slug: "animated",
        label: "Animated",
        movie_genres: &[16],
        tv_genres: &[16],
    },
];

pub fn find(slug: &str) -> Option<&'static Mood> {
    MOODS.iter().find(|m| m.slug.eq_ignore_ascii_case(slug.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find("Scary").map(|m| m.slug), Some("scary"));
        assert_eq!(find(" feel-good ").map(|m| m.slug), Some("feel-good"));
        assert!(find("sleepy").is_none());
    }

    #[test]
    fn every_mood_has_genres_for_both_media_types() {
        for mood in MOODS {
            assert!(!mood.genres_for(MediaType::Movie).is_empty(), "{}", mood.slug);
            assert!(!mood.genres_for(MediaType::Tv).is_empty(), "{}", mood.slug);
        }
    }

    #[test]
    fn tv_uses_tv_genre_ids() {
        let thrilling = find("thrilling").unwrap();
        assert!(thrilling.genres_for(MediaType::Tv).contains(&10759));
        assert!(!thrilling.genres_for(MediaType::Tv).contains(&28));
    }
}
