#![allow(clippy::type_complexity)]
pub mod moods;
pub mod provider;
pub mod tmdb;

use marquee_core::types::MediaType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found")]
    NotFound,
    #[error("invalid request: {0}")]
    Invalid(String),
}

/// TMDb refuses pages beyond 500.
pub const MAX_PAGE: u32 = 500;

pub fn clamp_page(page: Option<u32>) -> u32 {
    page.unwrap_or(1).clamp(1, MAX_PAGE)
}

/// A paged result list, mirroring TMDb's paging fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            total_pages: 0,
            total_results: 0,
            results: Vec::new(),
        }
    }
}

/// A movie or series as it appears in lists and search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
    pub genre_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub character: Option<String>,
    pub profile_url: Option<String>,
}

/// A trailer or teaser hosted on YouTube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub key: String,
    pub name: String,
    pub site: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season_number: i32,
    pub name: Option<String>,
    pub episode_count: Option<i32>,
    pub air_date: Option<String>,
    pub poster_url: Option<String>,
}

/// Full details for a single movie or series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDetails {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub original_title: Option<String>,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub genres: Vec<Genre>,
    pub runtime_minutes: Option<i32>,
    pub release_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub cast: Vec<CastMember>,
    /// Directors for movies, creators for series.
    pub directors: Vec<String>,
    pub number_of_seasons: Option<i32>,
    pub seasons: Vec<SeasonSummary>,
    pub videos: Vec<Video>,
}

/// Episode metadata within a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub season_number: i32,
    pub episode_number: i32,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub still_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonDetails {
    pub tv_id: i64,
    pub season_number: i32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub poster_url: Option<String>,
    pub episodes: Vec<EpisodeInfo>,
}

/// Trending window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Day,
    Week,
}

impl TimeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            _ => None,
        }
    }
}

/// Curated TMDb lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListCategory {
    Popular,
    TopRated,
    Upcoming,
    NowPlaying,
    OnTheAir,
    AiringToday,
}

impl ListCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Popular => "popular",
            Self::TopRated => "top_rated",
            Self::Upcoming => "upcoming",
            Self::NowPlaying => "now_playing",
            Self::OnTheAir => "on_the_air",
            Self::AiringToday => "airing_today",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "popular" => Some(Self::Popular),
            "top_rated" => Some(Self::TopRated),
            "upcoming" => Some(Self::Upcoming),
            "now_playing" => Some(Self::NowPlaying),
            "on_the_air" => Some(Self::OnTheAir),
            "airing_today" => Some(Self::AiringToday),
            _ => None,
        }
    }

    /// Whether TMDb offers this list for the media type.
    pub fn supports(self, media: MediaType) -> bool {
        match self {
            Self::Popular | Self::TopRated => true,
            Self::Upcoming | Self::NowPlaying => media == MediaType::Movie,
            Self::OnTheAir | Self::AiringToday => media == MediaType::Tv,
        }
    }
}

/// Discover ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    PopularityDesc,
    VoteAverageDesc,
    PrimaryReleaseDateDesc,
    FirstAirDateDesc,
}

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PopularityDesc => "popularity.desc",
            Self::VoteAverageDesc => "vote_average.desc",
            Self::PrimaryReleaseDateDesc => "primary_release_date.desc",
            Self::FirstAirDateDesc => "first_air_date.desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "popularity.desc" => Some(Self::PopularityDesc),
            "vote_average.desc" => Some(Self::VoteAverageDesc),
            "primary_release_date.desc" => Some(Self::PrimaryReleaseDateDesc),
            "first_air_date.desc" => Some(Self::FirstAirDateDesc),
            _ => None,
        }
    }

    pub fn supports(self, media: MediaType) -> bool {
        match self {
            Self::PopularityDesc | Self::VoteAverageDesc => true,
            Self::PrimaryReleaseDateDesc => media == MediaType::Movie,
            Self::FirstAirDateDesc => media == MediaType::Tv,
        }
    }
}

/// Discover filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoverFilter {
    pub genre_ids: Vec<i64>,
    /// Match any listed genre instead of all of them.
    pub match_any_genre: bool,
    pub year: Option<i32>,
    pub sort_by: Option<SortBy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_match_media_type() {
        assert!(ListCategory::Upcoming.supports(MediaType::Movie));
        assert!(!ListCategory::Upcoming.supports(MediaType::Tv));
        assert!(ListCategory::AiringToday.supports(MediaType::Tv));
        assert!(ListCategory::Popular.supports(MediaType::Tv));
        assert_eq!(ListCategory::parse("latest"), None);
    }

    #[test]
    fn page_is_clamped_to_tmdb_limits() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(9000)), MAX_PAGE);
    }
}
