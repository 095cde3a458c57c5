//! TMDB (The Movie Database) catalog client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use marquee_core::types::MediaType;
use serde_json::Value;
use tracing::debug;

use crate::provider::CatalogProvider;
use crate::{
    CastMember, CatalogError, DiscoverFilter, EpisodeInfo, Genre, ListCategory, MediaDetails,
    MediaSummary, Page, SeasonDetails, SeasonSummary, TimeWindow, Video,
};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

pub struct TmdbClient {
    api_key: String,
    base_url: String,
    images: ImageUrls,
    client: reqwest::Client,
}

/// Builds sized image URLs from TMDb file paths.
#[derive(Debug, Clone)]
struct ImageUrls {
    base: String,
}

impl ImageUrls {
    fn url(&self, size: &str, path: Option<&str>) -> Option<String> {
        path.filter(|p| !p.is_empty())
            .map(|p| format!("{}/{size}{p}", self.base))
    }

    fn poster(&self, v: &Value) -> Option<String> {
        self.url("w500", v["poster_path"].as_str())
    }

    fn backdrop(&self, v: &Value) -> Option<String> {
        self.url("original", v["backdrop_path"].as_str())
    }
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_urls(api_key, DEFAULT_BASE_URL, DEFAULT_IMAGE_BASE)
    }

    pub fn with_base_urls(api_key: String, base_url: &str, image_base: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            images: ImageUrls {
                base: image_base.trim_end_matches('/').to_string(),
            },
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, CatalogError> {
        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(CatalogError::Provider(format!(
                "TMDB returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| CatalogError::Provider(format!("parse JSON: {e}")))
    }

    async fn get_page(
        &self,
        path: &str,
        params: &[(&str, &str)],
        page: u32,
        media: Option<MediaType>,
    ) -> Result<Page<MediaSummary>, CatalogError> {
        let page_str = crate::clamp_page(Some(page)).to_string();
        let mut all_params = vec![("page", page_str.as_str())];
        all_params.extend_from_slice(params);
        let data = self.get_json(path, &all_params).await?;
        Ok(parse_page(&data, media, &self.images))
    }
}

#[async_trait::async_trait]
impl CatalogProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn trending(
        &self,
        media: Option<MediaType>,
        window: TimeWindow,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError> {
        let scope = media.map(MediaType::as_str).unwrap_or("all");
        self.get_page(&format!("/trending/{scope}/{}", window.as_str()), &[], page, media)
            .await
    }

    async fn list(
        &self,
        media: MediaType,
        category: ListCategory,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError> {
        if !category.supports(media) {
            return Err(CatalogError::Invalid(format!(
                "{} is not available for {media}",
                category.as_str()
            )));
        }
        self.get_page(&format!("/{media}/{}", category.as_str()), &[], page, Some(media))
            .await
    }

    async fn search(
        &self,
        query: &str,
        media: Option<MediaType>,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError> {
        let scope = media.map(MediaType::as_str).unwrap_or("multi");
        self.get_page(
            &format!("/search/{scope}"),
            &[("query", query), ("include_adult", "false")],
            page,
            media,
        )
        .await
    }

    async fn details(
        &self,
        media: MediaType,
        tmdb_id: i64,
    ) -> Result<MediaDetails, CatalogError> {
        let data = self
            .get_json(
                &format!("/{media}/{tmdb_id}"),
                &[("append_to_response", "credits,videos")],
            )
            .await?;

        Ok(parse_details(&data, media, &self.images))
    }

    async fn season(&self, tv_id: i64, season_number: i32) -> Result<SeasonDetails, CatalogError> {
        let data = self
            .get_json(&format!("/tv/{tv_id}/season/{season_number}"), &[])
            .await?;

        Ok(parse_season(&data, tv_id, season_number, &self.images))
    }

    async fn genres(&self, media: MediaType) -> Result<Vec<Genre>, CatalogError> {
        let data = self.get_json(&format!("/genre/{media}/list"), &[]).await?;
        Ok(parse_genres(&data["genres"]))
    }

    async fn discover(
        &self,
        media: MediaType,
        filter: &DiscoverFilter,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError> {
        let separator = if filter.match_any_genre { "|" } else { "," };
        let genres = filter
            .genre_ids
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(separator);
        let year = filter.year.map(|y| y.to_string());
        let year_param = match media {
            MediaType::Movie => "primary_release_year",
            MediaType::Tv => "first_air_date_year",
        };

        let mut params = vec![("include_adult", "false")];
        if !genres.is_empty() {
            params.push(("with_genres", genres.as_str()));
        }
        if let Some(ref y) = year {
            params.push((year_param, y));
        }
        if let Some(sort) = filter.sort_by {
            params.push(("sort_by", sort.as_str()));
        }

        self.get_page(&format!("/discover/{media}"), &params, page, Some(media))
            .await
    }

    async fn similar(
        &self,
        media: MediaType,
        tmdb_id: i64,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError> {
        self.get_page(&format!("/{media}/{tmdb_id}/similar"), &[], page, Some(media))
            .await
    }
}

fn parse_page(data: &Value, media: Option<MediaType>, images: &ImageUrls) -> Page<MediaSummary> {
    let results = data["results"]
        .as_array()
        .map(|rs| {
            rs.iter()
                .filter_map(|r| parse_summary(r, media, images))
                .collect()
        })
        .unwrap_or_default();

    Page {
        page: data["page"].as_u64().unwrap_or(1) as u32,
        total_pages: data["total_pages"].as_u64().unwrap_or(0) as u32,
        total_results: data["total_results"].as_u64().unwrap_or(0),
        results,
    }
}

/// Parse a list entry. Movies carry `title`/`release_date`, series `name`/`first_air_date`.
/// Mixed endpoints tag each entry with `media_type`; people are skipped.
fn parse_summary(
    r: &Value,
    media: Option<MediaType>,
    images: &ImageUrls,
) -> Option<MediaSummary> {
    let media_type = match media {
        Some(m) => m,
        None => MediaType::parse(r["media_type"].as_str()?)?,
    };
    let tmdb_id = r["id"].as_i64()?;

    let (title_key, date_key) = match media_type {
        MediaType::Movie => ("title", "release_date"),
        MediaType::Tv => ("name", "first_air_date"),
    };

    Some(MediaSummary {
        tmdb_id,
        media_type,
        title: r[title_key].as_str().unwrap_or("Unknown").to_string(),
        overview: non_empty(&r["overview"]),
        poster_url: images.poster(r),
        backdrop_url: images.backdrop(r),
        release_date: non_empty(&r[date_key]),
        vote_average: r["vote_average"].as_f64(),
        genre_ids: r["genre_ids"]
            .as_array()
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default(),
    })
}

fn parse_details(data: &Value, media: MediaType, images: &ImageUrls) -> MediaDetails {
    let is_movie = media == MediaType::Movie;
    let (title_key, original_key, date_key) = if is_movie {
        ("title", "original_title", "release_date")
    } else {
        ("name", "original_name", "first_air_date")
    };

    let runtime_minutes = if is_movie {
        data["runtime"].as_i64().map(|r| r as i32)
    } else {
        data["episode_run_time"]
            .as_array()
            .and_then(|a| a.first())
            .and_then(Value::as_i64)
            .map(|r| r as i32)
    };

    let directors = if is_movie {
        data["credits"]["crew"]
            .as_array()
            .map(|crew| {
                crew.iter()
                    .filter(|p| p["job"].as_str() == Some("Director"))
                    .filter_map(|p| p["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        data["created_by"]
            .as_array()
            .map(|cs| {
                cs.iter()
                    .filter_map(|c| c["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    };

    let cast = data["credits"]["cast"]
        .as_array()
        .map(|cast| {
            cast.iter()
                .take(20)
                .map(|p| CastMember {
                    name: p["name"].as_str().unwrap_or("").to_string(),
                    character: non_empty(&p["character"]),
                    profile_url: images.url("w185", p["profile_path"].as_str()),
                })
                .collect()
        })
        .unwrap_or_default();

    let seasons = data["seasons"]
        .as_array()
        .map(|ss| {
            ss.iter()
                .map(|s| SeasonSummary {
                    season_number: s["season_number"].as_i64().unwrap_or(0) as i32,
                    name: non_empty(&s["name"]),
                    episode_count: s["episode_count"].as_i64().map(|c| c as i32),
                    air_date: non_empty(&s["air_date"]),
                    poster_url: images.poster(s),
                })
                .collect()
        })
        .unwrap_or_default();

    MediaDetails {
        tmdb_id: data["id"].as_i64().unwrap_or(0),
        media_type: media,
        title: data[title_key].as_str().unwrap_or("Unknown").to_string(),
        original_title: non_empty(&data[original_key]),
        tagline: non_empty(&data["tagline"]),
        overview: non_empty(&data["overview"]),
        genres: parse_genres(&data["genres"]),
        runtime_minutes,
        release_date: non_empty(&data[date_key]),
        end_date: if is_movie {
            None
        } else {
            non_empty(&data["last_air_date"])
        },
        status: non_empty(&data["status"]),
        vote_average: data["vote_average"].as_f64(),
        vote_count: data["vote_count"].as_i64(),
        poster_url: images.poster(data),
        backdrop_url: images.backdrop(data),
        poster_path: non_empty(&data["poster_path"]),
        backdrop_path: non_empty(&data["backdrop_path"]),
        cast,
        directors,
        number_of_seasons: data["number_of_seasons"].as_i64().map(|n| n as i32),
        seasons,
        videos: parse_videos(&data["videos"]),
    }
}

/// Keep YouTube trailers and teasers only; trailers sort first.
fn parse_videos(videos: &Value) -> Vec<Video> {
    let mut out: Vec<Video> = videos["results"]
        .as_array()
        .map(|vs| {
            vs.iter()
                .filter(|v| v["site"].as_str() == Some("YouTube"))
                .filter(|v| matches!(v["type"].as_str(), Some("Trailer") | Some("Teaser")))
                .filter_map(|v| {
                    Some(Video {
                        key: v["key"].as_str()?.to_string(),
                        name: v["name"].as_str().unwrap_or("").to_string(),
                        site: "YouTube".to_string(),
                        kind: v["type"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    out.sort_by_key(|v| v.kind != "Trailer");
    out
}

fn parse_season(
    data: &Value,
    tv_id: i64,
    season_number: i32,
    images: &ImageUrls,
) -> SeasonDetails {
    let episodes = data["episodes"]
        .as_array()
        .map(|eps| {
            eps.iter()
                .map(|ep| EpisodeInfo {
                    season_number: ep["season_number"].as_i64().unwrap_or(season_number as i64)
                        as i32,
                    episode_number: ep["episode_number"].as_i64().unwrap_or(0) as i32,
                    title: non_empty(&ep["name"]),
                    overview: non_empty(&ep["overview"]),
                    air_date: non_empty(&ep["air_date"]),
                    runtime_minutes: ep["runtime"].as_i64().map(|r| r as i32),
                    still_url: images.url("w300", ep["still_path"].as_str()),
                })
                .collect()
        })
        .unwrap_or_default();

    SeasonDetails {
        tv_id,
        season_number,
        name: non_empty(&data["name"]),
        overview: non_empty(&data["overview"]),
        air_date: non_empty(&data["air_date"]),
        poster_url: images.poster(data),
        episodes,
    }
}

fn parse_genres(genres: &Value) -> Vec<Genre> {
    genres
        .as_array()
        .map(|gs| {
            gs.iter()
                .filter_map(|g| {
                    Some(Genre {
                        id: g["id"].as_i64()?,
                        name: g["name"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty(v: &Value) -> Option<String> {
    v.as_str().filter(|s| !s.is_empty()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images() -> ImageUrls {
        ImageUrls {
            base: DEFAULT_IMAGE_BASE.to_string(),
        }
    }

    #[test]
    fn parse_movie_details_from_json() {
        let json = serde_json::json!({
            "id": 27205,
            "title": "Inception",
            "original_title": "Inception",
            "overview": "A thief who steals corporate secrets...",
            "tagline": "Your mind is the scene of the crime.",
            "release_date": "2010-07-16",
            "runtime": 148,
            "vote_average": 8.4,
            "vote_count": 35000,
            "poster_path": "/poster.jpg",
            "backdrop_path": "/backdrop.jpg",
            "genres": [
                { "id": 28, "name": "Action" },
                { "id": 878, "name": "Science Fiction" }
            ],
            "credits": {
                "cast": [
                    { "name": "Leonardo DiCaprio", "character": "Cobb", "profile_path": "/leo.jpg" }
                ],
                "crew": [
                    { "name": "Christopher Nolan", "job": "Director" },
                    { "name": "Hans Zimmer", "job": "Original Music Composer" }
                ]
            },
            "videos": {
                "results": [
                    { "key": "teaser1", "name": "Teaser", "site": "YouTube", "type": "Teaser" },
                    { "key": "vimeo1", "name": "Trailer", "site": "Vimeo", "type": "Trailer" },
                    { "key": "trailer1", "name": "Official Trailer", "site": "YouTube", "type": "Trailer" },
                    { "key": "bts", "name": "Making of", "site": "YouTube", "type": "Featurette" }
                ]
            }
        });

        let d = parse_details(&json, MediaType::Movie, &images());
        assert_eq!(d.tmdb_id, 27205);
        assert_eq!(d.title, "Inception");
        assert_eq!(d.runtime_minutes, Some(148));
        assert_eq!(d.genres.len(), 2);
        assert_eq!(d.directors, ["Christopher Nolan"]);
        assert_eq!(d.cast[0].character.as_deref(), Some("Cobb"));
        assert_eq!(
            d.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/poster.jpg")
        );
        assert_eq!(d.poster_path.as_deref(), Some("/poster.jpg"));

        let keys: Vec<_> = d.videos.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, ["trailer1", "teaser1"]);
    }

    #[test]
    fn parse_series_details_from_json() {
        let json = serde_json::json!({
            "id": 1396,
            "name": "Breaking Bad",
            "original_name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "last_air_date": "2013-09-29",
            "episode_run_time": [45, 47],
            "number_of_seasons": 5,
            "created_by": [{ "name": "Vince Gilligan" }],
            "seasons": [
                { "season_number": 1, "name": "Season 1", "episode_count": 7, "poster_path": "/s1.jpg" }
            ],
            "genres": [{ "id": 18, "name": "Drama" }]
        });

        let d = parse_details(&json, MediaType::Tv, &images());
        assert_eq!(d.title, "Breaking Bad");
        assert_eq!(d.release_date.as_deref(), Some("2008-01-20"));
        assert_eq!(d.end_date.as_deref(), Some("2013-09-29"));
        assert_eq!(d.runtime_minutes, Some(45));
        assert_eq!(d.directors, ["Vince Gilligan"]);
        assert_eq!(d.seasons[0].episode_count, Some(7));
        assert!(d.videos.is_empty());
    }

    #[test]
    fn multi_search_page_skips_people() {
        let json = serde_json::json!({
            "page": 1,
            "total_pages": 3,
            "total_results": 55,
            "results": [
                { "id": 1, "media_type": "movie", "title": "Alien", "release_date": "1979-05-25", "genre_ids": [27, 878] },
                { "id": 2, "media_type": "person", "name": "Sigourney Weaver" },
                { "id": 3, "media_type": "tv", "name": "Alien: Earth", "first_air_date": "" }
            ]
        });

        let page = parse_page(&json, None, &images());
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_results, 55);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].genre_ids, [27, 878]);
        assert_eq!(page.results[1].media_type, MediaType::Tv);
        assert_eq!(page.results[1].release_date, None);
    }

    #[test]
    fn parse_season_episodes() {
        let json = serde_json::json!({
            "name": "Season 1",
            "episodes": [
                { "episode_number": 1, "season_number": 1, "name": "Pilot", "runtime": 58, "still_path": "/e1.jpg" },
                { "episode_number": 2, "name": "Cat's in the Bag..." }
            ]
        });

        let s = parse_season(&json, 1396, 1, &images());
        assert_eq!(s.episodes.len(), 2);
        assert_eq!(s.episodes[1].season_number, 1);
        assert_eq!(
            s.episodes[0].still_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w300/e1.jpg")
        );
    }
}
