use marquee_core::types::MediaType;

use crate::{
    CatalogError, DiscoverFilter, Genre, ListCategory, MediaDetails, MediaSummary, Page,
    SeasonDetails, TimeWindow,
};

/// A read-only source of movie/TV metadata.
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Trending titles. `None` mixes movies and series.
    async fn trending(
        &self,
        media: Option<MediaType>,
        window: TimeWindow,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError>;

    /// One of the curated lists (popular, top rated, …).
    async fn list(
        &self,
        media: MediaType,
        category: ListCategory,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError>;

    /// Search by title. `None` searches movies and series together.
    async fn search(
        &self,
        query: &str,
        media: Option<MediaType>,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError>;

    async fn details(&self, media: MediaType, tmdb_id: i64)
    -> Result<MediaDetails, CatalogError>;

    async fn season(&self, tv_id: i64, season_number: i32) -> Result<SeasonDetails, CatalogError>;

    async fn genres(&self, media: MediaType) -> Result<Vec<Genre>, CatalogError>;

    async fn discover(
        &self,
        media: MediaType,
        filter: &DiscoverFilter,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError>;

    async fn similar(
        &self,
        media: MediaType,
        tmdb_id: i64,
        page: u32,
    ) -> Result<Page<MediaSummary>, CatalogError>;
}
