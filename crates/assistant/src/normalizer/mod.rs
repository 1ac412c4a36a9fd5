//! Input normalization: URL enrichment and image preparation.

pub mod image;
pub mod url;

pub use self::image::{normalize_image, NormalizedImage};
pub use self::url::{ExtractionFailure, HttpFetcher, PageExtractor, PageFetcher, UrlEnricher};
