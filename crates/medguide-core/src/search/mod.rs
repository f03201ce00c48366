//! Web search/scrape upstream used to enrich medicine names.

pub(crate) mod firecrawl;
pub(crate) mod provider;

pub use provider::{create_search_provider, SearchHit, SearchProvider, SearchRequest};
