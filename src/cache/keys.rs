// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache key builder.
//!
//! Every cache key is produced here. The three namespaces are disjoint by
//! prefix, and ingestion and the read path share [`CacheKey::Country`], so a
//! refresh written by ingestion is what the next reader sees.
//!
//! ```text
//! countries:limit=all:sort_by=name:order_by=asc
//! countries:limit=10:sort_by=population:order_by=desc
//! country:Vali
//! images:Vali
//! ```

use std::fmt;

use crate::store::CountryQuery;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A list query result
    Countries(CountryQuery),
    /// One country by name
    Country(String),
    /// Image list of one country
    Images(String),
}

impl CacheKey {
    pub fn country(name: impl Into<String>) -> Self {
        Self::Country(name.into())
    }

    pub fn images(country: impl Into<String>) -> Self {
        Self::Images(country.into())
    }

    /// Metric label for this key's namespace
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Countries(_) => "countries",
            Self::Country(_) => "country",
            Self::Images(_) => "images",
        }
    }
}

impl From<&CountryQuery> for CacheKey {
    fn from(query: &CountryQuery) -> Self {
        Self::Countries(*query)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Countries(q) => {
                f.write_str("countries:limit=")?;
                match q.limit() {
                    Some(n) => write!(f, "{}", n)?,
                    None => f.write_str("all")?,
                }
                write!(f, ":sort_by={}:order_by={}", q.sort_by(), q.order())
            }
            Self::Country(name) => write!(f, "country:{}", name),
            Self::Images(name) => write!(f, "images:{}", name),
        }
    }
}
