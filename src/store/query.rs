// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Validated list queries.
//!
//! The accepted parameter values are declared as data ([`SortField::ALL`],
//! [`SortDirection::LITERALS`]) and checked once in [`CountryQuery::parse`],
//! before anything touches the cache or the store. Adapters only ever see a
//! query that already passed validation.
//!
//! ```
//! use country_service::store::{CountryQuery, SortDirection, SortField};
//!
//! let q = CountryQuery::parse(Some("10"), Some("population"), Some("-1")).unwrap();
//! assert_eq!(q.limit(), Some(10));
//! assert_eq!(q.sort_by(), SortField::Population);
//! assert_eq!(q.order(), SortDirection::Desc);
//!
//! assert!(CountryQuery::parse(Some("0"), None, None).is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::record::CountryRecord;

/// Declared attribute set of [`CountryRecord`] that lists may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Name,
    Region,
    Population,
    Area,
    PopulationDensity,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::Name,
        SortField::Region,
        SortField::Population,
        SortField::Area,
        SortField::PopulationDensity,
    ];

    /// Canonical attribute name, also the column name in SQL.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Region => "region",
            Self::Population => "population",
            Self::Area => "area",
            Self::PopulationDensity => "population_density",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Name => &["name", "country_name"],
            Self::Region => &["region"],
            Self::Population => &["population"],
            Self::Area => &["area"],
            Self::PopulationDensity => &["population_density"],
        }
    }

    fn allowed() -> String {
        Self::ALL.iter().map(|f| f.as_str()).collect::<Vec<_>>().join(", ")
    }

    /// Total order of two records on this field (name as tie-breaker).
    #[must_use]
    pub fn compare(self, a: &CountryRecord, b: &CountryRecord) -> std::cmp::Ordering {
        let primary = match self {
            Self::Name => a.name.cmp(&b.name),
            Self::Region => a.region.cmp(&b.region),
            Self::Population => a.population.cmp(&b.population),
            Self::Area => a.area.total_cmp(&b.area),
            Self::PopulationDensity => a.population_density.total_cmp(&b.population_density),
        };
        primary.then_with(|| a.name.cmp(&b.name))
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.aliases().contains(&s))
            .ok_or_else(|| ValidationError::InvalidSortField {
                field: s.to_string(),
                allowed: Self::allowed(),
            })
    }
}

/// Sort direction. Both literal encodings in circulation (`asc`/`desc` and
/// `1`/`-1`) parse into this one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const LITERALS: [(&'static str, SortDirection); 4] = [
        ("asc", SortDirection::Asc),
        ("1", SortDirection::Asc),
        ("desc", SortDirection::Desc),
        ("-1", SortDirection::Desc),
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::LITERALS
            .iter()
            .find(|(literal, _)| *literal == s)
            .map(|(_, dir)| *dir)
            .ok_or_else(|| ValidationError::InvalidSortOrder {
                order: s.to_string(),
                allowed: Self::LITERALS.iter().map(|(l, _)| *l).collect::<Vec<_>>().join(", "),
            })
    }
}

/// A list query that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CountryQuery {
    limit: Option<u32>,
    sort_by: SortField,
    order: SortDirection,
}

impl Default for CountryQuery {
    fn default() -> Self {
        Self { limit: None, sort_by: SortField::Name, order: SortDirection::Asc }
    }
}

impl CountryQuery {
    /// Build from already-typed values. `limit` must be positive when present.
    pub fn new(limit: Option<i64>, sort_by: SortField, order: SortDirection) -> Result<Self, ValidationError> {
        let limit = match limit {
            None => None,
            Some(n) if n >= 1 && n <= i64::from(u32::MAX) => Some(n as u32),
            Some(n) => return Err(ValidationError::InvalidLimit(n.to_string())),
        };
        Ok(Self { limit, sort_by, order })
    }

    /// Parse raw request parameters. Absent values fall back to
    /// `limit=None`, `sort_by=name`, `order=asc`.
    pub fn parse(
        limit: Option<&str>,
        sort_by: Option<&str>,
        order: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let limit = limit
            .map(|raw| {
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| ValidationError::InvalidLimit(raw.to_string()))
            })
            .transpose()?;
        let sort_by = sort_by.map(str::parse::<SortField>).transpose()?.unwrap_or(SortField::Name);
        let order = order.map(str::parse::<SortDirection>).transpose()?.unwrap_or(SortDirection::Asc);
        Self::new(limit, sort_by, order)
    }

    #[must_use]
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub fn sort_by(&self) -> SortField {
        self.sort_by
    }

    #[must_use]
    pub fn order(&self) -> SortDirection {
        self.order
    }

    /// Sort and truncate an in-memory list according to this query.
    pub fn apply(&self, records: &mut Vec<CountryRecord>) {
        records.sort_by(|a, b| {
            let ord = self.sort_by.compare(a, b);
            match self.order {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        if let Some(limit) = self.limit {
            records.truncate(limit as usize);
        }
    }
}
