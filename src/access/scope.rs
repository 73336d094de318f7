use std::num::IntErrorKind;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::{authorized, Action, PermissionSet};
use crate::database::{OwnerFilter, PageWindow};

/// Allowed page-size range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageBounds {
    min: i64,
    max: i64,
}

impl PageBounds {
    pub const DEFAULT_MIN: i64 = 10;
    pub const DEFAULT_MAX: i64 = 500;

    /// `min` is raised to at least 1 and `max` to at least `min`.
    pub fn new(min: i64, max: i64) -> Self {
        let min = min.max(1);
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn clamp(&self, raw: i64) -> i64 {
        raw.clamp(self.min, self.max)
    }
}

impl Default for PageBounds {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN, Self::DEFAULT_MAX)
    }
}

/// Raw pagination query parameters. Kept as strings so junk input degrades
/// to defaults instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageParams {
    pub fn new(page: impl Into<String>, page_size: impl Into<String>) -> Self {
        Self {
            page: Some(page.into()),
            page_size: Some(page_size.into()),
        }
    }
}

// Missing or non-numeric input counts as 0; out-of-range numbers saturate.
fn parse_or_zero(raw: Option<&str>) -> i64 {
    match raw.map(|s| s.trim().parse::<i64>()) {
        Some(Ok(n)) => n,
        Some(Err(e)) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            _ => 0,
        },
        None => 0,
    }
}

/// Pagination window and visible-row predicate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessScope {
    page: i64,
    page_size: i64,
    offset: i64,
    caller: Option<Uuid>,
    has_global_permission: bool,
    owner_filter: OwnerFilter,
}

impl AccessScope {
    pub fn new(
        resource: &str,
        params: &PageParams,
        caller: Option<Uuid>,
        global_resource: bool,
        permissions: &PermissionSet,
        bounds: PageBounds,
    ) -> Self {
        let page_size = bounds.clamp(parse_or_zero(params.page_size.as_deref()));
        let page = parse_or_zero(params.page.as_deref()).max(1);
        let offset = (page - 1).saturating_mul(page_size);

        let has_global_permission = authorized(resource, Action::Global, permissions);
        let owner_filter = if global_resource || has_global_permission {
            OwnerFilter::Unrestricted
        } else {
            match caller {
                Some(id) => OwnerFilter::OwnedBy(id),
                None => OwnerFilter::Nothing,
            }
        };

        Self {
            page,
            page_size,
            offset,
            caller,
            has_global_permission,
            owner_filter,
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            limit: self.page_size,
            offset: self.offset,
        }
    }

    pub fn owner_filter(&self) -> OwnerFilter {
        self.owner_filter
    }

    pub fn caller_id(&self) -> Option<Uuid> {
        self.caller
    }

    pub fn has_global_permission(&self) -> bool {
        self.has_global_permission
    }
}
