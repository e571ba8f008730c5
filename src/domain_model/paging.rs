use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageSize(pub u16);

/// Monotone page index; the next page the paginator will request.
#[derive(
    Debug, Clone, Copy, Default, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct PageCursor(pub u64);

impl PageCursor {
    pub fn advance(self) -> Self {
        PageCursor(self.0 + 1)
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageCursor {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let page = s.parse::<u64>().map_err(|e| e.to_string())?;
        Ok(Self(page))
    }
}

/// Snapshot of one paginated list. Published whole on every transition;
/// subscribers never see partially applied updates.
#[derive(Debug, Clone)]
pub struct PagingState<T> {
    pub items: Vec<T>,
    pub is_loading: bool,
    /// Sticky: once a short page is observed this never goes back to
    /// false except through reset().
    pub end_reached: bool,
    pub cursor: PageCursor,
}

impl<T> Default for PagingState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            end_reached: false,
            cursor: PageCursor::default(),
        }
    }
}
