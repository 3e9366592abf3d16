/// Table sorting: `key[:asc|desc]` specs over per-view key sets
use crate::error::{MonitorError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SORT: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "🔼",
            SortDirection::Descending => "🔽",
        }
    }
}

/// Sort keys offered by one table view
pub trait SortKey: Copy + PartialEq + Sized + 'static {
    /// Every accepted key name, `default` first
    const NAMES: &'static [&'static str];

    fn from_name(name: &str) -> Option<Self>;

    fn name(&self) -> &'static str;

    /// The `default` key keeps rows in coins config order
    fn is_default(&self) -> bool;
}

/// Rows expose a numeric value per sort key; `None` means unavailable
pub trait SortValue<K: SortKey> {
    fn sort_value(&self, key: K) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortSpec<K: SortKey> {
    pub key: K,
    pub direction: SortDirection,
}

impl<K: SortKey> SortSpec<K> {
    /// Parse `key`, `key:asc` or `key:desc` (direction defaults to descending)
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (key_part, dir_part) = match trimmed.split_once(':') {
            Some((key, dir)) => (key.trim(), Some(dir.trim())),
            None => (trimmed, None),
        };

        let key_name = if key_part.is_empty() { DEFAULT_SORT } else { key_part };
        let key = K::from_name(&key_name.to_ascii_lowercase()).ok_or_else(|| MonitorError::InvalidSortKey {
            input: input.to_string(),
            reason: format!("unknown key '{}', expected one of: {}", key_name, K::NAMES.join(", ")),
        })?;

        let direction = match dir_part.map(|d| d.to_ascii_lowercase()).as_deref() {
            None | Some("desc") => SortDirection::Descending,
            Some("asc") => SortDirection::Ascending,
            Some(other) => {
                return Err(MonitorError::InvalidSortKey {
                    input: input.to_string(),
                    reason: format!("unknown direction '{}', expected asc or desc", other),
                })
            }
        };

        Ok(Self { key, direction })
    }

    pub fn is_default(&self) -> bool {
        self.key.is_default()
    }

    /// Stable in-place sort. Unavailable values go last in either direction.
    pub fn apply<R: SortValue<K>>(&self, rows: &mut [R]) {
        if self.is_default() {
            return;
        }
        rows.sort_by(|a, b| compare_values(a.sort_value(self.key), b.sort_value(self.key), self.direction));
    }

    /// Footer line, e.g. `🔽 Sorted by: pnl_pct (descending)`
    pub fn describe(&self) -> Option<String> {
        if self.is_default() {
            return None;
        }
        Some(format!(
            "{} Sorted by: {} ({})",
            self.direction.arrow(),
            self.key.name(),
            self.direction.as_str()
        ))
    }
}

impl<K: SortKey> FromStr for SortSpec<K> {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<K: SortKey> fmt::Display for SortSpec<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        write!(f, "{}:{}", self.key.name(), dir)
    }
}

fn compare_values(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
