//! Display-time ordering of accumulated search results

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::github::RepositoryItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    #[default]
    Stars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Returns the items ordered for display; the input is left untouched
///
/// Names compare case-insensitively, stars numerically. Ties keep their
/// accumulated order.
pub fn sorted(items: &[RepositoryItem], key: SortKey, order: SortOrder) -> Vec<RepositoryItem> {
    let mut view = items.to_vec();
    view.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    view
}

fn compare(a: &RepositoryItem, b: &RepositoryItem, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Stars => a.stargazers_count.cmp(&b.stargazers_count),
    }
}
