//! Business operations of the back office, one service per admin area.
//!
//! Services own their database handle and expose typed inputs and fully
//! populated aggregates. Shared capabilities of the admin screens are modelled
//! as traits: [`Deletable`] (preview then delete), [`Orderable`] (rewrite display
//! order) and [`Searchable`] (paged search).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

pub mod accounts;
pub mod catalogs;
pub mod categories;
pub mod geography;
pub mod images;
pub mod invoices;
pub mod items;
pub mod orders;
pub mod pricing;
pub mod products;
pub mod reports;

/// What a delete would do, shown to staff before they confirm it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteSummary {
    pub entries: Vec<DeleteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteEntry {
    pub id: i32,
    pub title: String,
    pub deletable: bool,
    pub message: String,
}

impl DeleteSummary {
    pub fn deletable_ids(&self) -> Vec<i32> {
        self.entries
            .iter()
            .filter(|e| e.deletable)
            .map(|e| e.id)
            .collect()
    }
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[async_trait]
pub trait Deletable {
    /// Describes dependencies of the given rows without changing anything.
    async fn delete_summary(&self, ids: &[i32]) -> Result<DeleteSummary, ServiceError>;

    /// Deletes what the summary allows; returns the number of rows removed.
    async fn delete(&self, ids: &[i32]) -> Result<usize, ServiceError>;
}

#[async_trait]
pub trait Orderable {
    /// Rewrites `displayorder` of the children of `parent` to follow `ordered_ids`.
    async fn reorder(&self, parent: Option<i32>, ordered_ids: &[i32]) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait Searchable {
    type Query: Send + Sync + 'static;
    type Item: Send;

    async fn search(
        &self,
        query: Self::Query,
        page: u64,
        per_page: u64,
    ) -> Result<Page<Self::Item>, ServiceError>;
}

/// Rejects a reorder request that is not a permutation of the current children.
pub(crate) fn check_permutation(current: &[i32], ordered_ids: &[i32]) -> Result<(), ServiceError> {
    let mut a = current.to_vec();
    let mut b = ordered_ids.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    if a != b {
        return Err(ServiceError::ValidationError(
            "Order must list every child exactly once".to_string(),
        ));
    }
    Ok(())
}

/// Offset for a 1-based page number.
pub(crate) fn page_offset(page: u64, per_page: u64) -> u64 {
    page.saturating_sub(1) * per_page
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::FieldErrors(vec![
            crate::errors::FieldError::new(field, format!("{} is required", field)),
        ]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_check() {
        assert!(check_permutation(&[1, 2, 3], &[3, 1, 2]).is_ok());
        assert!(check_permutation(&[1, 2, 3], &[3, 1]).is_err());
        assert!(check_permutation(&[1, 2], &[1, 1]).is_err());
    }

    #[test]
    fn offsets_are_one_based() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }
}
