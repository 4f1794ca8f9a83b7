//! Sales reports and the weekly order chart.
//!
//! Totals are aggregated in Rust over the fetched order rows so the same code
//! runs on Postgres and SQLite. Cancelled orders never count.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::entities::{locale, order, region};
use crate::errors::ServiceError;

/// Twelve monthly totals and their sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyTotals {
    #[schema(value_type = Vec<String>)]
    pub months: Vec<Decimal>,
    #[schema(value_type = String)]
    pub total: Decimal,
}

impl MonthlyTotals {
    fn zero() -> Self {
        Self {
            months: vec![Decimal::ZERO; 12],
            total: Decimal::ZERO,
        }
    }

    fn add(&mut self, month: u32, amount: Decimal) {
        if let Some(slot) = self.months.get_mut(month.saturating_sub(1) as usize) {
            *slot += amount;
            self.total += amount;
        }
    }

    fn merge(&mut self, other: &MonthlyTotals) {
        for (slot, amount) in self.months.iter_mut().zip(&other.months) {
            *slot += *amount;
        }
        self.total += other.total;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionSales {
    pub region: i32,
    pub title: String,
    pub sales: MonthlyTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SalesByRegion {
    pub year: i32,
    pub regions: Vec<RegionSales>,
    pub totals: MonthlyTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct YearSales {
    pub year: i32,
    pub sales: MonthlyTotals,
}

/// Buckets daily order totals into weeks of seven days starting at day 1.
///
/// There is one bucket per week up to and including the week holding `doy`;
/// each bucket sums every day of its range. With `remove_current_week` the
/// bucket holding `doy` is dropped.
pub fn chart_data(daily: &BTreeMap<u32, Decimal>, doy: u32, remove_current_week: bool) -> Vec<Decimal> {
    if doy == 0 {
        return Vec::new();
    }
    let weeks = ((doy - 1) / 7 + 1) as usize;
    let mut buckets = vec![Decimal::ZERO; weeks];
    for (&day, &amount) in daily.range(1..=(weeks as u32 * 7)) {
        buckets[((day - 1) / 7) as usize] += amount;
    }
    if remove_current_week {
        buckets.pop();
    }
    buckets
}

fn year_bounds(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    let midnight = |y: i32| {
        NaiveDate::from_ymd_opt(y, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    };
    match (midnight(year), midnight(year + 1)) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(ServiceError::ValidationError(format!(
            "{} is not a reportable year",
            year
        ))),
    }
}

/// Read-only sales reporting
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn orders_in_year(&self, year: i32) -> Result<Vec<order::Model>, ServiceError> {
        let (start, end) = year_bounds(year)?;
        Ok(order::Entity::find()
            .filter(order::Column::Createdate.gte(start))
            .filter(order::Column::Createdate.lt(end))
            .filter(order::Column::CancelDate.is_null())
            .order_by_asc(order::Column::Createdate)
            .all(&*self.db)
            .await?)
    }

    /// Monthly sales per region for one year, with a totals row. Every region
    /// is listed even without sales.
    #[instrument(skip(self))]
    pub async fn sales_by_region(&self, year: i32) -> Result<SalesByRegion, ServiceError> {
        let orders = self.orders_in_year(year).await?;
        let regions = region::Entity::find()
            .order_by_asc(region::Column::Title)
            .all(&*self.db)
            .await?;
        let locale_regions: HashMap<String, i32> = locale::Entity::find()
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|l| (l.id, l.region))
            .collect();

        let mut per_region: HashMap<i32, MonthlyTotals> = HashMap::new();
        for order in &orders {
            if let Some(region_id) = locale_regions.get(&order.locale) {
                per_region
                    .entry(*region_id)
                    .or_insert_with(MonthlyTotals::zero)
                    .add(order.createdate.month(), order.total);
            }
        }

        let mut totals = MonthlyTotals::zero();
        let regions = regions
            .into_iter()
            .map(|r| {
                let sales = per_region.remove(&r.id).unwrap_or_else(MonthlyTotals::zero);
                totals.merge(&sales);
                RegionSales {
                    region: r.id,
                    title: r.title,
                    sales,
                }
            })
            .collect();

        Ok(SalesByRegion {
            year,
            regions,
            totals,
        })
    }

    /// Monthly sales for each requested year, in the order given.
    #[instrument(skip(self))]
    pub async fn sales_by_month(&self, years: &[i32]) -> Result<Vec<YearSales>, ServiceError> {
        let mut report = Vec::with_capacity(years.len());
        for &year in years {
            let mut sales = MonthlyTotals::zero();
            for order in self.orders_in_year(year).await? {
                sales.add(order.createdate.month(), order.total);
            }
            report.push(YearSales { year, sales });
        }
        Ok(report)
    }

    /// Weekly order totals of `year` up to day `doy`.
    #[instrument(skip(self))]
    pub async fn order_chart(&self, year: i32, doy: u32, remove_current_week: bool) -> Result<Vec<Decimal>, ServiceError> {
        if !(1..=366).contains(&doy) {
            return Err(ServiceError::ValidationError(
                "Day of year must be between 1 and 366".to_string(),
            ));
        }
        let mut daily: BTreeMap<u32, Decimal> = BTreeMap::new();
        for order in self.orders_in_year(year).await? {
            *daily.entry(order.createdate.ordinal()).or_default() += order.total;
        }
        Ok(chart_data(&daily, doy, remove_current_week))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn first_six_days() -> BTreeMap<u32, Decimal> {
        (1..=6).map(|d| (d, dec!(10))).collect()
    }

    #[test]
    fn current_week_can_be_dropped() {
        assert!(chart_data(&first_six_days(), 3, true).is_empty());
        assert_eq!(chart_data(&first_six_days(), 3, false), vec![dec!(60)]);
    }

    #[test]
    fn buckets_cover_whole_weeks() {
        let daily: BTreeMap<u32, Decimal> = [(7, dec!(1)), (8, dec!(2)), (14, dec!(3)), (15, dec!(4))]
            .into_iter()
            .collect();
        assert_eq!(chart_data(&daily, 10, false), vec![dec!(1), dec!(5)]);
        assert_eq!(chart_data(&daily, 15, false), vec![dec!(1), dec!(5), dec!(4)]);
    }

    #[test]
    fn monthly_totals_track_their_sum() {
        let mut totals = MonthlyTotals::zero();
        totals.add(1, dec!(10.50));
        totals.add(12, dec!(4.50));
        totals.add(13, dec!(99));
        assert_eq!(totals.months[0], dec!(10.50));
        assert_eq!(totals.months[11], dec!(4.50));
        assert_eq!(totals.total, dec!(15.00));
    }

    proptest! {
        #[test]
        fn bucket_count_follows_day_of_year(
            days in proptest::collection::btree_map(1u32..=366, 0i64..10_000, 0..60),
            doy in 1u32..=366,
            remove in any::<bool>(),
        ) {
            let daily: BTreeMap<u32, Decimal> = days.into_iter().map(|(d, c)| (d, Decimal::new(c, 2))).collect();
            let buckets = chart_data(&daily, doy, remove);
            let weeks = ((doy - 1) / 7 + 1) as usize;
            prop_assert_eq!(buckets.len(), if remove { weeks - 1 } else { weeks });
        }

        #[test]
        fn buckets_sum_every_covered_day(
            days in proptest::collection::btree_map(1u32..=366, 0i64..10_000, 0..60),
            doy in 1u32..=366,
        ) {
            let daily: BTreeMap<u32, Decimal> = days.into_iter().map(|(d, c)| (d, Decimal::new(c, 2))).collect();
            let weeks = (doy - 1) / 7 + 1;
            let expected: Decimal = daily.range(1..=weeks * 7).map(|(_, v)| *v).sum();
            let total: Decimal = chart_data(&daily, doy, false).into_iter().sum();
            prop_assert_eq!(total, expected);
        }
    }
}
