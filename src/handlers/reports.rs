use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;

use super::common::success_response;
use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct YearsQuery {
    /// Comma separated, e.g. `2023,2024`
    pub years: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub year: Option<i32>,
    pub doy: Option<u32>,
    #[serde(default)]
    pub remove_current_week: bool,
}

fn parse_years(raw: Option<&str>) -> Result<Vec<i32>, ServiceError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(vec![Utc::now().year()]),
        Some(raw) => raw
            .split(',')
            .map(|y| {
                y.trim()
                    .parse::<i32>()
                    .map_err(|_| ServiceError::ValidationError(format!("'{}' is not a year", y.trim())))
            })
            .collect(),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/sales-by-region/:year", get(sales_by_region))
        .route("/reports/sales-by-month", get(sales_by_month))
        .route("/reports/order-chart", get(order_chart))
}

async fn sales_by_region(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(success_response(state.services.reports.sales_by_region(year).await?))
}

async fn sales_by_month(
    State(state): State<AppState>,
    Query(query): Query<YearsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let years = parse_years(query.years.as_deref())?;
    Ok(success_response(state.services.reports.sales_by_month(&years).await?))
}

/// Defaults to the current year up to today.
async fn order_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let today = Utc::now();
    let year = query.year.unwrap_or_else(|| today.year());
    let doy = query.doy.unwrap_or_else(|| today.ordinal());
    let chart = state
        .services
        .reports
        .order_chart(year, doy, query.remove_current_week)
        .await?;
    Ok(success_response(chart))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_are_comma_separated() {
        assert_eq!(parse_years(Some("2023, 2024")).unwrap(), vec![2023, 2024]);
        assert!(parse_years(Some("2023,next")).is_err());
        assert_eq!(parse_years(None).unwrap().len(), 1);
    }
}
