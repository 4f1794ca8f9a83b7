mod common;

use chrono::{Duration, TimeZone, Utc};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_admin::{
    errors::ServiceError,
    services::{
        items::UpdateItem,
        pricing::{FeatureInput, PriceRangeInput, SaleDiscountInput},
    },
};

fn discount(shortname: &str, pct: Decimal, days: i64, region: Option<i32>) -> SaleDiscountInput {
    let start = Utc::now() - Duration::days(1);
    SaleDiscountInput {
        title: shortname.to_uppercase(),
        shortname: shortname.to_string(),
        discount_percentage: pct,
        start_date: start,
        end_date: Some(start + Duration::days(days)),
        region,
    }
}

fn feature(shortname: &str, priority: i32, enabled: bool) -> FeatureInput {
    FeatureInput {
        title: shortname.to_uppercase(),
        shortname: shortname.to_string(),
        link: None,
        description: None,
        start_date: Utc::now() - Duration::hours(1),
        end_date: None,
        region: None,
        display_slot: "home".to_string(),
        enabled,
        priority,
    }
}

#[tokio::test]
async fn sale_discount_rules() {
    let app = TestApp::new().await;
    let pricing = &app.state.services.pricing;

    for pct in [dec!(0), dec!(1.5), dec!(-0.1)] {
        let err = pricing
            .create_sale_discount(discount("bad", pct, 5, None))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors().unwrap_or_default()[0].field, "discount_percentage");
    }

    let err = pricing
        .create_sale_discount(discount("backwards", dec!(0.2), -3, None))
        .await
        .unwrap_err();
    assert_eq!(err.field_errors().unwrap_or_default()[0].field, "end_date");

    assert!(pricing
        .create_sale_discount(discount("full", dec!(1), 5, None))
        .await
        .is_ok());
}

#[tokio::test]
async fn active_discounts_respect_window_and_region() {
    let app = TestApp::new().await;
    let canada = app.seed_region("Canada").await;
    let usa = app.seed_region("USA").await;
    let pricing = &app.state.services.pricing;

    let global = pricing
        .create_sale_discount(discount("global", dec!(0.10), 10, None))
        .await
        .unwrap();
    let canadian = pricing
        .create_sale_discount(discount("canada", dec!(0.25), 10, Some(canada)))
        .await
        .unwrap();
    pricing
        .create_sale_discount(discount("over", dec!(0.5), 1, None))
        .await
        .unwrap();

    let now = Utc::now() + Duration::hours(1);
    let ids = |list: Vec<storefront_admin::entities::sale_discount::Model>| {
        let mut ids: Vec<i32> = list.into_iter().map(|d| d.id).collect();
        ids.sort_unstable();
        ids
    };
    assert_eq!(
        ids(pricing.active_sale_discounts(now, Some(canada)).await.unwrap()),
        vec![global.id, canadian.id]
    );
    assert_eq!(
        ids(pricing.active_sale_discounts(now, Some(usa)).await.unwrap()),
        vec![global.id]
    );
    assert_eq!(
        ids(pricing.active_sale_discounts(now, None).await.unwrap()),
        vec![global.id]
    );
}

#[tokio::test]
async fn deleting_a_discount_detaches_items() {
    let app = TestApp::new().await;
    let catalog = app.seed_catalog("Main").await;
    let product = app.seed_product(catalog, "stove").await;
    let item_id = app.seed_item(product, "STOVE-1").await;
    let pricing = &app.state.services.pricing;
    let items = &app.state.services.items;

    let sale = pricing
        .create_sale_discount(discount("spring", dec!(0.15), 30, None))
        .await
        .unwrap();
    let updated = items
        .update_item(
            item_id,
            UpdateItem {
                sale_discount: Some(Some(sale.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.sale_discount, Some(sale.id));

    assert_eq!(pricing.delete_sale_discount(sale.id).await.unwrap(), 1);
    assert_eq!(items.get_item(item_id).await.unwrap().sale_discount, None);
    assert!(pricing.list_sale_discounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn price_ranges_need_a_sane_bound() {
    let app = TestApp::new().await;
    let pricing = &app.state.services.pricing;

    let err = pricing
        .create_price_range(PriceRangeInput {
            start_price: None,
            end_price: None,
            original_price: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::FieldErrors(_)));

    let err = pricing
        .create_price_range(PriceRangeInput {
            start_price: Some(dec!(50)),
            end_price: Some(dec!(10)),
            original_price: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.field_errors().unwrap_or_default()[0].field, "end_price");

    pricing
        .create_price_range(PriceRangeInput {
            start_price: Some(dec!(100)),
            end_price: None,
            original_price: true,
        })
        .await
        .unwrap();
    pricing
        .create_price_range(PriceRangeInput {
            start_price: None,
            end_price: Some(dec!(25)),
            original_price: false,
        })
        .await
        .unwrap();

    let starts: Vec<Option<Decimal>> = pricing
        .list_price_ranges()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.start_price)
        .collect();
    assert_eq!(starts, vec![None, Some(dec!(100))]);
}

#[tokio::test]
async fn active_features_are_enabled_and_ordered_by_priority() {
    let app = TestApp::new().await;
    let pricing = &app.state.services.pricing;

    let low = pricing.create_feature(feature("low", 5, true)).await.unwrap();
    let high = pricing.create_feature(feature("high", 1, true)).await.unwrap();
    pricing.create_feature(feature("off", 0, false)).await.unwrap();

    let shown: Vec<i32> = pricing
        .active_features(Utc::now(), None)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(shown, vec![high.id, low.id]);
}

#[tokio::test]
async fn reports_aggregate_placed_orders() {
    let app = TestApp::new().await;
    let canada = app.seed_region("Canada").await;
    let usa = app.seed_region("USA").await;
    app.seed_region("Europe").await;
    let en_ca = app.seed_locale("en_CA", canada, "CAD").await;
    let en_us = app.seed_locale("en_US", usa, "USD").await;
    let at = |month: u32, day: u32| Utc.with_ymd_and_hms(2023, month, day, 12, 0, 0).unwrap();

    app.seed_order(None, "a@example.com", &en_ca, dec!(10), at(1, 2)).await;
    app.seed_order(None, "b@example.com", &en_us, dec!(20), at(1, 9)).await;
    app.seed_order(None, "c@example.com", &en_ca, dec!(30), at(2, 1)).await;
    let cancelled = app.seed_order(None, "d@example.com", &en_ca, dec!(100), at(1, 3)).await;
    app.state.services.orders.cancel(cancelled).await.unwrap();
    app.seed_order(None, "e@example.com", &en_ca, dec!(7), Utc.with_ymd_and_hms(2022, 12, 31, 23, 0, 0).unwrap())
        .await;

    let reports = &app.state.services.reports;

    let by_region = reports.sales_by_region(2023).await.unwrap();
    let titles: Vec<&str> = by_region.regions.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Canada", "Europe", "USA"]);
    assert_eq!(by_region.regions[0].sales.months[0], dec!(10));
    assert_eq!(by_region.regions[0].sales.months[1], dec!(30));
    assert_eq!(by_region.regions[1].sales.total, Decimal::ZERO);
    assert_eq!(by_region.regions[2].sales.total, dec!(20));
    assert_eq!(by_region.totals.total, dec!(60));

    let by_month = reports.sales_by_month(&[2023, 2022]).await.unwrap();
    assert_eq!(by_month[0].sales.total, dec!(60));
    assert_eq!(by_month[1].sales.months[11], dec!(7));

    assert_eq!(reports.order_chart(2023, 10, false).await.unwrap(), vec![dec!(10), dec!(20)]);
    assert_eq!(reports.order_chart(2023, 10, true).await.unwrap(), vec![dec!(10)]);
    assert!(matches!(
        reports.order_chart(2023, 0, false).await.unwrap_err(),
        ServiceError::ValidationError(_)
    ));
}
