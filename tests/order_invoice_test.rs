mod common;

use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_admin::{
    errors::ServiceError,
    services::{
        invoices::{CreateInvoice, InvoiceItemRow, UpdateInvoice, UpdateInvoiceItem},
        orders::OrderSearch,
        Searchable,
    },
};

async fn seed_invoice(app: &TestApp) -> (i32, i32) {
    let region = app.seed_region("Canada").await;
    let locale = app.seed_locale("en_CA", region, "CAD").await;
    let account = app.seed_account("Dana Smith", "dana@example.com").await;
    let invoice = app
        .state
        .services
        .invoices
        .create(CreateInvoice {
            account,
            locale,
            comments: Some("Net 30".to_string()),
            shipping_total: dec!(10.00),
            tax_total: dec!(2.50),
        })
        .await
        .expect("invoice");
    (invoice.id, account)
}

fn row(sku: &str, quantity: i32, price: rust_decimal::Decimal) -> InvoiceItemRow {
    InvoiceItemRow {
        sku: sku.to_string(),
        description: format!("Line {}", sku),
        quantity: Some(quantity),
        price: Some(price),
    }
}

#[tokio::test]
async fn cancel_is_one_way() {
    let app = TestApp::new().await;
    let region = app.seed_region("Canada").await;
    let locale = app.seed_locale("en_CA", region, "CAD").await;
    let order_id = app
        .seed_order(None, "buyer@example.com", &locale, dec!(42.00), Utc::now())
        .await;

    let orders = &app.state.services.orders;
    let cancelled = orders.cancel(order_id).await.unwrap();
    assert!(cancelled.cancel_date.is_some());
    assert!(orders.get_details(order_id).await.unwrap().cancelled);

    let err = orders.cancel(order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    let err = orders.resend_confirmation(order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn confirmation_is_resent_in_locale_currency() {
    let app = TestApp::new().await;
    let region = app.seed_region("Canada").await;
    let locale = app.seed_locale("fr_CA", region, "CAD").await;
    let order_id = app
        .seed_order(None, "acheteur@example.com", &locale, dec!(19.5), Utc::now())
        .await;

    app.state.services.orders.resend_confirmation(order_id).await.unwrap();

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "acheteur@example.com");
    assert_eq!(sent[0].subject, format!("Order confirmation #{}", order_id));
    assert!(sent[0].body.contains("Total: 19.50 CAD"));
}

#[tokio::test]
async fn order_search_hides_cancelled_orders_by_default() {
    let app = TestApp::new().await;
    let region = app.seed_region("Canada").await;
    let locale = app.seed_locale("en_CA", region, "CAD").await;
    let now = Utc::now();
    let kept = app.seed_order(None, "a@example.com", &locale, dec!(5), now).await;
    let dropped = app
        .seed_order(None, "b@example.com", &locale, dec!(6), now - Duration::days(1))
        .await;
    app.state.services.orders.cancel(dropped).await.unwrap();

    let orders = &app.state.services.orders;
    let page = orders.search(OrderSearch::default(), 1, 20).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, kept);

    let page = orders
        .search(
            OrderSearch {
                include_cancelled: true,
                ..Default::default()
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].id, kept);
}

#[tokio::test]
async fn invalid_rows_reject_the_whole_batch() {
    let app = TestApp::new().await;
    let (invoice_id, _) = seed_invoice(&app).await;
    let invoices = &app.state.services.invoices;

    let rows = vec![
        row("A-1", 2, dec!(5.00)),
        InvoiceItemRow::default(),
        InvoiceItemRow {
            sku: "B-2".to_string(),
            description: String::new(),
            quantity: Some(0),
            price: Some(dec!(3.00)),
        },
    ];
    let err = invoices.add_items(invoice_id, rows).await.unwrap_err();
    let fields: Vec<(Option<usize>, String)> = err
        .field_errors()
        .unwrap_or_default()
        .iter()
        .map(|e| (e.row, e.field.clone()))
        .collect();
    assert_eq!(
        fields,
        vec![
            (Some(2), "description".to_string()),
            (Some(2), "quantity".to_string())
        ]
    );

    let details = invoices.get_details(invoice_id).await.unwrap();
    assert!(details.items.is_empty());
    assert_eq!(details.invoice.total, dec!(12.50));
}

#[tokio::test]
async fn oversized_rows_are_refused_without_touching_totals() {
    let app = TestApp::new().await;
    let (invoice_id, _) = seed_invoice(&app).await;
    let invoices = &app.state.services.invoices;

    let err = invoices
        .add_items(
            invoice_id,
            vec![row("BULK", 2_000_000_000, dec!(100000000000000000000))],
        )
        .await
        .unwrap_err();
    let fields: Vec<(Option<usize>, String)> = err
        .field_errors()
        .unwrap_or_default()
        .iter()
        .map(|e| (e.row, e.field.clone()))
        .collect();
    assert_eq!(
        fields,
        vec![(Some(0), "quantity".to_string()), (Some(0), "price".to_string())]
    );

    let added = invoices
        .add_items(invoice_id, vec![row("A-1", 1, dec!(5.00))])
        .await
        .unwrap();
    let err = invoices
        .update_item(
            added[0].id,
            UpdateInvoiceItem {
                price: Some(dec!(5000000000)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.field_errors().unwrap_or_default()[0].field, "price");

    let details = invoices.get_details(invoice_id).await.unwrap();
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.invoice.total, dec!(17.50));
}

#[tokio::test]
async fn totals_follow_item_changes() {
    let app = TestApp::new().await;
    let (invoice_id, account) = seed_invoice(&app).await;
    let invoices = &app.state.services.invoices;

    let added = invoices
        .add_items(
            invoice_id,
            vec![row("A-1", 2, dec!(5.00)), InvoiceItemRow::default(), row("B-2", 1, dec!(7.25))],
        )
        .await
        .unwrap();
    assert_eq!(added.len(), 2);
    assert_eq!(added[0].displayorder, 0);
    assert_eq!(added[1].displayorder, 1);

    let details = invoices.get_details(invoice_id).await.unwrap();
    assert_eq!(details.invoice.item_total, dec!(17.25));
    assert_eq!(details.invoice.total, dec!(29.75));

    let more = invoices.add_items(invoice_id, vec![row("C-3", 1, dec!(1.00))]).await.unwrap();
    assert_eq!(more[0].displayorder, 2);

    invoices
        .update_item(
            added[0].id,
            UpdateInvoiceItem {
                quantity: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let invoice = invoices.delete_item(added[1].id).await.unwrap();
    assert_eq!(invoice.item_total, dec!(16.00));
    assert_eq!(invoice.total, dec!(28.50));

    let invoice = invoices
        .update(
            invoice_id,
            UpdateInvoice {
                shipping_total: Some(dec!(0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.total, dec!(18.50));

    let err = invoices
        .update(
            invoice_id,
            UpdateInvoice {
                tax_total: Some(dec!(-1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::FieldErrors(_)));

    assert_eq!(invoices.list_for_account(account).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invoice_notification_goes_to_the_account() {
    let app = TestApp::new().await;
    let (invoice_id, _) = seed_invoice(&app).await;
    let invoices = &app.state.services.invoices;
    invoices.add_items(invoice_id, vec![row("A-1", 1, dec!(20))]).await.unwrap();

    invoices.send_notification(invoice_id).await.unwrap();

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "dana@example.com");
    assert!(sent[0].body.contains("Total due: 32.50 CAD"));
    assert!(sent[0].body.contains("Net 30"));
}
