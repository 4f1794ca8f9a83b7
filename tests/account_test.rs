mod common;

use chrono::{Datelike, Utc};
use common::TestApp;
use storefront_admin::{
    entities::account_payment_method::PaymentType,
    errors::{PaymentError, ServiceError},
    services::{
        accounts::{AccountSearch, AddressInput, PaymentMethodInput},
        Searchable,
    },
};

fn address(name: &str, billing: bool, shipping: bool) -> AddressInput {
    AddressInput {
        fullname: name.to_string(),
        line1: "1 Main Street".to_string(),
        line2: None,
        city: "Halifax".to_string(),
        provstate: None,
        provstate_other: None,
        postal_code: "b3h 1a1".to_string(),
        country: "CA".to_string(),
        phone: None,
        default_billing: billing,
        default_shipping: shipping,
    }
}

fn visa(digits: &str, month: u32, year: i32) -> PaymentMethodInput {
    PaymentMethodInput {
        payment_type: "visa".to_string(),
        card_fullname: "Dana Smith".to_string(),
        card_lastdigits: digits.to_string(),
        card_expiry_month: month,
        card_expiry_year: year,
        default_method: false,
    }
}

#[tokio::test]
async fn one_default_address_per_kind() {
    let app = TestApp::new().await;
    app.seed_country("CA", "Canada").await;
    let account = app.seed_account("Dana Smith", "Dana@Example.com").await;
    let accounts = &app.state.services.accounts;

    let home = accounts.add_address(account, address("Home", true, true)).await.unwrap();
    assert_eq!(home.postal_code, "B3H 1A1");
    let work = accounts.add_address(account, address("Work", true, false)).await.unwrap();

    let details = accounts.get_details(account).await.unwrap();
    assert_eq!(details.account.email, "dana@example.com");
    let billing: Vec<i32> = details
        .addresses
        .iter()
        .filter(|a| a.default_billing)
        .map(|a| a.id)
        .collect();
    let shipping: Vec<i32> = details
        .addresses
        .iter()
        .filter(|a| a.default_shipping)
        .map(|a| a.id)
        .collect();
    assert_eq!(billing, vec![work.id]);
    assert_eq!(shipping, vec![home.id]);

    accounts.set_default_shipping(work.id).await.unwrap();
    let details = accounts.get_details(account).await.unwrap();
    assert!(details.addresses.iter().all(|a| a.default_shipping == (a.id == work.id)));
}

#[tokio::test]
async fn address_location_is_checked() {
    let app = TestApp::new().await;
    app.seed_country("CA", "Canada").await;
    app.seed_country("US", "United States").await;
    let maine = app.seed_provstate("US", "Maine", "ME").await;
    let account = app.seed_account("Dana Smith", "dana@example.com").await;
    let accounts = &app.state.services.accounts;

    let mut input = address("Home", false, false);
    input.provstate = Some(maine);
    let err = accounts.add_address(account, input).await.unwrap_err();
    assert_eq!(err.field_errors().unwrap_or_default()[0].field, "provstate");

    let mut input = address("Home", false, false);
    input.country = "FR".to_string();
    let err = accounts.add_address(account, input).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let mut input = address("", false, false);
    input.city = String::new();
    let err = accounts.add_address(account, input).await.unwrap_err();
    let fields: Vec<&str> = err
        .field_errors()
        .unwrap_or_default()
        .iter()
        .map(|e| e.field.as_str())
        .collect();
    assert!(fields.contains(&"fullname"));
    assert!(fields.contains(&"city"));
}

#[tokio::test]
async fn payment_methods_are_checked_and_defaulted() {
    let app = TestApp::new().await;
    let account = app.seed_account("Dana Smith", "dana@example.com").await;
    let accounts = &app.state.services.accounts;
    let next_year = Utc::now().year() + 1;

    let first = accounts
        .add_payment_method(account, visa("4242", 12, next_year))
        .await
        .unwrap();
    assert!(first.default_method);
    assert_eq!(first.payment_type, PaymentType::Visa);

    let paypal = accounts
        .add_payment_method(
            account,
            PaymentMethodInput {
                payment_type: "paypal".to_string(),
                card_fullname: String::new(),
                card_lastdigits: String::new(),
                card_expiry_month: 0,
                card_expiry_year: 0,
                default_method: false,
            },
        )
        .await
        .unwrap();
    assert!(!paypal.default_method);

    accounts.set_default_payment_method(paypal.id).await.unwrap();
    let details = accounts.get_details(account).await.unwrap();
    assert!(details
        .payment_methods
        .iter()
        .all(|m| m.default_method == (m.id == paypal.id)));

    let err = accounts
        .add_payment_method(account, visa("4242", 1, 2001))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Payment(PaymentError::CardExpired { month: 1, year: 2001 })
    ));
    assert_eq!(err.status_code().as_u16(), 422);

    let err = accounts
        .add_payment_method(account, visa("42", 12, next_year))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Payment(PaymentError::CardNumber)));

    let mut diners = visa("4242", 12, next_year);
    diners.payment_type = "diners".to_string();
    let err = accounts.add_payment_method(account, diners).await.unwrap_err();
    assert!(matches!(err, ServiceError::Payment(PaymentError::CardType(_))));

    assert_eq!(accounts.get_details(account).await.unwrap().payment_methods.len(), 2);
}

#[tokio::test]
async fn suspicious_accounts_are_listed_and_searchable() {
    let app = TestApp::new().await;
    let honest = app.seed_account("Ann Honest", "ann@example.com").await;
    let shady = app.seed_account("Sam Shady", "sam@example.com").await;
    let accounts = &app.state.services.accounts;

    accounts.set_suspicious(shady, true).await.unwrap();
    let flagged: Vec<i32> = accounts
        .suspicious_accounts()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(flagged, vec![shady]);

    let page = accounts
        .search(
            AccountSearch {
                keyword: Some("example.com".to_string()),
                suspicious: Some(false),
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, honest);
}
