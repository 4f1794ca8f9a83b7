use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::{page_offset, Page, Searchable};
use crate::entities::account_payment_method::PaymentType;
use crate::entities::{account, account_address, account_payment_method, country, provstate};
use crate::errors::{FieldError, PaymentError, ServiceError};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateAccount {
    #[validate(length(min = 1, message = "Name is required"))]
    pub fullname: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateAccount {
    #[validate(length(min = 1, message = "Name is required"))]
    pub fullname: Option<String>,
    #[validate(email(message = "A valid email address is required"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct AccountSearch {
    /// Matched against name, email and company
    pub keyword: Option<String>,
    pub suspicious: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub fullname: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    pub provstate: Option<i32>,
    pub provstate_other: Option<String>,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(equal = 2, message = "Country code must be two letters"))]
    pub country: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub default_billing: bool,
    #[serde(default)]
    pub default_shipping: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaymentMethodInput {
    /// `visa`, `mastercard`, `amex` or `paypal`
    pub payment_type: String,
    #[serde(default)]
    pub card_fullname: String,
    #[serde(default)]
    pub card_lastdigits: String,
    #[serde(default)]
    pub card_expiry_month: u32,
    #[serde(default)]
    pub card_expiry_year: i32,
    #[serde(default)]
    pub default_method: bool,
}

/// Account with everything the account page shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDetails {
    pub account: account::Model,
    pub addresses: Vec<account_address::Model>,
    pub payment_methods: Vec<account_payment_method::Model>,
}

#[derive(Debug, Clone, Copy)]
enum DefaultFlag {
    Billing,
    Shipping,
}

impl DefaultFlag {
    fn column(self) -> account_address::Column {
        match self {
            DefaultFlag::Billing => account_address::Column::DefaultBilling,
            DefaultFlag::Shipping => account_address::Column::DefaultShipping,
        }
    }
}

fn parse_payment_type(raw: &str) -> Result<PaymentType, PaymentError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "visa" => Ok(PaymentType::Visa),
        "mastercard" => Ok(PaymentType::Mastercard),
        "amex" => Ok(PaymentType::Amex),
        "paypal" => Ok(PaymentType::Paypal),
        _ => Err(PaymentError::CardType(raw.trim().to_string())),
    }
}

/// Checks a payment method against the date it is recorded on. A card stays
/// valid through the last day of its expiry month.
fn check_payment_method(input: &PaymentMethodInput, today: NaiveDate) -> Result<PaymentType, ServiceError> {
    let payment_type = parse_payment_type(&input.payment_type)?;
    if !payment_type.is_card() {
        return Ok(payment_type);
    }

    let digits = input.card_lastdigits.trim();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentError::CardNumber.into());
    }
    if input.card_fullname.trim().is_empty() {
        return Err(ServiceError::FieldErrors(vec![FieldError::new(
            "card_fullname",
            "Name on card is required",
        )]));
    }
    if !(1..=12).contains(&input.card_expiry_month) {
        return Err(ServiceError::FieldErrors(vec![FieldError::new(
            "card_expiry_month",
            "Expiry month must be between 1 and 12",
        )]));
    }

    let expired = (input.card_expiry_year, input.card_expiry_month) < (today.year(), today.month());
    if expired {
        return Err(PaymentError::CardExpired {
            month: input.card_expiry_month,
            year: input.card_expiry_year,
        }
        .into());
    }
    Ok(payment_type)
}

async fn clear_default<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    flag: DefaultFlag,
) -> Result<(), ServiceError> {
    account_address::Entity::update_many()
        .col_expr(flag.column(), Expr::value(false))
        .filter(account_address::Column::Account.eq(account_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn clear_default_payment<C: ConnectionTrait>(conn: &C, account_id: i32) -> Result<(), ServiceError> {
    account_payment_method::Entity::update_many()
        .col_expr(account_payment_method::Column::DefaultMethod, Expr::value(false))
        .filter(account_payment_method::Column::Account.eq(account_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Customer accounts, their addresses and stored payment methods
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
}

impl AccountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(&self, id: i32) -> Result<account::Model, ServiceError> {
        account::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", id))
    }

    async fn find_address(&self, id: i32) -> Result<account_address::Model, ServiceError> {
        account_address::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Address", id))
    }

    async fn find_payment_method(&self, id: i32) -> Result<account_payment_method::Model, ServiceError> {
        account_payment_method::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Payment method", id))
    }

    /// The country must exist and a listed province must belong to it.
    async fn check_address_location(&self, input: &AddressInput) -> Result<(), ServiceError> {
        country::Entity::find_by_id(input.country.to_uppercase())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Country", &input.country))?;

        if let Some(provstate_id) = input.provstate {
            let provstate = provstate::Entity::find_by_id(provstate_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Province/state", provstate_id))?;
            if !provstate.country.eq_ignore_ascii_case(&input.country) {
                return Err(ServiceError::FieldErrors(vec![FieldError::new(
                    "provstate",
                    "Province/state does not belong to the selected country",
                )]));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateAccount) -> Result<account::Model, ServiceError> {
        input.validate()?;
        let account = account::ActiveModel {
            fullname: Set(input.fullname.trim().to_string()),
            email: Set(input.email.trim().to_lowercase()),
            phone: Set(input.phone),
            company: Set(input.company),
            suspicious: Set(false),
            createdate: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        info!(account_id = account.id, "Account created");
        Ok(account)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i32, input: UpdateAccount) -> Result<account::Model, ServiceError> {
        input.validate()?;
        let mut active: account::ActiveModel = self.find(id).await?.into();
        if let Some(fullname) = input.fullname {
            active.fullname = Set(fullname.trim().to_string());
        }
        if let Some(email) = input.email {
            active.email = Set(email.trim().to_lowercase());
        }
        if input.phone.is_some() {
            active.phone = Set(input.phone);
        }
        if input.company.is_some() {
            active.company = Set(input.company);
        }
        Ok(active.update(&*self.db).await?)
    }

    pub async fn get_details(&self, id: i32) -> Result<AccountDetails, ServiceError> {
        let account = self.find(id).await?;
        let addresses = account_address::Entity::find()
            .filter(account_address::Column::Account.eq(id))
            .order_by_asc(account_address::Column::Id)
            .all(&*self.db)
            .await?;
        let payment_methods = account_payment_method::Entity::find()
            .filter(account_payment_method::Column::Account.eq(id))
            .order_by_asc(account_payment_method::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(AccountDetails {
            account,
            addresses,
            payment_methods,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn add_address(&self, account_id: i32, input: AddressInput) -> Result<account_address::Model, ServiceError> {
        input.validate()?;
        self.find(account_id).await?;
        self.check_address_location(&input).await?;

        let txn = self.db.begin().await?;
        if input.default_billing {
            clear_default(&txn, account_id, DefaultFlag::Billing).await?;
        }
        if input.default_shipping {
            clear_default(&txn, account_id, DefaultFlag::Shipping).await?;
        }
        let address = account_address::ActiveModel {
            account: Set(account_id),
            fullname: Set(input.fullname.trim().to_string()),
            line1: Set(input.line1.trim().to_string()),
            line2: Set(input.line2),
            city: Set(input.city.trim().to_string()),
            provstate: Set(input.provstate),
            provstate_other: Set(input.provstate_other),
            postal_code: Set(input.postal_code.trim().to_uppercase()),
            country: Set(input.country.to_uppercase()),
            phone: Set(input.phone),
            default_billing: Set(input.default_billing),
            default_shipping: Set(input.default_shipping),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(account_id, address_id = address.id, "Address added");
        Ok(address)
    }

    #[instrument(skip(self, input))]
    pub async fn update_address(&self, address_id: i32, input: AddressInput) -> Result<account_address::Model, ServiceError> {
        input.validate()?;
        let existing = self.find_address(address_id).await?;
        self.check_address_location(&input).await?;
        let account_id = existing.account;

        let txn = self.db.begin().await?;
        if input.default_billing && !existing.default_billing {
            clear_default(&txn, account_id, DefaultFlag::Billing).await?;
        }
        if input.default_shipping && !existing.default_shipping {
            clear_default(&txn, account_id, DefaultFlag::Shipping).await?;
        }
        let mut active: account_address::ActiveModel = existing.into();
        active.fullname = Set(input.fullname.trim().to_string());
        active.line1 = Set(input.line1.trim().to_string());
        active.line2 = Set(input.line2);
        active.city = Set(input.city.trim().to_string());
        active.provstate = Set(input.provstate);
        active.provstate_other = Set(input.provstate_other);
        active.postal_code = Set(input.postal_code.trim().to_uppercase());
        active.country = Set(input.country.to_uppercase());
        active.phone = Set(input.phone);
        active.default_billing = Set(input.default_billing);
        active.default_shipping = Set(input.default_shipping);
        let address = active.update(&txn).await?;
        txn.commit().await?;
        Ok(address)
    }

    #[instrument(skip(self))]
    pub async fn delete_address(&self, address_id: i32) -> Result<(), ServiceError> {
        let existing = self.find_address(address_id).await?;
        account_address::Entity::delete_by_id(address_id)
            .exec(&*self.db)
            .await?;
        if existing.default_billing || existing.default_shipping {
            warn!(
                account_id = existing.account,
                address_id, "Default address deleted; account has no default until one is chosen"
            );
        }
        Ok(())
    }

    async fn set_default(&self, address_id: i32, flag: DefaultFlag) -> Result<account_address::Model, ServiceError> {
        let existing = self.find_address(address_id).await?;
        let txn = self.db.begin().await?;
        clear_default(&txn, existing.account, flag).await?;
        let mut active: account_address::ActiveModel = existing.into();
        match flag {
            DefaultFlag::Billing => active.default_billing = Set(true),
            DefaultFlag::Shipping => active.default_shipping = Set(true),
        }
        let address = active.update(&txn).await?;
        txn.commit().await?;
        info!(account_id = address.account, address_id, ?flag, "Default address changed");
        Ok(address)
    }

    pub async fn set_default_billing(&self, address_id: i32) -> Result<account_address::Model, ServiceError> {
        self.set_default(address_id, DefaultFlag::Billing).await
    }

    pub async fn set_default_shipping(&self, address_id: i32) -> Result<account_address::Model, ServiceError> {
        self.set_default(address_id, DefaultFlag::Shipping).await
    }

    /// Records a payment method. Only the last four card digits are kept.
    #[instrument(skip(self, input))]
    pub async fn add_payment_method(
        &self,
        account_id: i32,
        input: PaymentMethodInput,
    ) -> Result<account_payment_method::Model, ServiceError> {
        self.find(account_id).await?;
        let payment_type = check_payment_method(&input, Utc::now().date_naive())?;

        let (month, year) = if payment_type.is_card() {
            (input.card_expiry_month as i32, input.card_expiry_year)
        } else {
            (0, 0)
        };

        let txn = self.db.begin().await?;
        let existing = account_payment_method::Entity::find()
            .filter(account_payment_method::Column::Account.eq(account_id))
            .count(&txn)
            .await?;
        let make_default = input.default_method || existing == 0;
        if make_default {
            clear_default_payment(&txn, account_id).await?;
        }
        let method = account_payment_method::ActiveModel {
            account: Set(account_id),
            payment_type: Set(payment_type),
            card_fullname: Set(input.card_fullname.trim().to_string()),
            card_lastdigits: Set(input.card_lastdigits.trim().to_string()),
            card_expiry_month: Set(month),
            card_expiry_year: Set(year),
            default_method: Set(make_default),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(account_id, method_id = method.id, "Payment method added");
        Ok(method)
    }

    #[instrument(skip(self))]
    pub async fn delete_payment_method(&self, method_id: i32) -> Result<(), ServiceError> {
        self.find_payment_method(method_id).await?;
        account_payment_method::Entity::delete_by_id(method_id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_default_payment_method(
        &self,
        method_id: i32,
    ) -> Result<account_payment_method::Model, ServiceError> {
        let existing = self.find_payment_method(method_id).await?;
        let txn = self.db.begin().await?;
        clear_default_payment(&txn, existing.account).await?;
        let mut active: account_payment_method::ActiveModel = existing.into();
        active.default_method = Set(true);
        let method = active.update(&txn).await?;
        txn.commit().await?;
        Ok(method)
    }

    #[instrument(skip(self))]
    pub async fn set_suspicious(&self, id: i32, suspicious: bool) -> Result<account::Model, ServiceError> {
        let mut active: account::ActiveModel = self.find(id).await?.into();
        active.suspicious = Set(suspicious);
        let account = active.update(&*self.db).await?;
        if suspicious {
            warn!(account_id = id, "Account flagged as suspicious");
        } else {
            info!(account_id = id, "Suspicious flag cleared");
        }
        Ok(account)
    }

    pub async fn suspicious_accounts(&self) -> Result<Vec<account::Model>, ServiceError> {
        Ok(account::Entity::find()
            .filter(account::Column::Suspicious.eq(true))
            .order_by_asc(account::Column::Fullname)
            .all(&*self.db)
            .await?)
    }
}

#[async_trait]
impl Searchable for AccountService {
    type Query = AccountSearch;
    type Item = account::Model;

    async fn search(&self, query: AccountSearch, page: u64, per_page: u64) -> Result<Page<account::Model>, ServiceError> {
        let db = &*self.db;
        let mut condition = Condition::all();
        if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(account::Column::Fullname.contains(keyword))
                    .add(account::Column::Email.contains(keyword))
                    .add(account::Column::Company.contains(keyword)),
            );
        }
        if let Some(suspicious) = query.suspicious {
            condition = condition.add(account::Column::Suspicious.eq(suspicious));
        }

        let select = account::Entity::find().filter(condition);
        let total = select.clone().count(db).await?;
        let items = select
            .order_by_asc(account::Column::Fullname)
            .order_by_asc(account::Column::Id)
            .offset(page_offset(page, per_page))
            .limit(per_page)
            .all(db)
            .await?;
        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(kind: &str, digits: &str, month: u32, year: i32) -> PaymentMethodInput {
        PaymentMethodInput {
            payment_type: kind.to_string(),
            card_fullname: "Jo Smith".to_string(),
            card_lastdigits: digits.to_string(),
            card_expiry_month: month,
            card_expiry_year: year,
            default_method: false,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn unknown_card_type_is_refused() {
        let err = check_payment_method(&card("discover", "1234", 1, 2030), today()).unwrap_err();
        assert!(matches!(err, ServiceError::Payment(PaymentError::CardType(t)) if t == "discover"));
    }

    #[test]
    fn card_is_valid_through_its_expiry_month() {
        assert!(check_payment_method(&card("visa", "4242", 6, 2024), today()).is_ok());
        let err = check_payment_method(&card("visa", "4242", 5, 2024), today()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Payment(PaymentError::CardExpired { month: 5, year: 2024 })
        ));
    }

    #[test]
    fn last_digits_must_be_four_digits() {
        for digits in ["", "123", "12345", "12a4"] {
            let err = check_payment_method(&card("amex", digits, 1, 2030), today()).unwrap_err();
            assert!(matches!(err, ServiceError::Payment(PaymentError::CardNumber)));
        }
    }

    #[test]
    fn paypal_needs_no_card_details() {
        let input = PaymentMethodInput {
            payment_type: "PayPal".to_string(),
            card_fullname: String::new(),
            card_lastdigits: String::new(),
            card_expiry_month: 0,
            card_expiry_year: 0,
            default_method: true,
        };
        assert_eq!(check_payment_method(&input, today()).unwrap(), PaymentType::Paypal);
    }
}
