use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{page_offset, Page, Searchable};
use crate::entities::{account, locale, order, order_address, order_item};
use crate::errors::ServiceError;
use crate::notifications::{templates, Mailer};

/// Money totals of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderTotals {
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub shipping: Decimal,
    #[schema(value_type = String)]
    pub surcharge: Decimal,
    #[schema(value_type = String)]
    pub promotion: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
}

/// Sum of price × quantity over the lines, or `None` when the sum overflows.
pub(crate) fn checked_subtotal<I>(lines: I) -> Option<Decimal>
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines.into_iter().try_fold(Decimal::ZERO, |acc, (price, quantity)| {
        price
            .checked_mul(Decimal::from(quantity))
            .and_then(|line| acc.checked_add(line))
    })
}

fn overflow() -> ServiceError {
    ServiceError::ValidationError("Order amounts are too large to total".to_string())
}

impl OrderTotals {
    /// `subtotal` is the sum of price × quantity; `total` adds shipping,
    /// surcharge and tax and subtracts the promotion. Both are rounded to cents.
    pub fn compute<I>(
        lines: I,
        shipping: Decimal,
        surcharge: Decimal,
        promotion: Decimal,
        tax: Decimal,
    ) -> Result<Self, ServiceError>
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let subtotal = checked_subtotal(lines).ok_or_else(overflow)?.round_dp(2);
        let total = subtotal
            .checked_add(shipping)
            .and_then(|t| t.checked_add(surcharge))
            .and_then(|t| t.checked_add(tax))
            .and_then(|t| t.checked_sub(promotion))
            .ok_or_else(overflow)?
            .round_dp(2);
        Ok(Self {
            subtotal,
            shipping,
            surcharge,
            promotion,
            tax,
            total,
        })
    }
}

/// Everything the order page shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub account: Option<account::Model>,
    pub locale: Option<locale::Model>,
    pub billing_address: Option<order_address::Model>,
    pub shipping_address: Option<order_address::Model>,
    pub items: Vec<order_item::Model>,
    pub totals: OrderTotals,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct OrderSearch {
    pub id: Option<i32>,
    pub email: Option<String>,
    /// Matched against billing and shipping names
    pub name: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub include_cancelled: bool,
}

/// Order lookup, cancellation and confirmation mail
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    mailer: Arc<dyn Mailer>,
    default_currency: String,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, mailer: Arc<dyn Mailer>, default_currency: impl Into<String>) -> Self {
        Self {
            db,
            mailer,
            default_currency: default_currency.into(),
        }
    }

    async fn find(&self, id: i32) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))
    }

    async fn address(&self, id: Option<i32>) -> Result<Option<order_address::Model>, ServiceError> {
        match id {
            Some(id) => Ok(order_address::Entity::find_by_id(id).one(&*self.db).await?),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_details(&self, id: i32) -> Result<OrderDetails, ServiceError> {
        let order = self.find(id).await?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::Ordr.eq(id))
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await?;

        let account = match order.account {
            Some(account_id) => account::Entity::find_by_id(account_id).one(&*self.db).await?,
            None => None,
        };
        let locale = locale::Entity::find_by_id(order.locale.clone())
            .one(&*self.db)
            .await?;
        let billing_address = self.address(order.billing_address).await?;
        let shipping_address = self.address(order.shipping_address).await?;

        let totals = OrderTotals::compute(
            items.iter().map(|i| (i.price, i.quantity)),
            order.shipping_total,
            order.surcharge_total,
            order.promotion_total,
            order.tax_total,
        )?;

        Ok(OrderDetails {
            cancelled: order.is_cancelled(),
            order,
            account,
            locale,
            billing_address,
            shipping_address,
            items,
            totals,
        })
    }

    /// Marks the order cancelled. The row is kept.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i32) -> Result<order::Model, ServiceError> {
        let order = self.find(id).await?;
        if let Some(when) = order.cancel_date {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} was already cancelled on {}",
                id,
                when.format("%Y-%m-%d")
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.cancel_date = Set(Some(Utc::now()));
        let order = active.update(&*self.db).await?;

        metrics::counter!("storefront_orders.cancelled", 1);
        info!(order_id = id, "Order cancelled");
        Ok(order)
    }

    /// Sends the order confirmation again.
    #[instrument(skip(self))]
    pub async fn resend_confirmation(&self, id: i32) -> Result<(), ServiceError> {
        let details = self.get_details(id).await?;
        if details.cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is cancelled; no confirmation is sent",
                id
            )));
        }

        let currency = details
            .locale
            .as_ref()
            .map(|l| l.currency.clone())
            .unwrap_or_else(|| self.default_currency.clone());
        let message = templates::order_confirmation(&details.order, &details.items, &currency);
        self.mailer.send(message).await?;

        info!(order_id = id, to = %details.order.email, "Order confirmation resent");
        Ok(())
    }

    #[instrument(skip(self, comments))]
    pub async fn update_comments(&self, id: i32, comments: Option<String>) -> Result<order::Model, ServiceError> {
        let mut active: order::ActiveModel = self.find(id).await?.into();
        active.comments = Set(comments.filter(|c| !c.trim().is_empty()));
        Ok(active.update(&*self.db).await?)
    }
}

#[async_trait]
impl Searchable for OrderService {
    type Query = OrderSearch;
    type Item = order::Model;

    async fn search(&self, query: OrderSearch, page: u64, per_page: u64) -> Result<Page<order::Model>, ServiceError> {
        let db = &*self.db;
        let mut condition = Condition::all();

        if let Some(id) = query.id {
            condition = condition.add(order::Column::Id.eq(id));
        }
        if let Some(email) = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            condition = condition.add(order::Column::Email.contains(email));
        }
        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let address_ids: Vec<i32> = order_address::Entity::find()
                .filter(order_address::Column::Fullname.contains(name))
                .all(db)
                .await?
                .into_iter()
                .map(|a| a.id)
                .collect();
            condition = condition.add(
                Condition::any()
                    .add(order::Column::BillingAddress.is_in(address_ids.clone()))
                    .add(order::Column::ShippingAddress.is_in(address_ids)),
            );
        }
        if let Some(from) = query.from {
            condition = condition.add(order::Column::Createdate.gte(from));
        }
        if let Some(to) = query.to {
            condition = condition.add(order::Column::Createdate.lt(to));
        }
        if !query.include_cancelled {
            condition = condition.add(order::Column::CancelDate.is_null());
        }

        let select = order::Entity::find().filter(condition);
        let total = select.clone().count(db).await?;
        let items = select
            .order_by_desc(order::Column::Createdate)
            .order_by_desc(order::Column::Id)
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
    use rust_decimal_macros::dec;

    #[test]
    fn totals_follow_the_order_formula() {
        let totals = OrderTotals::compute(
            vec![(dec!(19.99), 2), (dec!(5.00), 1)],
            dec!(7.50),
            dec!(1.25),
            dec!(4.00),
            dec!(6.13),
        )
        .unwrap();
        assert_eq!(totals.subtotal, dec!(44.98));
        assert_eq!(totals.total, dec!(55.86));
    }

    #[test]
    fn totals_round_to_cents() {
        let totals = OrderTotals::compute(
            vec![(dec!(0.333), 3)],
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            dec!(0.0049),
        )
        .unwrap();
        assert_eq!(totals.subtotal, dec!(1.00));
        assert_eq!(totals.total, dec!(1.00));
    }

    #[test]
    fn empty_order_totals_are_zero() {
        let totals = OrderTotals::compute(
            Vec::new(),
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .unwrap();
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn overflowing_lines_are_an_error_not_a_panic() {
        let err = OrderTotals::compute(
            vec![(Decimal::MAX, 2)],
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err = OrderTotals::compute(
            vec![(Decimal::MAX, 1)],
            Decimal::MAX,
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
        assert_eq!(checked_subtotal(vec![(Decimal::MAX, 1), (Decimal::ONE, 1)]), None);
    }
}
