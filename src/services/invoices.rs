use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::entities::{account, invoice, invoice_item, locale};
use crate::errors::{FieldError, ServiceError};
use crate::notifications::{templates, Mailer};
use crate::services::orders::checked_subtotal;

/// Largest unit price or amount accepted on an invoice.
const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
/// Largest quantity accepted on an invoice line.
const MAX_QUANTITY: i32 = 1_000_000;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateInvoice {
    pub account: i32,
    pub locale: String,
    pub comments: Option<String>,
    #[serde(default)]
    #[schema(value_type = String)]
    pub shipping_total: Decimal,
    #[serde(default)]
    #[schema(value_type = String)]
    pub tax_total: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateInvoice {
    pub comments: Option<String>,
    #[schema(value_type = Option<String>)]
    pub shipping_total: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub tax_total: Option<Decimal>,
}

/// One line of the invoice item entry form. Rows left completely blank are ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct InvoiceItemRow {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub description: String,
    pub quantity: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

impl InvoiceItemRow {
    fn is_blank(&self) -> bool {
        self.sku.trim().is_empty()
            && self.description.trim().is_empty()
            && self.quantity.is_none()
            && self.price.is_none()
    }

    /// Field errors of this row, tagged with its index in the submitted list.
    fn check(&self, row: usize) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.sku.trim().is_empty() {
            errors.push(FieldError::in_row(row, "sku", "SKU is required"));
        }
        if self.description.trim().is_empty() {
            errors.push(FieldError::in_row(row, "description", "Description is required"));
        }
        match self.quantity {
            Some(q) if q > MAX_QUANTITY => errors.push(FieldError::in_row(
                row,
                "quantity",
                format!("Quantity cannot exceed {}", MAX_QUANTITY),
            )),
            Some(q) if q >= 1 => {}
            _ => errors.push(FieldError::in_row(row, "quantity", "Quantity must be at least 1")),
        }
        match self.price {
            Some(p) if p.is_sign_negative() => {
                errors.push(FieldError::in_row(row, "price", "Price cannot be negative"))
            }
            Some(p) if p > MAX_AMOUNT => errors.push(FieldError::in_row(
                row,
                "price",
                format!("Price cannot exceed {}", MAX_AMOUNT),
            )),
            Some(_) => {}
            None => errors.push(FieldError::in_row(row, "price", "Price is required")),
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateInvoiceItem {
    pub sku: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice: invoice::Model,
    pub account: account::Model,
    pub items: Vec<invoice_item::Model>,
}

/// Recomputes `item_total` and `total` from the stored items.
async fn recompute_totals<C: ConnectionTrait>(conn: &C, invoice_id: i32) -> Result<invoice::Model, ServiceError> {
    let invoice = invoice::Entity::find_by_id(invoice_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Invoice", invoice_id))?;
    let items = invoice_item::Entity::find()
        .filter(invoice_item::Column::Invoice.eq(invoice_id))
        .all(conn)
        .await?;

    let too_large = || ServiceError::ValidationError("Invoice amounts are too large to total".to_string());
    let item_total = checked_subtotal(items.iter().map(|i| (i.price, i.quantity)))
        .ok_or_else(too_large)?
        .round_dp(2);
    let total = item_total
        .checked_add(invoice.shipping_total)
        .and_then(|t| t.checked_add(invoice.tax_total))
        .ok_or_else(too_large)?
        .round_dp(2);

    let mut active: invoice::ActiveModel = invoice.into();
    active.item_total = Set(item_total);
    active.total = Set(total);
    Ok(active.update(conn).await?)
}

/// Staff-issued invoices
#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DatabaseConnection>,
    mailer: Arc<dyn Mailer>,
    default_currency: String,
}

impl InvoiceService {
    pub fn new(db: Arc<DatabaseConnection>, mailer: Arc<dyn Mailer>, default_currency: impl Into<String>) -> Self {
        Self {
            db,
            mailer,
            default_currency: default_currency.into(),
        }
    }

    async fn find(&self, id: i32) -> Result<invoice::Model, ServiceError> {
        invoice::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice", id))
    }

    async fn find_item(&self, id: i32) -> Result<invoice_item::Model, ServiceError> {
        invoice_item::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice item", id))
    }

    fn check_amounts(shipping: Decimal, tax: Decimal) -> Result<(), ServiceError> {
        let mut errors = Vec::new();
        if shipping.is_sign_negative() {
            errors.push(FieldError::new("shipping_total", "Shipping cannot be negative"));
        } else if shipping > MAX_AMOUNT {
            errors.push(FieldError::new(
                "shipping_total",
                format!("Shipping cannot exceed {}", MAX_AMOUNT),
            ));
        }
        if tax.is_sign_negative() {
            errors.push(FieldError::new("tax_total", "Tax cannot be negative"));
        } else if tax > MAX_AMOUNT {
            errors.push(FieldError::new("tax_total", format!("Tax cannot exceed {}", MAX_AMOUNT)));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::FieldErrors(errors))
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateInvoice) -> Result<invoice::Model, ServiceError> {
        Self::check_amounts(input.shipping_total, input.tax_total)?;
        account::Entity::find_by_id(input.account)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", input.account))?;
        locale::Entity::find_by_id(input.locale.clone())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Locale", &input.locale))?;

        let total = (input.shipping_total + input.tax_total).round_dp(2);
        let invoice = invoice::ActiveModel {
            account: Set(input.account),
            locale: Set(input.locale),
            comments: Set(input.comments),
            shipping_total: Set(input.shipping_total),
            tax_total: Set(input.tax_total),
            item_total: Set(Decimal::ZERO),
            total: Set(total),
            createdate: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(invoice_id = invoice.id, account = invoice.account, "Invoice created");
        Ok(invoice)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i32, input: UpdateInvoice) -> Result<invoice::Model, ServiceError> {
        let existing = self.find(id).await?;
        let shipping = input.shipping_total.unwrap_or(existing.shipping_total);
        let tax = input.tax_total.unwrap_or(existing.tax_total);
        Self::check_amounts(shipping, tax)?;

        let txn = self.db.begin().await?;
        let mut active: invoice::ActiveModel = existing.into();
        if input.comments.is_some() {
            active.comments = Set(input.comments);
        }
        active.shipping_total = Set(shipping);
        active.tax_total = Set(tax);
        active.update(&txn).await?;
        let invoice = recompute_totals(&txn, id).await?;
        txn.commit().await?;
        Ok(invoice)
    }

    pub async fn get_details(&self, id: i32) -> Result<InvoiceDetails, ServiceError> {
        let invoice = self.find(id).await?;
        let account = account::Entity::find_by_id(invoice.account)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", invoice.account))?;
        let items = invoice_item::Entity::find()
            .filter(invoice_item::Column::Invoice.eq(id))
            .order_by_asc(invoice_item::Column::Displayorder)
            .order_by_asc(invoice_item::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(InvoiceDetails {
            invoice,
            account,
            items,
        })
    }

    pub async fn list_for_account(&self, account_id: i32) -> Result<Vec<invoice::Model>, ServiceError> {
        Ok(invoice::Entity::find()
            .filter(invoice::Column::Account.eq(account_id))
            .order_by_desc(invoice::Column::Createdate)
            .order_by_desc(invoice::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Adds item rows to an invoice. Every row is checked first; if any row is
    /// invalid nothing is written and the error lists each failing row and field.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn add_items(
        &self,
        invoice_id: i32,
        rows: Vec<InvoiceItemRow>,
    ) -> Result<Vec<invoice_item::Model>, ServiceError> {
        self.find(invoice_id).await?;

        let filled: Vec<(usize, InvoiceItemRow)> = rows
            .into_iter()
            .enumerate()
            .filter(|(_, row)| !row.is_blank())
            .collect();

        let errors: Vec<FieldError> = filled.iter().flat_map(|(index, row)| row.check(*index)).collect();
        if !errors.is_empty() {
            return Err(ServiceError::FieldErrors(errors));
        }
        if filled.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin().await?;
        let mut next_order = invoice_item::Entity::find()
            .select_only()
            .column_as(invoice_item::Column::Displayorder.max(), "max_order")
            .filter(invoice_item::Column::Invoice.eq(invoice_id))
            .into_tuple::<Option<i32>>()
            .one(&txn)
            .await?
            .flatten()
            .map_or(0, |max| max + 1);

        let mut inserted = Vec::with_capacity(filled.len());
        for (_, row) in filled {
            let item = invoice_item::ActiveModel {
                invoice: Set(invoice_id),
                sku: Set(row.sku.trim().to_string()),
                description: Set(row.description.trim().to_string()),
                quantity: Set(row.quantity.unwrap_or(1)),
                price: Set(row.price.unwrap_or(Decimal::ZERO)),
                displayorder: Set(next_order),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            next_order += 1;
            inserted.push(item);
        }
        recompute_totals(&txn, invoice_id).await?;
        txn.commit().await?;

        info!(invoice_id, added = inserted.len(), "Invoice items added");
        Ok(inserted)
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(&self, item_id: i32, input: UpdateInvoiceItem) -> Result<invoice_item::Model, ServiceError> {
        let existing = self.find_item(item_id).await?;
        let candidate = InvoiceItemRow {
            sku: input.sku.clone().unwrap_or_else(|| existing.sku.clone()),
            description: input
                .description
                .clone()
                .unwrap_or_else(|| existing.description.clone()),
            quantity: Some(input.quantity.unwrap_or(existing.quantity)),
            price: Some(input.price.unwrap_or(existing.price)),
        };
        let errors: Vec<FieldError> = candidate
            .check(0)
            .into_iter()
            .map(|e| FieldError::new(e.field, e.message))
            .collect();
        if !errors.is_empty() {
            return Err(ServiceError::FieldErrors(errors));
        }

        let invoice_id = existing.invoice;
        let txn = self.db.begin().await?;
        let mut active: invoice_item::ActiveModel = existing.into();
        active.sku = Set(candidate.sku.trim().to_string());
        active.description = Set(candidate.description.trim().to_string());
        active.quantity = Set(candidate.quantity.unwrap_or(1));
        active.price = Set(candidate.price.unwrap_or(Decimal::ZERO));
        let item = active.update(&txn).await?;
        recompute_totals(&txn, invoice_id).await?;
        txn.commit().await?;
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, item_id: i32) -> Result<invoice::Model, ServiceError> {
        let existing = self.find_item(item_id).await?;
        let txn = self.db.begin().await?;
        invoice_item::Entity::delete_by_id(item_id).exec(&txn).await?;
        let invoice = recompute_totals(&txn, existing.invoice).await?;
        txn.commit().await?;
        Ok(invoice)
    }

    /// Emails the invoice to the account holder.
    #[instrument(skip(self))]
    pub async fn send_notification(&self, id: i32) -> Result<(), ServiceError> {
        let details = self.get_details(id).await?;
        let currency = locale::Entity::find_by_id(details.invoice.locale.clone())
            .one(&*self.db)
            .await?
            .map(|l| l.currency)
            .unwrap_or_else(|| self.default_currency.clone());

        let message = templates::invoice_notification(
            &details.invoice,
            &details.items,
            &details.account.email,
            &currency,
        );
        self.mailer.send(message).await?;
        info!(invoice_id = id, "Invoice notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn blank_rows_are_recognised() {
        assert!(InvoiceItemRow::default().is_blank());
        assert!(!InvoiceItemRow {
            sku: "A".into(),
            ..Default::default()
        }
        .is_blank());
    }

    #[test]
    fn row_errors_name_each_field() {
        let row = InvoiceItemRow {
            sku: "SKU-1".into(),
            description: String::new(),
            quantity: Some(0),
            price: Some(dec!(-1)),
        };
        let fields: Vec<String> = row.check(3).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["description", "quantity", "price"]);
        assert!(row.check(3).iter().all(|e| e.row == Some(3)));
    }

    #[test]
    fn oversized_rows_are_rejected_before_totalling() {
        let row = InvoiceItemRow {
            sku: "SKU-1".into(),
            description: "Bulk".into(),
            quantity: Some(2_000_000_000),
            price: Some(dec!(100000000000000000000)),
        };
        let fields: Vec<String> = row.check(0).into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["quantity", "price"]);

        let at_limit = InvoiceItemRow {
            quantity: Some(MAX_QUANTITY),
            price: Some(MAX_AMOUNT),
            ..row
        };
        assert!(at_limit.check(0).is_empty());
    }
}
