use rust_decimal::Decimal;
use std::fmt::Write;

use super::MailMessage;
use crate::entities::{invoice, invoice_item, order, order_item};

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

pub fn order_confirmation(
    order: &order::Model,
    items: &[order_item::Model],
    currency: &str,
) -> MailMessage {
    let mut body = format!("Thank you for your order #{}.\n\n", order.id);
    for item in items {
        let _ = writeln!(
            body,
            "{} x {} ({}) @ {} = {}",
            item.quantity,
            item.description,
            item.sku,
            money(item.price),
            money(item.extension)
        );
    }
    let _ = writeln!(body);
    let _ = writeln!(body, "Subtotal: {} {}", money(order.subtotal), currency);
    let _ = writeln!(body, "Shipping: {} {}", money(order.shipping_total), currency);
    if !order.surcharge_total.is_zero() {
        let _ = writeln!(body, "Surcharge: {} {}", money(order.surcharge_total), currency);
    }
    if !order.promotion_total.is_zero() {
        let _ = writeln!(body, "Promotion: -{} {}", money(order.promotion_total), currency);
    }
    let _ = writeln!(body, "Tax: {} {}", money(order.tax_total), currency);
    let _ = writeln!(body, "Total: {} {}", money(order.total), currency);

    MailMessage {
        to: order.email.clone(),
        subject: format!("Order confirmation #{}", order.id),
        body,
    }
}

pub fn invoice_notification(
    invoice: &invoice::Model,
    items: &[invoice_item::Model],
    to: &str,
    currency: &str,
) -> MailMessage {
    let mut body = format!("Invoice #{}\n\n", invoice.id);
    for item in items {
        let _ = writeln!(
            body,
            "{} x {} ({}) @ {}",
            item.quantity,
            item.description,
            item.sku,
            money(item.price)
        );
    }
    let _ = writeln!(body);
    let _ = writeln!(body, "Items: {} {}", money(invoice.item_total), currency);
    let _ = writeln!(body, "Shipping: {} {}", money(invoice.shipping_total), currency);
    let _ = writeln!(body, "Tax: {} {}", money(invoice.tax_total), currency);
    let _ = writeln!(body, "Total due: {} {}", money(invoice.total), currency);
    if let Some(comments) = invoice.comments.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(body, "\n{}", comments);
    }

    MailMessage {
        to: to.to_string(),
        subject: format!("Invoice #{}", invoice.id),
        body,
    }
}
