use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Admin API",
        version = "0.3.0",
        description = r#"
# Storefront back office

Staff-facing API for catalogs, categories, products and items, orders, invoices,
customer accounts, pricing, sales reports and category/product images.

## Authentication

Every endpoint under `/api/v1` requires a bearer token issued for a staff member:

```
Authorization: Bearer <your-jwt-token>
```

The token's permission list must include the permission of the area being used
(`catalog:manage`, `orders:manage`, `accounts:manage`, `pricing:manage`,
`reports:read`). A missing or invalid token yields 401, a missing permission 403.

## Errors

Failures share one body. Form-style validation failures list each field, and for
multi-row input each row index, under `details`:

```json
{
  "error": "Bad Request",
  "message": "Validation failed",
  "details": [{ "row": 2, "field": "quantity", "message": "Quantity must be at least 1" }],
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Catalogs, categories, products, items and images"),
        (name = "Orders", description = "Orders and invoices"),
        (name = "Accounts", description = "Customer accounts"),
        (name = "Pricing", description = "Sale discounts, price ranges and features"),
        (name = "Reports", description = "Sales reports")
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::errors::FieldError,
            crate::handlers::common::IdList,
            crate::handlers::common::PaginationMeta,
            crate::services::DeleteSummary,
            crate::services::DeleteEntry,

            crate::services::geography::CreateRegion,
            crate::services::geography::CreateLocale,
            crate::services::geography::CreateCountry,
            crate::services::geography::CreateProvState,

            crate::services::catalogs::CreateCatalog,
            crate::services::catalogs::UpdateCatalog,
            crate::services::categories::CreateCategory,
            crate::services::categories::UpdateCategory,
            crate::services::categories::CategoryNavEntry,
            crate::services::products::CreateProduct,
            crate::services::products::UpdateProduct,
            crate::services::products::ProductSearch,
            crate::services::products::CreateAttribute,
            crate::services::items::CreateItem,
            crate::services::items::UpdateItem,
            crate::services::items::RegionBinding,
            crate::services::items::CreateItemGroup,
            crate::services::items::CreateMinimumQuantityGroup,

            crate::services::orders::OrderTotals,
            crate::services::orders::OrderSearch,
            crate::services::invoices::CreateInvoice,
            crate::services::invoices::UpdateInvoice,
            crate::services::invoices::InvoiceItemRow,
            crate::services::invoices::UpdateInvoiceItem,

            crate::services::accounts::CreateAccount,
            crate::services::accounts::UpdateAccount,
            crate::services::accounts::AccountSearch,
            crate::services::accounts::AddressInput,
            crate::services::accounts::PaymentMethodInput,

            crate::services::pricing::SaleDiscountInput,
            crate::services::pricing::PriceRangeInput,
            crate::services::pricing::FeatureInput,

            crate::services::reports::MonthlyTotals,
            crate::services::reports::RegionSales,
            crate::services::reports::SalesByRegion,
            crate::services::reports::YearSales
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_request_schemas() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Storefront Admin API"));
        assert!(json.contains("InvoiceItemRow"));
        assert!(json.contains("DeleteSummary"));
    }
}
