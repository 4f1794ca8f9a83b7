/*!
 * Permissions granted to back-office staff, one per admin area.
 */

/// Permission string constants for compile-time safety
pub mod consts {
    pub const CATALOG_MANAGE: &str = "catalog:manage";
    pub const ORDERS_MANAGE: &str = "orders:manage";
    pub const ACCOUNTS_MANAGE: &str = "accounts:manage";
    pub const PRICING_MANAGE: &str = "pricing:manage";
    pub const REPORTS_READ: &str = "reports:read";
}

/// Every permission known to the service
pub const ALL: &[&str] = &[
    consts::CATALOG_MANAGE,
    consts::ORDERS_MANAGE,
    consts::ACCOUNTS_MANAGE,
    consts::PRICING_MANAGE,
    consts::REPORTS_READ,
];
