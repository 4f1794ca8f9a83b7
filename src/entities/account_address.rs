use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Saved address of an account. At most one address per account carries each
/// default flag.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account_addresses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub account: i32,
    pub fullname: String,
    pub line1: String,
    #[sea_orm(nullable)]
    pub line2: Option<String>,
    pub city: String,
    #[sea_orm(nullable)]
    pub provstate: Option<i32>,
    /// Free-form province for countries without a provstate list
    #[sea_orm(nullable)]
    pub provstate_other: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    pub default_billing: bool,
    pub default_shipping: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::Account",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
