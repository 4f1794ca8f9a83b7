use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "account_payment_methods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub account: i32,
    pub payment_type: PaymentType,
    pub card_fullname: String,
    /// Last four digits only; full numbers are never stored
    pub card_lastdigits: String,
    pub card_expiry_month: i32,
    pub card_expiry_year: i32,
    pub default_method: bool,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[sea_orm(string_value = "visa")]
    Visa,
    #[sea_orm(string_value = "mastercard")]
    Mastercard,
    #[sea_orm(string_value = "amex")]
    Amex,
    #[sea_orm(string_value = "paypal")]
    Paypal,
}

impl PaymentType {
    pub fn is_card(self) -> bool {
        !matches!(self, PaymentType::Paypal)
    }
}
