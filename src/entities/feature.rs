use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Featured content placed in a storefront display slot for a date window
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "features")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub shortname: String,
    #[sea_orm(nullable)]
    pub link: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub end_date: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub region: Option<i32>,
    pub display_slot: String,
    pub enabled: bool,
    pub priority: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
