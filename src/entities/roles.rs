use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Well-known role slugs seeded by the accounts migration.
pub const ADMIN: &str = "admin";
pub const MANAGER: &str = "manager";
pub const CUSTOMER: &str = "customer";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "roles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
