//! Short link entity for candidate submission URLs

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "short_links")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub short_code: String,

    #[sea_orm(column_type = "Text")]
    pub full_url: String,

    pub record_id: Option<Uuid>,

    pub expires_at: DateTimeWithTimeZone,

    pub is_used: bool,

    pub used_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub ip_address: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Check if link is expired
    pub fn is_expired(&self) -> bool {
        use chrono::Utc;
        self.expires_at < Utc::now()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
