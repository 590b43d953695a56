//! Single-use candidate submission token entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "candidate_tokens")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// 64 hex characters
    #[sea_orm(column_type = "Text", unique)]
    pub token: String,

    pub record_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub candidate_name: String,

    #[sea_orm(column_type = "Text")]
    pub candidate_email: String,

    #[sea_orm(column_type = "Text")]
    pub candidate_mobile: String,

    pub expires_at: DateTimeWithTimeZone,

    pub is_used: bool,

    pub used_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub ip_address: Option<String>,

    /// not_sent | sent | failed
    #[sea_orm(column_type = "Text")]
    pub email_status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub email_error: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub sms_status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub sms_error: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        use chrono::Utc;
        self.expires_at < Utc::now()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::record::Entity",
        from = "Column::RecordId",
        to = "super::record::Column::Id",
        on_delete = "Cascade"
    )]
    Record,
}

impl Related<super::record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Record.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
