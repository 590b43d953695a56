//! Verification evidence entity, one per record

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "verifications")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub record_id: Uuid,

    /// Empty for candidate self-submissions
    pub field_officer_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub respondent_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub respondent_relationship: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub respondent_contact: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub period_of_stay: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub ownership_type: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub owner_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub relation_with_owner: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub address: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub city: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub state: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub pincode: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub landmark: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub verification_notes: Option<String>,

    pub verification_date: Option<Date>,

    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub insufficient_reason: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub verified_by: Option<String>,

    /// submitted | insufficient
    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub gps_lat: f64,

    pub gps_lng: f64,

    /// Document URLs as JSONB array
    #[sea_orm(column_type = "JsonBinary")]
    pub documents: serde_json::Value,

    /// Photo URLs as JSONB array
    #[sea_orm(column_type = "JsonBinary")]
    pub photos: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub selfie_with_house: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub candidate_with_respondent: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub officer_signature: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub respondent_signature: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
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
