use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of quantity-affecting events recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEntryType {
    Entry,
    Sale,
    Return,
    Adjustment,
    Loss,
}

impl LogEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEntryType::Entry => "ENTRY",
            LogEntryType::Sale => "SALE",
            LogEntryType::Return => "RETURN",
            LogEntryType::Adjustment => "ADJUSTMENT",
            LogEntryType::Loss => "LOSS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ENTRY" => Some(LogEntryType::Entry),
            "SALE" => Some(LogEntryType::Sale),
            "RETURN" => Some(LogEntryType::Return),
            "ADJUSTMENT" => Some(LogEntryType::Adjustment),
            "LOSS" => Some(LogEntryType::Loss),
            _ => None,
        }
    }
}

/// Journal entry for one quantity change on a stock lot.
///
/// Rows are append-only with a single exception: reverting an entry sets
/// `is_reverted` and `reverted_by_id` once, after which the row is
/// terminal. `quantity_change` is a signed delta, so
/// `previous_quantity + quantity_change == new_quantity` always holds
/// (a SALE entry carries a negative delta).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_lot_id: Uuid,
    pub company_id: Uuid,
    pub r#type: String, // stored as string, convert via LogEntryType
    pub quantity_change: i32,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub is_manual: bool,
    pub is_reverted: bool,
    pub source_id: Option<Uuid>,
    pub source_type: Option<String>,
    pub note: Option<String>,
    pub user_id: Option<Uuid>,
    pub reverted_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn entry_type(&self) -> Option<LogEntryType> {
        LogEntryType::from_str(&self.r#type)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::StockLotId",
        to = "super::stock_lot::Column::Id"
    )]
    StockLot,
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLot.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
