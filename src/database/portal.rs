use sea_orm::{entity::prelude::*, ActiveValue};

use crate::entities::{self, FactionId};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "portals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// null for neutral portals
    pub owner_faction_id: Option<i64>,
    /// unix millis of the latest accepted attack
    pub last_attack_at: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub(super) fn owner(&self) -> Result<Option<FactionId>, DbErr> {
        self.owner_faction_id
            .map(|id| {
                u32::try_from(id)
                    .map(FactionId)
                    .map_err(|err| DbErr::Type(format!("Portal {} faction {id}: {err}", self.id)))
            })
            .transpose()
    }
}

impl From<&entities::Portal> for ActiveModel {
    fn from(portal: &entities::Portal) -> Self {
        ActiveModel {
            id: ActiveValue::Set(portal.id()),
            name: ActiveValue::Set(portal.name().to_owned()),
            latitude: ActiveValue::Set(portal.coordinate().latitude),
            longitude: ActiveValue::Set(portal.coordinate().longitude),
            owner_faction_id: ActiveValue::Set(portal.owner().map(|FactionId(id)| i64::from(id))),
            last_attack_at: ActiveValue::Set(portal.last_attack_at().map(|at| at.timestamp_millis())),
        }
    }
}
