use sea_orm::{entity::prelude::*, ActiveValue};

use crate::entities;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "resonators")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub location_id: i64,
    pub deployer_user_id: i64,
    pub slot_number: i32,
    pub level: i32,
    pub health: i32,
    pub max_health: i32,
    /// unix millis
    pub deployed_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn column<T, U>(id: i64, name: &str, value: T) -> Result<U, DbErr>
where
    U: TryFrom<T>,
    U::Error: std::fmt::Display,
    T: Copy + std::fmt::Display,
{
    U::try_from(value).map_err(|err| DbErr::Type(format!("Resonator {id} {name} {value}: {err}")))
}

impl TryFrom<Model> for entities::Resonator {
    type Error = DbErr;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(entities::Resonator {
            id: model.id,
            location_id: model.location_id,
            deployer_user_id: model.deployer_user_id,
            slot_number: column(model.id, "slot_number", model.slot_number)?,
            level: column(model.id, "level", model.level)?,
            health: column(model.id, "health", model.health)?,
            max_health: column(model.id, "max_health", model.max_health)?,
            deployed_at: ::chrono::DateTime::from_timestamp_millis(model.deployed_at)
                .ok_or_else(|| DbErr::Type(format!("Resonator {} deployed_at {}", model.id, model.deployed_at)))?,
        })
    }
}

impl TryFrom<&entities::Resonator> for ActiveModel {
    type Error = DbErr;

    fn try_from(reso: &entities::Resonator) -> Result<Self, Self::Error> {
        Ok(ActiveModel {
            id: ActiveValue::Set(reso.id()),
            location_id: ActiveValue::Set(reso.location_id()),
            deployer_user_id: ActiveValue::Set(reso.deployer_user_id()),
            slot_number: ActiveValue::Set(i32::from(reso.slot_number())),
            level: ActiveValue::Set(i32::from(reso.level())),
            health: ActiveValue::Set(column(reso.id(), "health", reso.health())?),
            max_health: ActiveValue::Set(column(reso.id(), "max_health", reso.max_health())?),
            deployed_at: ActiveValue::Set(reso.deployed_at().timestamp_millis()),
        })
    }
}
