use std::collections::HashMap;

use chrono::DateTime;
use sea_orm::{
    sea_query::OnConflict, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use tracing::warn;

use crate::{
    engine::Store,
    entities::{Coordinate, Portal, Resonator, MAX_CAPACITY, SLOTS},
};

pub mod portal;
pub mod resonator;

/// Reads back every portal together with its live resonators.
pub async fn load<C: ConnectionTrait>(conn: &C) -> Result<Vec<Portal>, DbErr> {
    let mut resonators: HashMap<i64, Vec<Resonator>> = HashMap::new();
    for model in resonator::Entity::find().order_by_asc(resonator::Column::Id).all(conn).await? {
        let reso = Resonator::try_from(model)?;
        resonators.entry(reso.location_id).or_default().push(reso);
    }

    portal::Entity::find()
        .order_by_asc(portal::Column::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(|model| {
            let mut portal =
                Portal::new(model.id, model.name.clone(), Coordinate::new(model.latitude, model.longitude));
            portal.owner = model.owner()?;
            portal.last_attack_at = model.last_attack_at.and_then(DateTime::from_timestamp_millis);
            for reso in resonators.remove(&model.id).into_iter().flatten() {
                if reso.health == 0 {
                    warn!("Skipping dead resonator {} on portal {}", reso.id, model.id);
                    continue;
                }
                let slot = reso.slot_number;
                if !(1..=SLOTS).contains(&slot) {
                    return Err(DbErr::Type(format!("Portal {} has resonator {} on slot {slot}", model.id, reso.id)));
                }
                if reso.max_health > MAX_CAPACITY || reso.health > reso.max_health {
                    return Err(DbErr::Type(format!(
                        "Resonator {} health {}/{} out of bounds",
                        reso.id, reso.health, reso.max_health
                    )));
                }
                if portal.resonators.insert(slot, reso).is_some() {
                    return Err(DbErr::Type(format!("Portal {} has slot {slot} taken twice", model.id)));
                }
            }
            Ok(portal)
        })
        .collect()
}

/// Upserts the portal row and replaces its resonators in a single transaction.
pub async fn save_portal<C>(conn: &C, portal: &Portal) -> Result<(), DbErr>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = conn.begin().await?;

    portal::Entity::insert(portal::ActiveModel::from(portal))
        .on_conflict(
            OnConflict::column(portal::Column::Id)
                .update_columns([
                    portal::Column::Name,
                    portal::Column::Latitude,
                    portal::Column::Longitude,
                    portal::Column::OwnerFactionId,
                    portal::Column::LastAttackAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    resonator::Entity::delete_many()
        .filter(resonator::Column::LocationId.eq(portal.id()))
        .exec(&txn)
        .await?;

    let models = portal.resonators().map(resonator::ActiveModel::try_from).collect::<Result<Vec<_>, _>>()?;
    if !models.is_empty() {
        resonator::Entity::insert_many(models).exec_without_returning(&txn).await?;
    }

    txn.commit().await
}

impl Store for DatabaseConnection {
    async fn save(&self, portal: &Portal) -> Result<(), DbErr> {
        save_portal(self, portal).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    use super::{portal, resonator};

    use crate::entities::{Coordinate, FactionId, Portal, Resonator};

    fn reso_row(id: i64, slot: i32, health: i32) -> resonator::Model {
        resonator::Model {
            id,
            location_id: 1,
            deployer_user_id: 3,
            slot_number: slot,
            level: 6,
            health,
            max_health: 100,
            deployed_at: 1_700_000_000_000,
        }
    }

    fn portal_row(owner: Option<i64>) -> portal::Model {
        portal::Model {
            id: 1,
            name: String::from("Oratorio"),
            latitude: 45.708709,
            longitude: 12.217027,
            owner_faction_id: owner,
            last_attack_at: None,
        }
    }

    #[tokio::test]
    async fn load_rebuilds_portals() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![reso_row(1, 2, 40), reso_row(2, 1, 0), reso_row(3, 5, 100)]])
            .append_query_results([vec![portal_row(Some(2))]])
            .into_connection();

        let portals = super::load(&db).await.unwrap();
        assert_eq!(portals.len(), 1);
        let portal = &portals[0];
        assert_eq!(portal.owner(), Some(FactionId::RESISTANCE));
        assert_eq!(portal.resonators().map(Resonator::slot_number).collect::<Vec<_>>(), [2, 5]);
        assert_eq!(portal.total_health(), 140);
        assert_eq!(portal.resonator(5).map(|reso| reso.deployed_at().timestamp_millis()), Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn load_rejects_duplicate_slots() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![reso_row(1, 2, 40), reso_row(2, 2, 30)]])
            .append_query_results([vec![portal_row(Some(1))]])
            .into_connection();

        assert!(super::load(&db).await.is_err());
    }

    #[tokio::test]
    async fn load_rejects_bad_columns() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![reso_row(1, 300, 40)]])
            .into_connection();

        assert!(super::load(&db).await.is_err());
    }

    #[tokio::test]
    async fn load_rejects_impossible_resonators() {
        for row in [reso_row(1, 0, 40), reso_row(1, 9, 40), reso_row(1, 2, 140)] {
            let db = MockDatabase::new(DatabaseBackend::MySql)
                .append_query_results([vec![row]])
                .append_query_results([vec![portal_row(Some(1))]])
                .into_connection();

            assert!(matches!(super::load(&db).await, Err(DbErr::Type(_))));
        }
    }

    #[tokio::test]
    async fn save_runs_in_one_transaction() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_exec_results([
                MockExecResult { last_insert_id: 0, rows_affected: 1 },
                MockExecResult { last_insert_id: 0, rows_affected: 0 },
                MockExecResult { last_insert_id: 0, rows_affected: 1 },
            ])
            .into_connection();

        let mut portal = Portal::new(1, "Oratorio", Coordinate::new(45.708709, 12.217027));
        portal.owner = Some(FactionId::ENLIGHTENED);
        portal.resonators.insert(
            1,
            Resonator {
                id: 9,
                location_id: 1,
                deployer_user_id: 3,
                slot_number: 1,
                level: 2,
                health: 100,
                max_health: 100,
                deployed_at: Utc::now(),
            },
        );

        super::save_portal(&db, &portal).await.unwrap();
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn save_surfaces_failures() {
        let db = MockDatabase::new(DatabaseBackend::MySql).into_connection();
        let portal = Portal::new(1, "Oratorio", Coordinate::new(45.708709, 12.217027));
        assert!(super::save_portal(&db, &portal).await.is_err());
    }
}
