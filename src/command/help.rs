use super::Response;

const HELP_MESSAGE: &str = r#"Portal Engine

Every request is a single JSON line: {"agent": {...}, "command": "<name>", ...fields}

`agent` fields:
● `userId` - acting user, integer
● `factionId` - user faction, integer, 0 or missing for none
● `isBanned` - banned users can't act, bool
● `role` - `USER` (default) or `ADMIN`

Commands:
● `help` - this message
● `locations` `minLat` `minLon` `maxLat` `maxLon` - portals inside the given box
● `location` `portalId` - portal details
● `status` `portalId` - portal health and attack status
● `resonators` `portalId` - resonators of a portal
● `deploy` `portalId` `slot_number` `level` - deploy a resonator in an empty slot (1-8)
● `attack` `portalId` `damage` - attack an enemy portal, lower slots take damage first
● `repair` `portalId` `resonator_slot` `repair_amount` - repair a resonator of your faction
● `create_location` `name` `latitude` `longitude` - create a neutral portal, admin only

Example
{"agent": {"userId": 1, "factionId": 2}, "command": "attack", "portalId": 3, "damage": 50}
Hits portal 3 for 50 damage as a Resistance agent
"#;

pub fn execute() -> Response {
    Response { code: 200, message: String::from(HELP_MESSAGE), data: None }
}
