//! Table definitions for the match tracker

use super::helpers::*;
use super::types::*;

/// Game modes a match can be played in
pub static GAME_MODES: EnumType = EnumType {
    name: "mode_enum",
    variants: &["versus", "ranked", "free", "coop", "unranked", "tourney"],
};

// =============================================================================
// Independent Tables (no FK dependencies)
// =============================================================================

pub static USERS: TableSchema = TableSchema {
    name: "users",
    columns: &[
        auto_primary_key("id"),
        Column::new("name", ColumnType::Text),
        Column::new("elo", ColumnType::Integer),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    relationships: &[
        Relationship::through("picks", "cos", "players", "user_id", "co_id").view_only(),
        Relationship::through("matches", "matches", "players", "user_id", "match_id").view_only(),
    ],
};

pub static COS: TableSchema = TableSchema {
    name: "cos",
    columns: &[
        auto_primary_key("id"),
        Column::required("name", ColumnType::Text),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    relationships: &[
        Relationship::through("picked_at", "matches", "players", "co_id", "match_id")
            .with_inverse("co_picks")
            .view_only(),
        Relationship::through("banned_at", "matches", "bans", "co_id", "match_id")
            .with_inverse("bans")
            .view_only(),
    ],
};

pub static MAPS: TableSchema = TableSchema {
    name: "maps",
    columns: &[
        auto_primary_key("id"),
        Column::required("name", ColumnType::Text),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    relationships: &[back_reference("matches", "matches", "map")],
};

// =============================================================================
// Matches
// =============================================================================

pub static MATCHES: TableSchema = TableSchema {
    name: "matches",
    columns: &[
        auto_primary_key("id"),
        Column::required("fow", ColumnType::Boolean),
        Column::enumeration("mode", &GAME_MODES),
        non_negative("winner_id"),
        Column::required("ended", ColumnType::Timestamp),
        Column::required("map_id", ColumnType::Integer),
    ],
    primary_key: &["id"],
    foreign_keys: &[ForeignKey::new("map_id", "maps")],
    relationships: &[
        owned_children("players", "players", "match"),
        Relationship::belongs_to("map", "maps", "map_id").with_inverse("matches"),
        Relationship::through("co_picks", "cos", "players", "match_id", "co_id")
            .with_inverse("picked_at")
            .view_only(),
        Relationship::through("bans", "cos", "bans", "match_id", "co_id")
            .with_inverse("banned_at"),
    ],
};

// =============================================================================
// Junction Tables
// =============================================================================

/// One user's seat in one match. `id` is the seat number within the match.
pub static PLAYERS: TableSchema = TableSchema {
    name: "players",
    columns: &[
        non_negative("id"),
        Column::required("match_id", ColumnType::Integer),
        Column::required("user_id", ColumnType::Integer),
        Column::required("co_id", ColumnType::Integer),
        non_negative("resulting_elo"),
    ],
    primary_key: &["id", "match_id"],
    foreign_keys: &[
        // Rows go away through the owner's orphan removal, not the engine
        ForeignKey::new("match_id", "matches"),
        ForeignKey::new("user_id", "users"),
        ForeignKey::new("co_id", "cos"),
    ],
    relationships: &[
        Relationship::belongs_to("user", "users", "user_id"),
        Relationship::belongs_to("pick", "cos", "co_id"),
        Relationship::belongs_to("match", "matches", "match_id").with_inverse("players"),
    ],
};

/// A commander banned during a match's draft.
pub static BANS: TableSchema = TableSchema {
    name: "bans",
    columns: &[
        Column::required("match_id", ColumnType::Integer),
        Column::required("co_id", ColumnType::Integer),
    ],
    primary_key: &["match_id", "co_id"],
    foreign_keys: &[
        cascading_foreign_key("match_id", "matches"),
        ForeignKey::new("co_id", "cos"),
    ],
    relationships: &[],
};

// =============================================================================
// Schema Registry
// =============================================================================

/// All table schemas in dependency order
pub static ALL_TABLES: &[&TableSchema] = &[
    // No dependencies
    &USERS,
    &COS,
    &MAPS,
    // Level 1
    &MATCHES,
    // Junction tables
    &PLAYERS,
    &BANS,
];

/// Get table schema by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

/// Get all table names
pub fn table_names() -> Vec<&'static str> {
    ALL_TABLES.iter().map(|t| t.name).collect()
}
