use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::value::SqlValue;
use super::Entity;
use crate::schema::{TableSchema, BANS, COS, MAPS, MATCHES, PLAYERS, USERS};

/// Mode a match was played in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Versus,
    Ranked,
    Free,
    Coop,
    Unranked,
    Tourney,
}

impl GameMode {
    pub const ALL: [GameMode; 6] = [
        GameMode::Versus,
        GameMode::Ranked,
        GameMode::Free,
        GameMode::Coop,
        GameMode::Unranked,
        GameMode::Tourney,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Versus => "versus",
            GameMode::Ranked => "ranked",
            GameMode::Free => "free",
            GameMode::Coop => "coop",
            GameMode::Unranked => "unranked",
            GameMode::Tourney => "tourney",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text that isn't one of the six modes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game mode `{0}`")]
pub struct UnknownGameMode(pub String);

impl FromStr for GameMode {
    type Err = UnknownGameMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| UnknownGameMode(s.to_string()))
    }
}

impl FromSql for GameMode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A player account
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    /// Generated on insert when unset
    pub id: Option<i64>,
    pub name: Option<String>,
    pub elo: Option<i64>,
}

/// A commander
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Co {
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pub id: Option<i64>,
    pub name: String,
}

/// One completed game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Option<i64>,
    /// Fog of war
    pub fow: bool,
    pub mode: GameMode,
    pub winner_id: i64,
    pub ended: DateTime<Utc>,
    pub map_id: i64,
}

/// One user's seat in one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Seat number within the match
    pub id: i64,
    pub match_id: i64,
    pub user_id: i64,
    pub co_id: i64,
    pub resulting_elo: i64,
}

/// A commander banned before a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    pub match_id: i64,
    pub co_id: i64,
}

/// Leading `id` column, left out when the engine should generate it
fn auto_id(id: Option<i64>) -> Option<(&'static str, SqlValue)> {
    id.map(|id| ("id", SqlValue::Integer(id)))
}

impl Entity for User {
    fn table() -> &'static TableSchema {
        &USERS
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        auto_id(self.id)
            .into_iter()
            .chain([
                ("name", self.name.clone().into()),
                ("elo", self.elo.into()),
            ])
            .collect()
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            elo: row.get("elo")?,
        })
    }
}

impl Entity for Co {
    fn table() -> &'static TableSchema {
        &COS
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        auto_id(self.id)
            .into_iter()
            .chain([("name", self.name.clone().into())])
            .collect()
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

impl Entity for Map {
    fn table() -> &'static TableSchema {
        &MAPS
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        auto_id(self.id)
            .into_iter()
            .chain([("name", self.name.clone().into())])
            .collect()
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

impl Entity for Match {
    fn table() -> &'static TableSchema {
        &MATCHES
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        auto_id(self.id)
            .into_iter()
            .chain([
                ("fow", self.fow.into()),
                ("mode", self.mode.as_str().into()),
                ("winner_id", self.winner_id.into()),
                ("ended", self.ended.into()),
                ("map_id", self.map_id.into()),
            ])
            .collect()
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            fow: row.get("fow")?,
            mode: row.get("mode")?,
            winner_id: row.get("winner_id")?,
            ended: row.get("ended")?,
            map_id: row.get("map_id")?,
        })
    }
}

impl Entity for Player {
    fn table() -> &'static TableSchema {
        &PLAYERS
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("id", self.id.into()),
            ("match_id", self.match_id.into()),
            ("user_id", self.user_id.into()),
            ("co_id", self.co_id.into()),
            ("resulting_elo", self.resulting_elo.into()),
        ]
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            match_id: row.get("match_id")?,
            user_id: row.get("user_id")?,
            co_id: row.get("co_id")?,
            resulting_elo: row.get("resulting_elo")?,
        })
    }
}

impl Entity for Ban {
    fn table() -> &'static TableSchema {
        &BANS
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("match_id", self.match_id.into()),
            ("co_id", self.co_id.into()),
        ]
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            match_id: row.get("match_id")?,
            co_id: row.get("co_id")?,
        })
    }
}
