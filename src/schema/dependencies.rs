use super::registry::SchemaError;
use super::types::TableSchema;
use std::collections::{HashMap, HashSet, VecDeque};

/// Orders tables so that FK parents come before their children
pub struct DependencyResolver {
    tables: Vec<&'static TableSchema>,
    /// Map of table name -> tables it depends on
    deps: HashMap<&'static str, HashSet<&'static str>>,
}

impl DependencyResolver {
    pub fn new(tables: &[&'static TableSchema]) -> Self {
        let deps = tables
            .iter()
            .map(|table| (table.name, table.dependencies()))
            .collect();

        Self {
            tables: tables.to_vec(),
            deps,
        }
    }

    fn get_table(&self, name: &str) -> Option<&'static TableSchema> {
        self.tables.iter().find(|t| t.name == name).copied()
    }

    /// Given a set of requested tables, resolve all required dependencies
    /// Returns tables in dependency order (parents before children)
    pub fn resolve_includes(&self, requested: &[&str]) -> Result<Vec<&'static TableSchema>, SchemaError> {
        let mut included: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = requested.iter().copied().collect();

        while let Some(table_name) = queue.pop_front() {
            if included.contains(table_name) {
                continue;
            }

            if self.get_table(table_name).is_none() {
                return Err(SchemaError::UnknownTable(table_name.to_string()));
            }

            included.insert(table_name);

            if let Some(table_deps) = self.deps.get(table_name) {
                for dep in table_deps {
                    if !included.contains(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        self.topological_sort(&included)
    }

    /// Return all tables in dependency order
    pub fn all_tables_ordered(&self) -> Result<Vec<&'static TableSchema>, SchemaError> {
        let all: HashSet<&str> = self.tables.iter().map(|t| t.name).collect();
        self.topological_sort(&all)
    }

    /// Topological sort of tables by dependencies.
    /// Ties keep declaration order so generated DDL is stable.
    fn topological_sort(
        &self,
        included: &HashSet<&str>,
    ) -> Result<Vec<&'static TableSchema>, SchemaError> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut temp_visited: HashSet<&str> = HashSet::new();

        for table in &self.tables {
            if included.contains(table.name) && !visited.contains(table.name) {
                self.visit(
                    table.name,
                    included,
                    &mut visited,
                    &mut temp_visited,
                    &mut result,
                )?;
            }
        }

        Ok(result)
    }

    fn visit<'a>(
        &self,
        name: &'a str,
        included: &HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
        temp_visited: &mut HashSet<&'a str>,
        result: &mut Vec<&'static TableSchema>,
    ) -> Result<(), SchemaError> {
        if temp_visited.contains(name) {
            return Err(SchemaError::CircularDependency(name.to_string()));
        }
        if visited.contains(name) {
            return Ok(());
        }

        temp_visited.insert(name);

        if let Some(table) = self.get_table(name) {
            // Walk FKs in declaration order rather than through the hash set
            for fk in table.foreign_keys {
                let dep = fk.references_table;
                // Self-references don't constrain creation order
                if dep != name && included.contains(dep) {
                    self.visit(dep, included, visited, temp_visited, result)?;
                }
            }
        }

        temp_visited.remove(name);
        visited.insert(name);

        if let Some(table) = self.get_table(name) {
            result.push(table);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::ALL_TABLES;
    use crate::schema::types::{Column, ColumnType, ForeignKey};

    fn names(tables: &[&TableSchema]) -> Vec<&'static str> {
        tables.iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_resolve_players_includes_parents() {
        let resolver = DependencyResolver::new(ALL_TABLES);
        let tables = resolver.resolve_includes(&["players"]).unwrap();
        let names = names(&tables);

        assert_eq!(names.len(), 5);
        assert!(!names.contains(&"bans"));

        // Parents should come before children
        let players_pos = names.iter().position(|&n| n == "players").unwrap();
        let matches_pos = names.iter().position(|&n| n == "matches").unwrap();
        let maps_pos = names.iter().position(|&n| n == "maps").unwrap();

        assert!(maps_pos < matches_pos);
        assert!(matches_pos < players_pos);
    }

    #[test]
    fn test_all_tables_keep_declaration_order() {
        let resolver = DependencyResolver::new(ALL_TABLES);
        let tables = resolver.all_tables_ordered().unwrap();
        assert_eq!(
            names(&tables),
            vec!["users", "cos", "maps", "matches", "players", "bans"]
        );
    }

    #[test]
    fn test_unknown_table_error() {
        let resolver = DependencyResolver::new(ALL_TABLES);
        let result = resolver.resolve_includes(&["nonexistent"]);
        assert!(matches!(result, Err(SchemaError::UnknownTable(_))));
    }

    static LEFT: TableSchema = TableSchema {
        name: "left",
        columns: &[Column::required("right_id", ColumnType::Integer)],
        primary_key: &["right_id"],
        foreign_keys: &[ForeignKey::new("right_id", "right")],
        relationships: &[],
    };

    static RIGHT: TableSchema = TableSchema {
        name: "right",
        columns: &[Column::required("left_id", ColumnType::Integer)],
        primary_key: &["left_id"],
        foreign_keys: &[ForeignKey::new("left_id", "left")],
        relationships: &[],
    };

    #[test]
    fn test_cycle_detected() {
        let resolver = DependencyResolver::new(&[&LEFT, &RIGHT]);
        assert!(matches!(
            resolver.all_tables_ordered(),
            Err(SchemaError::CircularDependency(_))
        ));
    }
}
