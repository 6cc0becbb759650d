//! Category tree math over an id-addressed snapshot.
//!
//! The tree is stored as parent back-references. Traversal never follows
//! object identity: callers load a snapshot of the live rows into a
//! [`CategoryTree`] arena and walk it by id, so a half-applied structural
//! change can never be observed mid-walk. Structural writers are expected to
//! serialize against snapshotting (the catalog service holds the lock).

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::entities::CategoryRecord;
use crate::domain::error::DomainError;

pub struct CategoryTree {
    nodes: HashMap<Uuid, CategoryRecord>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl CategoryTree {
    pub fn from_snapshot(rows: Vec<CategoryRecord>) -> Self {
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in &rows {
            if let Some(parent) = row.parent_id {
                children.entry(parent).or_default().push(row.id);
            }
        }

        let nodes: HashMap<Uuid, CategoryRecord> =
            rows.into_iter().map(|row| (row.id, row)).collect();

        for ids in children.values_mut() {
            ids.sort_by(|a, b| {
                let a = &nodes[a];
                let b = &nodes[b];
                a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name))
            });
        }

        Self { nodes, children }
    }

    pub fn get(&self, id: Uuid) -> Option<&CategoryRecord> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Ancestors root→self, inclusive of `id` itself.
    ///
    /// A repeated node while walking parent links means the stored tree is
    /// corrupted; that is an invariant violation, not a caller error.
    pub fn ancestor_path(&self, id: Uuid) -> Result<Vec<&CategoryRecord>, DomainError> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = Some(id);

        while let Some(current) = cursor {
            if !seen.insert(current) {
                return Err(DomainError::invariant(format!(
                    "category parent chain revisits {current}"
                )));
            }
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| match path.is_empty() {
                    true => DomainError::not_found("category"),
                    false => DomainError::invariant(format!(
                        "category {current} referenced as parent but missing"
                    )),
                })?;
            path.push(node);
            cursor = node.parent_id;
        }

        path.reverse();
        Ok(path)
    }

    /// Human-readable full path, root→self, `Boats > Sailboats > Catamarans`.
    pub fn full_path(&self, id: Uuid) -> Result<String, DomainError> {
        let names: Vec<&str> = self
            .ancestor_path(id)?
            .iter()
            .map(|node| node.name.as_str())
            .collect();
        Ok(names.join(" > "))
    }

    /// Every id reachable by following child links from `id`, excluding `id`
    /// itself. Depth-first, iterative.
    pub fn descendant_ids(&self, id: Uuid) -> HashSet<Uuid> {
        let mut out = HashSet::new();
        let mut stack: Vec<Uuid> = self.children.get(&id).cloned().unwrap_or_default();

        while let Some(current) = stack.pop() {
            if out.insert(current)
                && let Some(kids) = self.children.get(&current)
            {
                stack.extend(kids.iter().copied());
            }
        }

        out
    }

    /// Re-parenting `node` under `new_parent` creates a cycle exactly when
    /// the new parent is the node itself or one of its descendants.
    pub fn would_cycle(&self, node: Uuid, new_parent: Uuid) -> bool {
        node == new_parent || self.descendant_ids(node).contains(&new_parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn category(name: &str, parent_id: Option<Uuid>) -> CategoryRecord {
        let now = OffsetDateTime::now_utc();
        CategoryRecord {
            id: Uuid::new_v4(),
            slug: name.to_lowercase(),
            name: name.to_string(),
            description: None,
            icon: None,
            parent_id,
            active: true,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// boats ── sail ── catamaran
    ///   │        └──── monohull
    ///   └─ motor
    fn sample() -> (CategoryTree, Uuid, Uuid, Uuid, Uuid, Uuid) {
        let boats = category("Boats", None);
        let sail = category("Sailboats", Some(boats.id));
        let motor = category("Motorboats", Some(boats.id));
        let cat = category("Catamarans", Some(sail.id));
        let mono = category("Monohulls", Some(sail.id));
        let ids = (boats.id, sail.id, motor.id, cat.id, mono.id);
        let tree = CategoryTree::from_snapshot(vec![boats, sail, motor, cat, mono]);
        (tree, ids.0, ids.1, ids.2, ids.3, ids.4)
    }

    #[test]
    fn descendants_cover_reachable_children_and_exclude_root() {
        let (tree, boats, sail, motor, cat, mono) = sample();

        let all = tree.descendant_ids(boats);
        assert_eq!(all, HashSet::from([sail, motor, cat, mono]));
        assert!(!all.contains(&boats));

        assert_eq!(tree.descendant_ids(sail), HashSet::from([cat, mono]));
        assert!(tree.descendant_ids(cat).is_empty());
    }

    #[test]
    fn ancestor_path_runs_root_to_self() {
        let (tree, boats, sail, _, cat, _) = sample();
        let path: Vec<Uuid> = tree
            .ancestor_path(cat)
            .expect("path")
            .iter()
            .map(|node| node.id)
            .collect();
        assert_eq!(path, vec![boats, sail, cat]);

        assert_eq!(
            tree.full_path(cat).expect("path"),
            "Boats > Sailboats > Catamarans"
        );
    }

    #[test]
    fn cycle_detection_matches_descendant_set() {
        let (tree, boats, sail, motor, cat, _) = sample();
        assert!(tree.would_cycle(sail, sail));
        assert!(tree.would_cycle(sail, cat));
        assert!(tree.would_cycle(boats, cat));
        assert!(!tree.would_cycle(sail, motor));
        assert!(!tree.would_cycle(cat, boats));
    }

    #[test]
    fn corrupted_parent_chain_is_fatal() {
        let mut a = category("A", None);
        let b = category("B", Some(a.id));
        a.parent_id = Some(b.id);
        let b_id = b.id;
        let tree = CategoryTree::from_snapshot(vec![a, b]);

        let err = tree.ancestor_path(b_id).expect_err("cycle in stored data");
        assert!(matches!(err, DomainError::Invariant { .. }));
    }

    #[test]
    fn unknown_node_is_not_found() {
        let (tree, ..) = sample();
        let err = tree.ancestor_path(Uuid::new_v4()).expect_err("missing");
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
