//! Category catalog: tree ownership and structural operations.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{CategoriesRepo, CreateCategoryParams, RepoError};
use crate::domain::categories::CategoryTree;
use crate::domain::entities::CategoryRecord;
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugError, derive_slug};

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<Uuid>,
    pub sort_order: i32,
}

/// Owns the category tree. Structural mutations (create, move, toggle) take
/// the tree lock for writing; derived reads (ancestor path, descendant set)
/// take it for reading, so a traversal can never observe a half-moved
/// subtree.
#[derive(Clone)]
pub struct CategoryCatalog {
    repo: Arc<dyn CategoriesRepo>,
    tree_lock: Arc<RwLock<()>>,
}

impl CategoryCatalog {
    pub fn new(repo: Arc<dyn CategoriesRepo>) -> Self {
        Self {
            repo,
            tree_lock: Arc::new(RwLock::new(())),
        }
    }

    pub async fn create_node(&self, node: NewCategory) -> Result<CategoryRecord, AppError> {
        let _guard = self.tree_lock.write().await;

        if let Some(parent_id) = node.parent_id {
            let parent = self
                .repo
                .fetch(parent_id)
                .await?
                .ok_or_else(|| DomainError::validation(format!("parent category {parent_id} does not exist")))?;
            if !parent.active {
                return Err(DomainError::validation(format!(
                    "parent category `{}` is deactivated",
                    parent.slug
                ))
                .into());
            }
        }

        let slug = derive_slug(&node.name).map_err(slug_to_validation)?;

        let created = self
            .repo
            .insert(CreateCategoryParams {
                slug,
                name: node.name,
                description: node.description,
                icon: node.icon,
                parent_id: node.parent_id,
                sort_order: node.sort_order,
            })
            .await
            .map_err(|err| AppError::from_repo_as_domain(err, "category"))?;

        info!(category = %created.slug, parent = ?created.parent_id, "category created");
        Ok(created)
    }

    pub async fn move_node(
        &self,
        node_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<CategoryRecord, AppError> {
        let _guard = self.tree_lock.write().await;

        let tree = self.load_tree().await?;
        if !tree.contains(node_id) {
            return Err(DomainError::not_found("category").into());
        }

        if let Some(parent_id) = new_parent_id {
            let Some(parent) = tree.get(parent_id) else {
                return Err(DomainError::not_found("category").into());
            };
            if !parent.active {
                return Err(DomainError::validation(format!(
                    "new parent category `{}` is deactivated",
                    parent.slug
                ))
                .into());
            }
            if tree.would_cycle(node_id, parent_id) {
                return Err(DomainError::cycle(format!(
                    "cannot re-parent {node_id} under its own subtree"
                ))
                .into());
            }
        }

        let moved = self
            .repo
            .set_parent(node_id, new_parent_id)
            .await
            .map_err(|err| AppError::from_repo_as_domain(err, "category"))?;
        let path = self.load_tree().await?.full_path(node_id)?;
        info!(category = %moved.slug, path = %path, "category moved");
        Ok(moved)
    }

    /// Deactivation hides the node and its listings from default filters;
    /// nothing is deleted.
    pub async fn set_active(&self, node_id: Uuid, active: bool) -> Result<CategoryRecord, AppError> {
        let _guard = self.tree_lock.write().await;
        self.repo
            .set_active(node_id, active)
            .await
            .map_err(|err| AppError::from_repo_as_domain(err, "category"))
    }

    /// Ordered ancestors, root→self inclusive.
    pub async fn ancestor_path(&self, node_id: Uuid) -> Result<Vec<CategoryRecord>, AppError> {
        let _guard = self.tree_lock.read().await;
        let tree = self.load_tree().await?;
        let path = tree.ancestor_path(node_id)?;
        Ok(path.into_iter().cloned().collect())
    }

    /// Descendant id set of `node_id`, excluding the node itself. Reflects
    /// the live tree at call time.
    pub async fn descendant_ids(&self, node_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        let _guard = self.tree_lock.read().await;
        let tree = self.load_tree().await?;
        if !tree.contains(node_id) {
            return Err(DomainError::not_found("category").into());
        }
        Ok(tree.descendant_ids(node_id))
    }

    pub async fn fetch(&self, node_id: Uuid) -> Result<CategoryRecord, AppError> {
        self.repo
            .fetch(node_id)
            .await?
            .ok_or_else(|| DomainError::not_found("category").into())
    }

    /// Resolve a set of ids, requiring every one to exist and be active.
    /// Shared with the listing store's category validation.
    pub async fn resolve_active(&self, ids: &[Uuid]) -> Result<Vec<CategoryRecord>, AppError> {
        let found = self.repo.fetch_many(ids).await?;
        if found.len() != ids.len() {
            let known: HashSet<Uuid> = found.iter().map(|c| c.id).collect();
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !known.contains(id))
                .map(Uuid::to_string)
                .collect();
            return Err(DomainError::validation(format!(
                "unknown categories: {}",
                missing.join(", ")
            ))
            .into());
        }
        if let Some(inactive) = found.iter().find(|c| !c.active) {
            return Err(DomainError::validation(format!(
                "category `{}` is deactivated",
                inactive.slug
            ))
            .into());
        }
        Ok(found)
    }

    async fn load_tree(&self) -> Result<CategoryTree, RepoError> {
        Ok(CategoryTree::from_snapshot(self.repo.snapshot().await?))
    }
}

fn slug_to_validation(err: SlugError) -> AppError {
    DomainError::validation(err.to_string()).into()
}
