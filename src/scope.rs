//! Branch visibility.
//!
//! Every read and write in the API is bounded by a [`BranchScope`]: the set
//! of branch ids the authenticated user may see. Handlers resolve the scope
//! once per request and pass its ids down to the query layer, so the SQL
//! never has to know about roles.

use std::collections::BTreeSet;

use anyhow::{Context, Result};

use crate::db::OpsDb;
use crate::models::{Role, User};

/// The set of branches a user is allowed to operate on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchScope {
    ids: BTreeSet<i64>,
}

impl BranchScope {
    pub fn contains(&self, branch_id: i64) -> bool {
        self.ids.contains(&branch_id)
    }

    /// Scope ids in ascending order, in the shape the query layer takes.
    pub fn ids(&self) -> Vec<i64> {
        self.ids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve the branches visible to `user`.
///
/// A user stationed at a head branch sees the head plus all branches
/// reporting to it. At a sub-branch, only Owners get the same full view
/// (resolved through the head); everyone else is confined to their own
/// branch.
pub fn resolve_scope(db: &OpsDb, user: &User) -> Result<BranchScope> {
    let branch = db
        .get_branch(user.branch_id)?
        .context("User's branch not found")?;

    let mut ids = BTreeSet::new();
    match branch.head_branch_id {
        None => {
            ids.insert(branch.id);
            ids.extend(db.sub_branch_ids(branch.id)?);
        }
        Some(head_id) if user.role == Role::Owner => {
            ids.insert(head_id);
            ids.extend(db.sub_branch_ids(head_id)?);
        }
        Some(_) => {
            ids.insert(branch.id);
        }
    }
    Ok(BranchScope { ids })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(db: &OpsDb) -> (i64, i64, i64) {
        let head = db.create_branch("Head", None).unwrap();
        let sub_a = db.create_branch("Sub A", Some(head.id)).unwrap();
        let sub_b = db.create_branch("Sub B", Some(head.id)).unwrap();
        (head.id, sub_a.id, sub_b.id)
    }

    #[test]
    fn test_head_branch_user_sees_whole_network() -> Result<()> {
        let db = OpsDb::new_in_memory()?;
        let (head, sub_a, sub_b) = seed(&db);
        let user = db.create_user("back", "9100000001", "h", &Role::BackOffice, head)?;

        let scope = resolve_scope(&db, &user)?;
        assert_eq!(scope.ids(), vec![head, sub_a, sub_b]);
        assert!(scope.contains(sub_b));
        Ok(())
    }

    #[test]
    fn test_sub_branch_user_sees_only_own_branch() -> Result<()> {
        let db = OpsDb::new_in_memory()?;
        let (_, sub_a, sub_b) = seed(&db);
        let user = db.create_user("mech", "9100000002", "h", &Role::Mechanic, sub_a)?;

        let scope = resolve_scope(&db, &user)?;
        assert_eq!(scope.ids(), vec![sub_a]);
        assert!(!scope.contains(sub_b));
        Ok(())
    }

    #[test]
    fn test_owner_at_sub_branch_climbs_to_head() -> Result<()> {
        let db = OpsDb::new_in_memory()?;
        let (head, sub_a, sub_b) = seed(&db);
        let user = db.create_user("owner", "9100000003", "h", &Role::Owner, sub_a)?;

        let scope = resolve_scope(&db, &user)?;
        assert_eq!(scope.ids(), vec![head, sub_a, sub_b]);
        Ok(())
    }

    #[test]
    fn test_standalone_branch_scope_is_itself() -> Result<()> {
        let db = OpsDb::new_in_memory()?;
        let lone = db.create_branch("Standalone", None)?;
        let user = db.create_user("pdi", "9100000004", "h", &Role::Pdi, lone.id)?;

        let scope = resolve_scope(&db, &user)?;
        assert_eq!(scope.ids(), vec![lone.id]);
        assert_eq!(scope.len(), 1);
        assert!(!scope.is_empty());
        Ok(())
    }
}
