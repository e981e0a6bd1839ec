//! The admin set.
//!
//! An ordered, duplicate-free list of identities. Element 0 is the super
//! admin: it is fixed at creation and can never be removed.

use serde::{Deserialize, Serialize};

use didhub_core::Did;

use crate::error::{GovernanceError, Result};

/// Identities allowed to perform privileged registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Did>", into = "Vec<Did>")]
pub struct AdminSet {
    admins: Vec<Did>,
}

impl AdminSet {
    /// Create a set whose only member is the super admin.
    pub fn new(super_admin: Did) -> Self {
        Self {
            admins: vec![super_admin],
        }
    }

    /// Rebuild from a stored list, dropping duplicates but keeping order.
    ///
    /// Returns `None` for an empty list.
    pub fn from_list(list: Vec<Did>) -> Option<Self> {
        let mut admins: Vec<Did> = Vec::with_capacity(list.len());
        for did in list {
            if !admins.contains(&did) {
                admins.push(did);
            }
        }
        if admins.is_empty() {
            None
        } else {
            Some(Self { admins })
        }
    }

    /// The super admin.
    pub fn super_admin(&self) -> &Did {
        &self.admins[0]
    }

    /// Whether `did` is an admin.
    pub fn contains(&self, did: &Did) -> bool {
        self.admins.contains(did)
    }

    /// Whether `did` is the super admin.
    pub fn is_super_admin(&self, did: &Did) -> bool {
        self.super_admin() == did
    }

    /// Add an admin. Returns `false` if it was already a member.
    pub fn add(&mut self, did: Did) -> bool {
        if self.contains(&did) {
            return false;
        }
        self.admins.push(did);
        true
    }

    /// Remove an admin, keeping the order of the rest.
    pub fn remove(&mut self, did: &Did) -> Result<()> {
        if self.is_super_admin(did) {
            return Err(GovernanceError::CannotRemoveSuperAdmin(did.clone()));
        }
        if !self.contains(did) {
            return Err(GovernanceError::NotAnAdmin(did.clone()));
        }
        self.admins.retain(|a| a != did);
        Ok(())
    }

    /// All admins, super admin first.
    pub fn list(&self) -> &[Did] {
        &self.admins
    }

    /// Number of admins.
    pub fn len(&self) -> usize {
        self.admins.len()
    }

    /// Always false: the super admin is always present.
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

impl TryFrom<Vec<Did>> for AdminSet {
    type Error = String;

    fn try_from(list: Vec<Did>) -> std::result::Result<Self, Self::Error> {
        Self::from_list(list).ok_or_else(|| "admin set has no super admin".to_string())
    }
}

impl From<AdminSet> for Vec<Did> {
    fn from(set: AdminSet) -> Self {
        set.admins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn did(addr: &str) -> Did {
        Did::new(format!("did:bitxhub:relayroot:{addr}"))
    }

    #[test]
    fn test_super_admin_is_first() {
        let mut admins = AdminSet::new(did("0xroot"));
        assert!(admins.add(did("0xa")));
        assert!(admins.is_super_admin(&did("0xroot")));
        assert!(!admins.is_super_admin(&did("0xa")));
        assert_eq!(admins.list(), &[did("0xroot"), did("0xa")]);
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut admins = AdminSet::new(did("0xroot"));
        assert!(admins.add(did("0xa")));
        assert!(!admins.add(did("0xa")));
        assert!(!admins.add(did("0xroot")));
        assert_eq!(admins.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut admins = AdminSet::new(did("0xroot"));
        admins.add(did("0xa"));
        admins.add(did("0xb"));
        admins.add(did("0xc"));

        admins.remove(&did("0xb")).unwrap();
        assert_eq!(admins.list(), &[did("0xroot"), did("0xa"), did("0xc")]);

        assert!(matches!(
            admins.remove(&did("0xb")),
            Err(GovernanceError::NotAnAdmin(_))
        ));
        assert!(matches!(
            admins.remove(&did("0xroot")),
            Err(GovernanceError::CannotRemoveSuperAdmin(_))
        ));
    }

    #[test]
    fn test_from_list() {
        assert!(AdminSet::from_list(Vec::new()).is_none());
        let admins =
            AdminSet::from_list(vec![did("0xroot"), did("0xa"), did("0xroot")]).unwrap();
        assert_eq!(admins.list(), &[did("0xroot"), did("0xa")]);
    }

    proptest! {
        #[test]
        fn prop_super_admin_survives(ops in prop::collection::vec((any::<bool>(), 0u8..6), 0..40)) {
            let mut admins = AdminSet::new(did("0x0"));
            for (add, n) in ops {
                let target = did(&format!("0x{n}"));
                if add {
                    admins.add(target);
                } else {
                    let _ = admins.remove(&target);
                }
            }
            prop_assert_eq!(admins.super_admin(), &did("0x0"));
            let mut seen = admins.list().to_vec();
            seen.sort();
            seen.dedup();
            prop_assert_eq!(seen.len(), admins.len());
        }
    }
}
