//! # Role Resolver
//!
//! Derives the single global role of an address. The ledger has no
//! "who am I" query, so the role comes from scanning registry state.
//!
//! ## Resolution order
//!
//! 1. owner address → `owner`
//! 2. zero address → `unknown`
//! 3. first institution, ascending id, whose admin is the address → `admin`
//! 4. first institution, ascending id, listing the address as validator → `validator`
//! 5. otherwise → `reporter`
//!
//! An address that is validator of institution 2 and reporter of
//! institution 5 is therefore `validator` everywhere. Roles are really
//! per institution; [`RoleResolver::memberships`] exposes the full
//! picture for callers that need it.
//!
//! ## Scan vs index
//!
//! [`RoleResolver::resolve`] scans live state on every call. The indexed
//! path builds a [`RoleIndex`] once and answers from memory until
//! [`RoleResolver::invalidate`] is called on a registry change. Both
//! paths give the same answer for the same ledger snapshot.
//!
//! Institution reads are issued concurrently. Results are evaluated in
//! ascending id order regardless of completion order; the scan is an
//! eventually-consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use lapor_common::{Address, Institution, InstitutionId, Role};

use crate::ledger::{ReadError, RegistryReader};

/// One (institution, role) pair an address holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub institution_id: InstitutionId,
    pub role: Role,
}

// ════════════════════════════════════════════════════════════════════════════════
// INDEX
// ════════════════════════════════════════════════════════════════════════════════

/// Address-keyed membership sets built from one full registry scan.
#[derive(Debug, Clone, Default)]
pub struct RoleIndex {
    /// Lowest institution id the address administers.
    admins: HashMap<Address, InstitutionId>,
    /// Lowest institution id listing the address as validator.
    validators: HashMap<Address, InstitutionId>,
    memberships: HashMap<Address, Vec<Membership>>,
    institution_count: u64,
}

impl RoleIndex {
    fn insert(&mut self, address: Address, institution_id: InstitutionId, role: Role) {
        match role {
            Role::Admin => {
                self.admins.entry(address).or_insert(institution_id);
            }
            Role::Validator => {
                self.validators.entry(address).or_insert(institution_id);
            }
            _ => {}
        }
        let list = self.memberships.entry(address).or_default();
        let m = Membership {
            institution_id,
            role,
        };
        if !list.contains(&m) {
            list.push(m);
        }
    }

    /// Global role, excluding the owner check.
    #[must_use]
    pub fn registry_role(&self, address: &Address) -> Role {
        if address.is_zero() {
            Role::Unknown
        } else if self.admins.contains_key(address) {
            Role::Admin
        } else if self.validators.contains_key(address) {
            Role::Validator
        } else {
            Role::Reporter
        }
    }

    #[must_use]
    pub fn memberships(&self, address: &Address) -> &[Membership] {
        self.memberships
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn institution_count(&self) -> u64 {
        self.institution_count
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// RESOLVER
// ════════════════════════════════════════════════════════════════════════════════

pub struct RoleResolver {
    owner: Address,
    reader: Arc<dyn RegistryReader>,
    index: RwLock<Option<Arc<RoleIndex>>>,
    /// Last role resolved per address this session. Advisory only.
    session: RwLock<HashMap<Address, Role>>,
}

impl RoleResolver {
    #[must_use]
    pub fn new(owner: Address, reader: Arc<dyn RegistryReader>) -> Self {
        Self {
            owner,
            reader,
            index: RwLock::new(None),
            session: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Resolves `address` by scanning live registry state.
    pub async fn resolve(&self, address: Address) -> Result<Role, ReadError> {
        let role = match self.pre_registry_role(address) {
            Some(role) => role,
            None => self.scan(address).await?,
        };
        debug!(%address, %role, "role resolved by scan");
        self.session.write().insert(address, role);
        Ok(role)
    }

    /// Resolves `address` through the cached index, building it first if
    /// needed.
    pub async fn resolve_indexed(&self, address: Address) -> Result<Role, ReadError> {
        let role = match self.pre_registry_role(address) {
            Some(role) => role,
            None => self.index().await?.registry_role(&address),
        };
        self.session.write().insert(address, role);
        Ok(role)
    }

    /// Role last resolved for `address` this session, if any.
    #[must_use]
    pub fn cached(&self, address: &Address) -> Option<Role> {
        self.session.read().get(address).copied()
    }

    /// Every institution role `address` holds, from a live scan.
    pub async fn memberships(&self, address: Address) -> Result<Vec<Membership>, ReadError> {
        let count = self.reader.institution_count().await?;
        let reader = &self.reader;
        let rows = try_join_all((1..=count).map(|id| async move {
            let (institution, is_validator, is_reporter) = futures::try_join!(
                reader.institution(id),
                reader.is_validator(id, address),
                reader.is_reporter(id, address),
            )?;
            Ok::<_, ReadError>((institution, is_validator, is_reporter))
        }))
        .await?;

        let mut out = Vec::new();
        for (institution, is_validator, is_reporter) in rows {
            if institution.admin == address {
                out.push(Membership {
                    institution_id: institution.id,
                    role: Role::Admin,
                });
            }
            if is_validator {
                out.push(Membership {
                    institution_id: institution.id,
                    role: Role::Validator,
                });
            }
            if is_reporter {
                out.push(Membership {
                    institution_id: institution.id,
                    role: Role::Reporter,
                });
            }
        }
        Ok(out)
    }

    /// Current index, building it if absent.
    pub async fn index(&self) -> Result<Arc<RoleIndex>, ReadError> {
        if let Some(index) = self.index.read().as_ref() {
            return Ok(Arc::clone(index));
        }
        self.refresh_index().await
    }

    /// Rebuilds the index from a full scan and caches it.
    pub async fn refresh_index(&self) -> Result<Arc<RoleIndex>, ReadError> {
        let index = Arc::new(self.build_index().await?);
        info!(
            institutions = index.institution_count(),
            "role index rebuilt"
        );
        *self.index.write() = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Drops the cached index and session roles. Call on any registry
    /// membership change.
    pub fn invalidate(&self) {
        *self.index.write() = None;
        self.session.write().clear();
        debug!("role index invalidated");
    }

    async fn build_index(&self) -> Result<RoleIndex, ReadError> {
        let count = self.reader.institution_count().await?;
        let reader = &self.reader;
        let rows = try_join_all((1..=count).map(|id| async move {
            futures::try_join!(reader.institution(id), reader.validators(id), reader.reporters(id))
        }))
        .await?;

        let mut index = RoleIndex {
            institution_count: count,
            ..RoleIndex::default()
        };
        // Ascending id order: first insert per address wins.
        for (institution, validators, reporters) in rows {
            index.insert(institution.admin, institution.id, Role::Admin);
            for v in validators {
                index.insert(v, institution.id, Role::Validator);
            }
            for r in reporters {
                index.insert(r, institution.id, Role::Reporter);
            }
        }
        Ok(index)
    }

    fn pre_registry_role(&self, address: Address) -> Option<Role> {
        if address == self.owner {
            Some(Role::Owner)
        } else if address.is_zero() {
            Some(Role::Unknown)
        } else {
            None
        }
    }

    async fn scan(&self, address: Address) -> Result<Role, ReadError> {
        let count = self.reader.institution_count().await?;
        let reader = &self.reader;

        let institutions: Vec<Institution> =
            try_join_all((1..=count).map(|id| reader.institution(id))).await?;
        if institutions.iter().any(|i| i.admin == address) {
            return Ok(Role::Admin);
        }

        let validator_flags =
            try_join_all((1..=count).map(|id| reader.is_validator(id, address))).await?;
        if validator_flags.into_iter().any(|v| v) {
            return Ok(Role::Validator);
        }

        Ok(Role::Reporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_ledger::MockLedger;

    const OWNER: Address = Address::new([0x01; 20]);
    const A: Address = Address::new([0xa1; 20]);
    const B: Address = Address::new([0xb2; 20]);

    fn ledger() -> Arc<MockLedger> {
        let ledger = Arc::new(MockLedger::new());
        for id in 1..=7u8 {
            ledger.add_institution(&format!("Inst {id}"), Address::repeat(0x10 + id), Address::repeat(0x30 + id));
        }
        ledger
    }

    fn resolver(ledger: &Arc<MockLedger>) -> RoleResolver {
        RoleResolver::new(OWNER, Arc::clone(ledger) as Arc<dyn RegistryReader>)
    }

    #[tokio::test]
    async fn owner_beats_membership() {
        let l = ledger();
        l.add_validator(2, OWNER);
        let r = resolver(&l);
        assert_eq!(r.resolve(OWNER).await.unwrap(), Role::Owner);
        assert_eq!(r.resolve_indexed(OWNER).await.unwrap(), Role::Owner);
    }

    #[tokio::test]
    async fn admin_precedes_validator() {
        let l = ledger();
        l.set_institution_admin(3, A);
        l.add_validator(7, A);
        let r = resolver(&l);
        assert_eq!(r.resolve(A).await.unwrap(), Role::Admin);
        assert_eq!(r.resolve_indexed(A).await.unwrap(), Role::Admin);
    }

    #[tokio::test]
    async fn validator_and_reporter_collapse_to_validator() {
        let l = ledger();
        l.add_validator(2, B);
        l.add_reporter(5, B);
        let r = resolver(&l);
        assert_eq!(r.resolve(B).await.unwrap(), Role::Validator);

        let m = r.memberships(B).await.unwrap();
        assert_eq!(
            m,
            vec![
                Membership {
                    institution_id: 2,
                    role: Role::Validator
                },
                Membership {
                    institution_id: 5,
                    role: Role::Reporter
                },
            ]
        );
    }

    #[tokio::test]
    async fn unregistered_is_reporter_and_zero_is_unknown() {
        let l = ledger();
        let r = resolver(&l);
        assert_eq!(r.resolve(Address::repeat(0xfe)).await.unwrap(), Role::Reporter);
        assert_eq!(r.resolve(Address::ZERO).await.unwrap(), Role::Unknown);
    }

    #[tokio::test]
    async fn index_matches_scan_for_every_address() {
        let l = ledger();
        l.set_institution_admin(3, A);
        l.add_validator(7, A);
        l.add_validator(2, B);
        l.add_reporter(5, B);
        let r = resolver(&l);

        let mut addrs = vec![OWNER, A, B, Address::ZERO, Address::repeat(0xfe)];
        addrs.extend((1..=7u8).map(|id| Address::repeat(0x10 + id)));
        for addr in addrs {
            assert_eq!(
                r.resolve(addr).await.unwrap(),
                r.resolve_indexed(addr).await.unwrap(),
                "{addr}"
            );
        }
    }

    #[tokio::test]
    async fn index_is_stale_until_invalidated() {
        let l = ledger();
        let r = resolver(&l);
        assert_eq!(r.resolve_indexed(B).await.unwrap(), Role::Reporter);

        l.add_validator(4, B);
        assert_eq!(r.resolve_indexed(B).await.unwrap(), Role::Reporter);
        assert_eq!(r.resolve(B).await.unwrap(), Role::Validator);

        r.invalidate();
        assert_eq!(r.cached(&B), None);
        assert_eq!(r.resolve_indexed(B).await.unwrap(), Role::Validator);
    }

    #[tokio::test]
    async fn session_cache_records_last_resolution() {
        let l = ledger();
        let r = resolver(&l);
        assert_eq!(r.cached(&A), None);
        r.resolve(A).await.unwrap();
        assert_eq!(r.cached(&A), Some(Role::Reporter));
    }

    #[tokio::test]
    async fn read_failure_propagates() {
        let l = ledger();
        l.fail_reads("gateway unreachable");
        let r = resolver(&l);
        assert!(matches!(r.resolve(A).await, Err(ReadError::Network(_))));
    }
}
