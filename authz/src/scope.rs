//! Per-operation authorization scope.
//!
//! An operation may check many objects (deleting a batch of zones, appending
//! measurements for several sensors). The scope resolves the ownership set at
//! most once and reuses it for every check of that operation. A scope borrows
//! its engine and credential, so it cannot outlive the operation that opened it.

use crate::error::{AuthzError, Result};
use crate::graph::ContainmentGraph;
use crate::ownership::OwnershipSet;
use crate::types::{Credential, EntityKind, SensorId, Target};
use crate::{dispatch, AuthzEngine};
use once_cell::unsync::OnceCell;
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub struct OperationScope<'a, G> {
    engine: &'a AuthzEngine<G>,
    credential: &'a Credential,
    owned: OnceCell<OwnershipSet>,
}

impl<'a, G: ContainmentGraph> OperationScope<'a, G> {
    pub(crate) fn new(engine: &'a AuthzEngine<G>, credential: &'a Credential) -> Self {
        Self {
            engine,
            credential,
            owned: OnceCell::new(),
        }
    }

    pub fn credential(&self) -> &Credential {
        self.credential
    }

    /// The memoized ownership set of this operation's credential.
    pub fn owned(&self) -> &OwnershipSet {
        self.owned.get_or_init(|| self.engine.resolve(self.credential))
    }

    pub fn owned_sensor_ids(&self) -> &BTreeSet<SensorId> {
        &self.owned().sensors
    }

    /// Same contract as [`AuthzEngine::authorize`], against the memoized set.
    pub fn authorize(&self, checker: EntityKind, target: &Target) -> Result<bool> {
        if self.credential.bypasses_checks() {
            return Ok(true);
        }
        let target = dispatch(checker, target)?;
        Ok(self.owned().contains(&target))
    }

    /// `Ok(true)` only if every target passes. Stops at the first deny.
    pub fn authorize_all<I>(&self, checker: EntityKind, targets: I) -> Result<bool>
    where
        I: IntoIterator<Item = Target>,
    {
        for target in targets {
            if !self.authorize(checker, &target)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Like [`OperationScope::authorize`], but a deny becomes
    /// [`AuthzError::Denied`].
    pub fn require(&self, checker: EntityKind, target: &Target) -> Result<()> {
        if self.authorize(checker, target)? {
            Ok(())
        } else {
            warn!("Access DENIED for {} {} {}", self.credential, checker, target);
            Err(AuthzError::Denied(*target))
        }
    }

    /// Check every target of a batch before anything is mutated.
    ///
    /// The batch passes only if every target passes; the first failure is
    /// returned and the caller must abandon the whole batch.
    pub fn require_all<I>(&self, checker: EntityKind, targets: I) -> Result<()>
    where
        I: IntoIterator<Item = Target>,
    {
        let mut checked = 0usize;
        for target in targets {
            self.require(checker, &target)?;
            checked += 1;
        }
        debug!(
            "Batch of {} {} checks passed for {}",
            checked, checker, self.credential
        );
        Ok(())
    }
}
