//! Registry of cross-chain order links, keyed by counterpart order hash.
//!
//! An order carries at most one link and a counterpart hash is linked to at
//! most one order. Status changes follow the HTLC lifecycle in
//! [`LinkStatus::can_transition_to`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{CrossChainOrderLink, LinkStatus, OrderHash};
use crate::error::{Result, StateError};

#[derive(Debug, Default)]
pub struct CrossChainRegistry {
    links: DashMap<OrderHash, CrossChainOrderLink>,
    by_order: DashMap<OrderHash, OrderHash>,
}

impl CrossChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link. Either side already being linked is `LinkAlreadyExists`.
    pub fn attach(&self, link: CrossChainOrderLink) -> Result<()> {
        let order_slot = match self.by_order.entry(link.ethereum_order_hash) {
            Entry::Occupied(_) => {
                return Err(StateError::LinkAlreadyExists {
                    order_hash: link.ethereum_order_hash,
                }
                .into());
            }
            Entry::Vacant(slot) => slot,
        };

        match self.links.entry(link.counterpart_order_hash) {
            Entry::Occupied(_) => Err(StateError::LinkAlreadyExists {
                order_hash: link.counterpart_order_hash,
            }
            .into()),
            Entry::Vacant(slot) => {
                order_slot.insert(link.counterpart_order_hash);
                debug!(
                    order = %link.ethereum_order_hash.short(),
                    counterpart = %link.counterpart_order_hash.short(),
                    "link attached"
                );
                slot.insert(link);
                Ok(())
            }
        }
    }

    pub fn get(&self, counterpart_order_hash: &OrderHash) -> Option<CrossChainOrderLink> {
        self.links
            .get(counterpart_order_hash)
            .map(|link| link.value().clone())
    }

    pub fn link_for_order(&self, order_hash: &OrderHash) -> Option<CrossChainOrderLink> {
        let counterpart = *self.by_order.get(order_hash)?.value();
        self.get(&counterpart)
    }

    /// Move a link to `status`. Returns the link and whether anything changed;
    /// re-applying the current status is accepted and changes nothing.
    pub fn update_status(
        &self,
        counterpart_order_hash: &OrderHash,
        status: LinkStatus,
    ) -> Result<(CrossChainOrderLink, bool)> {
        let mut link = self
            .links
            .get_mut(counterpart_order_hash)
            .ok_or(StateError::LinkNotFound {
                counterpart_order_hash: *counterpart_order_hash,
            })?;

        if link.status == status {
            return Ok((link.clone(), false));
        }
        if !link.status.can_transition_to(status) {
            return Err(StateError::InvalidLinkTransition {
                from: link.status,
                to: status,
            }
            .into());
        }

        link.status = status;
        Ok((link.clone(), true))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All links, ordered by counterpart hash
    pub fn links(&self) -> Vec<CrossChainOrderLink> {
        let mut links: Vec<CrossChainOrderLink> =
            self.links.iter().map(|entry| entry.value().clone()).collect();
        links.sort_by_key(|link| link.counterpart_order_hash);
        links
    }

    pub fn restore(links: Vec<CrossChainOrderLink>) -> Result<Self> {
        let registry = Self::new();
        for link in links {
            registry.attach(link)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use alloy::primitives::B256;

    fn link(order: u8, counterpart: u8) -> CrossChainOrderLink {
        CrossChainOrderLink::pending(
            OrderHash::from([order; 32]),
            OrderHash::from([counterpart; 32]),
            "10".parse().unwrap(),
            B256::repeat_byte(0x77),
            86_400,
        )
    }

    #[test]
    fn test_attach_and_lookup() {
        let registry = CrossChainRegistry::new();
        registry.attach(link(1, 2)).unwrap();

        let found = registry.get(&OrderHash::from([2u8; 32])).unwrap();
        assert_eq!(found.status, LinkStatus::Pending);
        assert_eq!(
            registry.link_for_order(&OrderHash::from([1u8; 32])),
            Some(found)
        );
    }

    #[test]
    fn test_duplicate_links_rejected() {
        let registry = CrossChainRegistry::new();
        registry.attach(link(1, 2)).unwrap();

        assert!(matches!(
            registry.attach(link(1, 3)),
            Err(EngineError::State(StateError::LinkAlreadyExists { .. }))
        ));
        assert!(matches!(
            registry.attach(link(4, 2)),
            Err(EngineError::State(StateError::LinkAlreadyExists { .. }))
        ));
        // A rejected attach leaves no half-registered order
        assert!(registry.link_for_order(&OrderHash::from([4u8; 32])).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_status_lifecycle() {
        let registry = CrossChainRegistry::new();
        registry.attach(link(1, 2)).unwrap();
        let counterpart = OrderHash::from([2u8; 32]);

        let (updated, changed) = registry
            .update_status(&counterpart, LinkStatus::Locked)
            .unwrap();
        assert!(changed);
        assert_eq!(updated.status, LinkStatus::Locked);

        let (_, changed) = registry
            .update_status(&counterpart, LinkStatus::Locked)
            .unwrap();
        assert!(!changed);

        registry
            .update_status(&counterpart, LinkStatus::Executed)
            .unwrap();
        let err = registry
            .update_status(&counterpart, LinkStatus::Refunded)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::State(StateError::InvalidLinkTransition {
                from: LinkStatus::Executed,
                to: LinkStatus::Refunded
            })
        ));

        assert!(matches!(
            registry.update_status(&OrderHash::from([9u8; 32]), LinkStatus::Locked),
            Err(EngineError::State(StateError::LinkNotFound { .. }))
        ));
    }
}
