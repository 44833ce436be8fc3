//! Published engine state, observed through a `tokio::sync::watch` channel.

use offer_types::Offer;
use serde::Serialize;

use crate::actor::Role;

/// Offers shown for one role, tagged with the actor they belong to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoleView {
    pub actor_id: Option<String>,
    pub offers: Vec<Offer>,
}

impl RoleView {
    pub(crate) fn is_for(&self, actor_id: &str) -> bool {
        self.actor_id.as_deref() == Some(actor_id)
    }

    /// Drop every offer with this id. Returns whether anything was removed.
    pub(crate) fn remove(&mut self, offer_id: &str) -> bool {
        let before = self.offers.len();
        self.offers.retain(|o| o.id != offer_id);
        self.offers.len() != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfferBook {
    pub buyer: RoleView,
    pub supplier: RoleView,
    pub loading: bool,
    /// User-facing message of the last failed operation.
    pub error: Option<String>,
}

impl OfferBook {
    pub fn view(&self, role: Role) -> &RoleView {
        match role {
            Role::Buyer => &self.buyer,
            Role::Supplier => &self.supplier,
        }
    }

    pub(crate) fn view_mut(&mut self, role: Role) -> &mut RoleView {
        match role {
            Role::Buyer => &mut self.buyer,
            Role::Supplier => &mut self.supplier,
        }
    }

    /// First offer with this id, supplier list first.
    pub fn find(&self, offer_id: &str) -> Option<&Offer> {
        self.supplier
            .offers
            .iter()
            .chain(self.buyer.offers.iter())
            .find(|o| o.id == offer_id)
    }

    /// Apply `update` to every copy of the offer across both lists.
    /// Returns how many copies were touched.
    pub(crate) fn update_offer(&mut self, offer_id: &str, mut update: impl FnMut(&mut Offer)) -> usize {
        let mut touched = 0;
        for offer in self
            .supplier
            .offers
            .iter_mut()
            .chain(self.buyer.offers.iter_mut())
            .filter(|o| o.id == offer_id)
        {
            update(offer);
            touched += 1;
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offer_types::OfferStatus;

    fn book() -> OfferBook {
        OfferBook {
            buyer: RoleView {
                actor_id: Some("b1".into()),
                offers: vec![Offer::pending("o1", "b1", "s1", "p1", 10, 1)],
            },
            supplier: RoleView {
                actor_id: Some("s1".into()),
                offers: vec![
                    Offer::pending("o1", "b1", "s1", "p1", 10, 1),
                    Offer::pending("o2", "b2", "s1", "p2", 20, 2),
                ],
            },
            ..OfferBook::default()
        }
    }

    #[test]
    fn test_update_touches_both_lists() {
        let mut book = book();
        let touched = book.update_offer("o1", |o| o.status = OfferStatus::Approved);
        assert_eq!(touched, 2);
        assert_eq!(book.buyer.offers[0].status, OfferStatus::Approved);
        assert_eq!(book.supplier.offers[1].status, OfferStatus::Pending);
    }

    #[test]
    fn test_find_and_remove() {
        let mut book = book();
        assert_eq!(book.find("o2").unwrap().buyer_id, "b2");
        assert!(book.find("missing").is_none());
        assert!(book.buyer.remove("o1"));
        assert!(!book.buyer.remove("o1"));
        assert!(book.buyer.offers.is_empty());
        assert_eq!(book.supplier.offers.len(), 2);
        assert!(book.view(Role::Supplier).is_for("s1"));
    }
}
