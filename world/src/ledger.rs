//! Bidirectional ambulance/emergency assignment relation.

use std::collections::BTreeMap;

use ambulance_dispatch_core::{AmbulanceId, EmergencyId};

/// Authoritative one-to-one relation between ambulances and emergencies.
///
/// Both directions are updated together so lookups from either side always
/// agree; entities never store back-references to each other.
#[derive(Clone, Debug, Default)]
pub(crate) struct AssignmentLedger {
    by_ambulance: BTreeMap<AmbulanceId, EmergencyId>,
    by_emergency: BTreeMap<EmergencyId, AmbulanceId>,
}

impl AssignmentLedger {
    /// Pairs the ambulance with the emergency, dropping any previous partners.
    ///
    /// Returns the emergency the ambulance previously served and the
    /// ambulance the emergency was previously bound to.
    pub(crate) fn bind(
        &mut self,
        ambulance: AmbulanceId,
        emergency: EmergencyId,
    ) -> (Option<EmergencyId>, Option<AmbulanceId>) {
        let previous_emergency = self.unbind_ambulance(ambulance);
        let previous_ambulance = self.unbind_emergency(emergency);
        let _ = self.by_ambulance.insert(ambulance, emergency);
        let _ = self.by_emergency.insert(emergency, ambulance);
        (previous_emergency, previous_ambulance)
    }

    pub(crate) fn unbind_ambulance(&mut self, ambulance: AmbulanceId) -> Option<EmergencyId> {
        let emergency = self.by_ambulance.remove(&ambulance)?;
        let _ = self.by_emergency.remove(&emergency);
        Some(emergency)
    }

    pub(crate) fn unbind_emergency(&mut self, emergency: EmergencyId) -> Option<AmbulanceId> {
        let ambulance = self.by_emergency.remove(&emergency)?;
        let _ = self.by_ambulance.remove(&ambulance);
        Some(ambulance)
    }

    /// Exchanges the emergencies held by two bound ambulances.
    pub(crate) fn swap(&mut self, first: AmbulanceId, second: AmbulanceId) -> bool {
        let (Some(a), Some(b)) = (self.emergency_of(first), self.emergency_of(second)) else {
            return false;
        };
        let _ = self.by_ambulance.insert(first, b);
        let _ = self.by_ambulance.insert(second, a);
        let _ = self.by_emergency.insert(a, second);
        let _ = self.by_emergency.insert(b, first);
        true
    }

    /// Moves the emergency held by `from` onto `to`, which must be unbound.
    pub(crate) fn transfer(&mut self, from: AmbulanceId, to: AmbulanceId) -> Option<EmergencyId> {
        if self.by_ambulance.contains_key(&to) {
            return None;
        }
        let emergency = self.unbind_ambulance(from)?;
        let _ = self.by_ambulance.insert(to, emergency);
        let _ = self.by_emergency.insert(emergency, to);
        Some(emergency)
    }

    pub(crate) fn emergency_of(&self, ambulance: AmbulanceId) -> Option<EmergencyId> {
        self.by_ambulance.get(&ambulance).copied()
    }

    pub(crate) fn ambulance_of(&self, emergency: EmergencyId) -> Option<AmbulanceId> {
        self.by_emergency.get(&emergency).copied()
    }

    /// Reports whether both directions describe the same relation.
    pub(crate) fn is_consistent(&self) -> bool {
        self.by_ambulance.len() == self.by_emergency.len()
            && self
                .by_ambulance
                .iter()
                .all(|(ambulance, emergency)| self.ambulance_of(*emergency) == Some(*ambulance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ambulance: u32, emergency: u32) -> (AmbulanceId, EmergencyId) {
        (AmbulanceId::new(ambulance), EmergencyId::new(emergency))
    }

    #[test]
    fn rebinding_evicts_previous_partners() {
        let mut ledger = AssignmentLedger::default();
        let (a0, e0) = ids(0, 0);
        let (a1, e1) = ids(1, 1);

        assert_eq!(ledger.bind(a0, e0), (None, None));
        assert_eq!(ledger.bind(a1, e1), (None, None));
        assert_eq!(ledger.bind(a0, e1), (Some(e0), Some(a1)));

        assert_eq!(ledger.emergency_of(a0), Some(e1));
        assert_eq!(ledger.emergency_of(a1), None);
        assert_eq!(ledger.ambulance_of(e0), None);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn swap_and_transfer_keep_both_directions_in_sync() {
        let mut ledger = AssignmentLedger::default();
        let (a0, e0) = ids(0, 0);
        let (a1, e1) = ids(1, 1);
        let a2 = AmbulanceId::new(2);
        let _ = ledger.bind(a0, e0);
        let _ = ledger.bind(a1, e1);

        assert!(ledger.swap(a0, a1));
        assert_eq!(ledger.ambulance_of(e0), Some(a1));
        assert_eq!(ledger.ambulance_of(e1), Some(a0));

        assert_eq!(ledger.transfer(a0, a1), None);
        assert_eq!(ledger.transfer(a0, a2), Some(e1));
        assert_eq!(ledger.emergency_of(a0), None);
        assert_eq!(ledger.ambulance_of(e1), Some(a2));
        assert!(ledger.is_consistent());
        assert!(!ledger.swap(a0, a2));
    }
}
