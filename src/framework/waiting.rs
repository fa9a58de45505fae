//! Bookkeeping the region server keeps around a region: who is inside, who is parked
//! where, and the n-of-n barrier regions use to count arrivals.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use super::core::{RegionFault, Response};
use crate::model::{Caller, ProtocolError, RaceId};

/// Parked responders, one waiting room per operation tag.
pub struct WaitingRoom<T> {
    parked: HashMap<(&'static str, Caller), Response<T>>,
}

impl<T> Default for WaitingRoom<T> {
    fn default() -> Self {
        Self {
            parked: HashMap::new(),
        }
    }
}

impl<T> WaitingRoom<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn park(&mut self, room: &'static str, caller: Caller, respond_to: Response<T>) {
        self.parked.insert((room, caller), respond_to);
    }

    pub fn contains(&self, room: &'static str, caller: &Caller) -> bool {
        self.parked.contains_key(&(room, *caller))
    }

    pub fn take(&mut self, room: &'static str, caller: &Caller) -> Option<Response<T>> {
        self.parked.remove(&(room, *caller))
    }

    pub fn len(&self) -> usize {
        self.parked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }
}

/// Records the logical caller currently inside the critical section.
#[derive(Debug, Default)]
pub struct MonitorSlot {
    occupant: Option<Caller>,
    admitted: u64,
}

impl MonitorSlot {
    pub fn enter(&mut self, caller: Caller) -> Result<(), String> {
        if let Some(inside) = self.occupant {
            return Err(format!("{caller} admitted while {inside} is inside"));
        }
        self.occupant = Some(caller);
        self.admitted += 1;
        Ok(())
    }

    pub fn exit(&mut self, caller: Caller) -> Result<(), String> {
        match self.occupant {
            Some(inside) if inside == caller => {
                self.occupant = None;
                Ok(())
            }
            Some(inside) => Err(format!("{caller} exited while {inside} is inside")),
            None => Err(format!("{caller} exited an empty region")),
        }
    }

    pub fn occupant(&self) -> Option<Caller> {
        self.occupant
    }

    /// Number of requests that entered the critical section so far.
    pub fn admitted(&self) -> u64 {
        self.admitted
    }
}

/// Arrival that cannot be counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendezvousError {
    /// The participant already arrived in this round.
    #[error("Participant already arrived")]
    Duplicate,
    /// More participants than expected. Only reachable through a bug.
    #[error("More than {expected} arrivals")]
    Overflow { expected: usize },
}

impl RendezvousError {
    /// Maps a failed arrival of `caller` at `place` onto the region's error taxonomy.
    pub fn fault(self, caller: Caller, place: &str, race: RaceId) -> RegionFault {
        match self {
            RendezvousError::Duplicate => RegionFault::Protocol(ProtocolError::DuplicateArrival {
                caller,
                place: place.to_string(),
                race,
            }),
            RendezvousError::Overflow { expected } => RegionFault::Invariant(format!(
                "more than {expected} arrivals at {place} for race {race}"
            )),
        }
    }
}

/// Result of a counted arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Waiting { arrived: usize, expected: usize },
    /// This arrival was the last one.
    Complete,
}

/// Reusable n-of-n barrier: counts distinct participants until `expected` have arrived.
///
/// The barrier only counts. Who blocks and who gets released is up to the region,
/// which parks callers on `Waiting` and wakes them on `Complete`.
#[derive(Debug, Clone)]
pub struct Rendezvous<K: Ord> {
    expected: usize,
    arrived: BTreeSet<K>,
}

impl<K: Ord + Clone> Rendezvous<K> {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            arrived: BTreeSet::new(),
        }
    }

    pub fn arrive(&mut self, participant: K) -> Result<Arrival, RendezvousError> {
        if self.arrived.contains(&participant) {
            return Err(RendezvousError::Duplicate);
        }
        if self.arrived.len() >= self.expected {
            return Err(RendezvousError::Overflow {
                expected: self.expected,
            });
        }
        self.arrived.insert(participant);
        if self.is_complete() {
            Ok(Arrival::Complete)
        } else {
            Ok(Arrival::Waiting {
                arrived: self.arrived.len(),
                expected: self.expected,
            })
        }
    }

    pub fn has_arrived(&self, participant: &K) -> bool {
        self.arrived.contains(participant)
    }

    pub fn is_complete(&self) -> bool {
        self.arrived.len() == self.expected
    }

    pub fn count(&self) -> usize {
        self.arrived.len()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn participants(&self) -> impl Iterator<Item = &K> {
        self.arrived.iter()
    }

    /// Starts a new round with the same expected count.
    pub fn reset(&mut self) {
        self.arrived.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn test_rendezvous_completes_on_last_distinct_arrival() {
        let mut barrier = Rendezvous::new(3);
        assert_eq!(
            barrier.arrive(2),
            Ok(Arrival::Waiting {
                arrived: 1,
                expected: 3
            })
        );
        assert_eq!(barrier.arrive(2), Err(RendezvousError::Duplicate));
        assert!(matches!(barrier.arrive(0), Ok(Arrival::Waiting { .. })));
        assert_eq!(barrier.arrive(1), Ok(Arrival::Complete));
        assert_eq!(
            barrier.arrive(7),
            Err(RendezvousError::Overflow { expected: 3 })
        );

        barrier.reset();
        assert_eq!(barrier.count(), 0);
        assert!(!barrier.has_arrived(&2));
    }

    #[test]
    fn test_rendezvous_error_is_a_std_error() {
        let error: Box<dyn std::error::Error> =
            Box::new(RendezvousError::Overflow { expected: 4 });
        assert_eq!(error.to_string(), "More than 4 arrivals");
        assert_eq!(
            RendezvousError::Duplicate.to_string(),
            "Participant already arrived"
        );
    }

    #[test]
    fn test_monitor_slot_admits_one_caller_at_a_time() {
        let mut slot = MonitorSlot::default();
        slot.enter(Caller::horse(1)).unwrap();
        assert!(slot.enter(Caller::spectator(0)).is_err());
        assert!(slot.exit(Caller::spectator(0)).is_err());
        assert_eq!(slot.occupant(), Some(Caller::horse(1)));

        slot.exit(Caller::horse(1)).unwrap();
        slot.enter(Caller::horse(1)).unwrap();
        slot.exit(Caller::horse(1)).unwrap();
        assert_eq!(slot.occupant(), None);
        assert_eq!(slot.admitted(), 2);
    }

    #[test]
    fn test_waiting_room_keeps_rooms_apart() {
        let mut room: WaitingRoom<u32> = WaitingRoom::new();
        let (a, _ra) = oneshot::channel();
        let (b, _rb) = oneshot::channel();
        let (c, _rc) = oneshot::channel();
        room.park("watch", Caller::spectator(2), a);
        room.park("watch", Caller::spectator(0), b);
        room.park("relax", Caller::spectator(0), c);

        assert!(room.contains("relax", &Caller::spectator(0)));
        assert!(room.take("watch", &Caller::spectator(0)).is_some());
        assert!(room.take("watch", &Caller::spectator(0)).is_none());
        assert!(room.contains("relax", &Caller::spectator(0)));
        assert!(room.contains("watch", &Caller::spectator(2)));
        assert_eq!(room.len(), 2);
    }
}
