//! Resource-acquisition policy
//!
//! Decides what a worker asks for or gives back at each decision point, and
//! keeps its requests ordered by class index so no two workers can wait on
//! each other in a cycle.
//!
//! The worker tracks a cursor: the highest class index it holds. A request
//! for a class above the cursor goes out as is. A request for a class at or
//! below the cursor first returns every held class from the chosen one
//! upward (one mass release), then asks for all of it back together with the
//! new amount. Either way, every request only names classes strictly above
//! everything the worker still holds when it is sent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use resources::ResourceVector;

/// Probability a decision point tries to request rather than release
pub const REQUEST_PROBABILITY: f64 = 0.6;

/// One protocol exchange (or pair of exchanges) the worker performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ask for more instances
    Request { amounts: ResourceVector },
    /// Mass-release `released`, then request `request`
    ///
    /// `request` is `released` plus the new amount.
    Reacquire {
        released: ResourceVector,
        request: ResourceVector,
    },
    /// Give instances back
    Release { amounts: ResourceVector },
}

/// Per-worker acquisition policy
#[derive(Debug, Clone)]
pub struct AcquisitionPolicy {
    ceiling: u32,
    held: ResourceVector,
    cursor: Option<usize>,
    rng: StdRng,
}

impl AcquisitionPolicy {
    /// Creates a policy holding nothing
    ///
    /// `ceiling` caps how many instances of one class the worker will hold.
    pub fn new(classes: usize, ceiling: u32, rng: StdRng) -> Self {
        Self {
            ceiling,
            held: ResourceVector::zeros(classes),
            cursor: None,
            rng,
        }
    }

    /// Creates a deterministic policy
    pub fn seeded(classes: usize, ceiling: u32, seed: u64) -> Self {
        Self::new(classes, ceiling, StdRng::seed_from_u64(seed))
    }

    /// Instances currently held, per class
    pub fn held(&self) -> &ResourceVector {
        &self.held
    }

    /// Highest class index held, if any
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Replaces the holdings, recomputing the cursor
    pub fn set_held(&mut self, held: ResourceVector) {
        self.cursor = held.highest_nonzero();
        self.held = held;
    }

    /// Picks the action for this decision point
    ///
    /// Returns `None` when the draw is a release and nothing is held.
    pub fn next_action(&mut self) -> Option<Action> {
        if self.rng.gen_bool(REQUEST_PROBABILITY) {
            if let Some(action) = self.choose_request() {
                return Some(action);
            }
        }
        self.choose_release()
    }

    /// Simulated nanoseconds until the next decision point, in `[1, bound]`
    pub fn next_delay(&mut self, bound: u64) -> u64 {
        self.rng.gen_range(1..=bound.max(1))
    }

    /// Builds the action that asks for `amount` more of `class`
    ///
    /// Applies the ordering rule against the current cursor.
    pub fn plan_request(&self, class: usize, amount: u32) -> Action {
        let wanted = ResourceVector::single(self.held.classes(), class, amount);
        match self.cursor {
            Some(cursor) if class <= cursor => {
                let mut released = ResourceVector::zeros(self.held.classes());
                for (index, count) in self.held.nonzero().filter(|(index, _)| *index >= class) {
                    released.set(index, count);
                }
                let mut request = released.clone();
                request.set(class, request.get(class) + amount);
                Action::Reacquire { released, request }
            }
            _ => Action::Request { amounts: wanted },
        }
    }

    /// Updates holdings after the master acknowledged `action`
    pub fn commit(&mut self, action: &Action) {
        let mut held = self.held.clone();
        match action {
            Action::Request { amounts } => add_into(&mut held, amounts),
            Action::Reacquire { released, request } => {
                sub_into(&mut held, released);
                add_into(&mut held, request);
            }
            Action::Release { amounts } => sub_into(&mut held, amounts),
        }
        self.set_held(held);
    }

    fn choose_request(&mut self) -> Option<Action> {
        let eligible: Vec<usize> = (0..self.held.classes())
            .filter(|class| self.held.get(*class) < self.ceiling)
            .collect();
        if eligible.is_empty() {
            return None;
        }
        let class = eligible[self.rng.gen_range(0..eligible.len())];
        let headroom = self.ceiling - self.held.get(class);
        let amount = self.rng.gen_range(1..=headroom);
        Some(self.plan_request(class, amount))
    }

    fn choose_release(&mut self) -> Option<Action> {
        let held: Vec<(usize, u32)> = self.held.nonzero().collect();
        if held.is_empty() {
            return None;
        }
        let (class, count) = held[self.rng.gen_range(0..held.len())];
        let amount = self.rng.gen_range(1..=count);
        Some(Action::Release {
            amounts: ResourceVector::single(self.held.classes(), class, amount),
        })
    }
}

fn add_into(target: &mut ResourceVector, amounts: &ResourceVector) {
    for (class, count) in amounts.nonzero() {
        target.set(class, target.get(class).saturating_add(count));
    }
}

fn sub_into(target: &mut ResourceVector, amounts: &ResourceVector) {
    for (class, count) in amounts.nonzero() {
        target.set(class, target.get(class).saturating_sub(count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_request_goes_out_directly() {
        let policy = AcquisitionPolicy::seeded(3, 5, 1);
        assert_eq!(
            policy.plan_request(1, 2),
            Action::Request {
                amounts: [0, 2, 0].into()
            }
        );
    }

    #[test]
    fn test_request_below_cursor_reacquires() {
        let mut policy = AcquisitionPolicy::seeded(3, 5, 1);
        policy.set_held([0, 0, 4].into());
        assert_eq!(policy.cursor(), Some(2));

        let action = policy.plan_request(0, 1);
        assert_eq!(
            action,
            Action::Reacquire {
                released: [0, 0, 4].into(),
                request: [1, 0, 4].into(),
            }
        );

        policy.commit(&action);
        assert_eq!(policy.held().as_slice(), &[1, 0, 4]);
        assert_eq!(policy.cursor(), Some(2));
    }

    #[test]
    fn test_request_at_cursor_includes_cursor_class() {
        let mut policy = AcquisitionPolicy::seeded(3, 5, 1);
        policy.set_held([2, 1, 0].into());

        let action = policy.plan_request(1, 3);
        assert_eq!(
            action,
            Action::Reacquire {
                released: [0, 1, 0].into(),
                request: [0, 4, 0].into(),
            }
        );
    }

    #[test]
    fn test_release_to_zero_moves_cursor_down() {
        let mut policy = AcquisitionPolicy::seeded(3, 5, 1);
        policy.set_held([1, 0, 2].into());
        policy.commit(&Action::Release {
            amounts: [0, 0, 2].into(),
        });
        assert_eq!(policy.cursor(), Some(0));

        policy.commit(&Action::Release {
            amounts: [1, 0, 0].into(),
        });
        assert_eq!(policy.cursor(), None);
    }

    #[test]
    fn test_nothing_held_and_all_full_is_impossible() {
        let mut policy = AcquisitionPolicy::seeded(2, 1, 3);
        policy.set_held([1, 1].into());
        // Every class is at the ceiling, so only releases are possible.
        for _ in 0..20 {
            match policy.next_action() {
                Some(Action::Release { .. }) => {}
                other => panic!("expected a release, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_worker_never_releases() {
        let mut policy = AcquisitionPolicy::seeded(2, 3, 9);
        for _ in 0..50 {
            if let Some(action) = policy.next_action() {
                assert!(matches!(action, Action::Request { .. }));
                break;
            }
        }
    }

    #[test]
    fn test_next_delay_within_bound() {
        let mut policy = AcquisitionPolicy::seeded(1, 1, 4);
        for _ in 0..100 {
            let delay = policy.next_delay(250);
            assert!((1..=250).contains(&delay));
        }
        assert_eq!(policy.next_delay(0), 1);
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let mut a = AcquisitionPolicy::seeded(4, 3, 42);
        let mut b = AcquisitionPolicy::seeded(4, 3, 42);
        for _ in 0..30 {
            let action_a = a.next_action();
            let action_b = b.next_action();
            assert_eq!(action_a, action_b);
            if let Some(action) = action_a {
                a.commit(&action);
                b.commit(&action);
            }
        }
    }

    proptest! {
        #[test]
        fn test_requests_only_target_classes_above_holdings(
            seed in any::<u64>(),
            classes in 1usize..6,
            ceiling in 1u32..6,
            steps in 1usize..80,
        ) {
            let mut policy = AcquisitionPolicy::seeded(classes, ceiling, seed);
            for _ in 0..steps {
                let Some(action) = policy.next_action() else { continue };
                let mut held = policy.held().clone();
                let request = match &action {
                    Action::Request { amounts } => Some(amounts.clone()),
                    Action::Reacquire { released, request } => {
                        prop_assert!(released.fits_within(&held));
                        sub_into(&mut held, released);
                        Some(request.clone())
                    }
                    Action::Release { amounts } => {
                        prop_assert!(amounts.fits_within(&held));
                        None
                    }
                };
                if let Some(request) = request {
                    let lowest = request.nonzero().next().map(|(class, _)| class);
                    prop_assert!(lowest.is_some());
                    if let (Some(lowest), Some(highest)) = (lowest, held.highest_nonzero()) {
                        prop_assert!(lowest > highest);
                    }
                }

                policy.commit(&action);
                prop_assert_eq!(policy.cursor(), policy.held().highest_nonzero());
                prop_assert!(policy.held().iter().all(|count| count <= ceiling));
            }
        }
    }
}
