use crate::search::State;
use std::collections::HashMap;
use std::hash::{BuildHasher, RandomState};

/// Cheapest accumulated cost seen for each reached state. Only consulted for
/// plans without open conditions, whose final state fully describes them.
#[derive(Debug, Default)]
pub struct Memoization<S = RandomState> {
    best_cost: HashMap<State, f32, S>,
}

impl Memoization {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: BuildHasher> Memoization<S> {
    pub fn len(&self) -> usize {
        self.best_cost.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best_cost.is_empty()
    }

    /// Records `state` reached at cost `gc`. Returns false if it was already
    /// reached at no greater cost.
    pub fn insert(&mut self, state: &State, gc: f32) -> bool {
        match self.best_cost.get_mut(state) {
            Some(best) if *best <= gc => false,
            Some(best) => {
                *best = gc;
                true
            }
            None => {
                self.best_cost.insert(state.clone(), gc);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::{BuildHasherDefault, Hasher};

    /// Sends every state to the same bucket.
    #[derive(Default)]
    struct SameBucket;

    impl Hasher for SameBucket {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    #[test]
    fn keeps_cheapest() {
        let mut memo = Memoization::new();
        assert!(memo.is_empty());
        let a = State::new(vec![0, 1], vec![]);
        let b = State::new(vec![1, 1], vec![]);
        assert!(memo.insert(&a, 3.));
        assert!(!memo.insert(&a, 3.));
        assert!(!memo.insert(&a, 4.));
        assert!(memo.insert(&a, 2.));
        assert!(memo.insert(&b, 9.));
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn colliding_states_are_kept_apart() {
        let mut memo = Memoization::<BuildHasherDefault<SameBucket>>::default();
        let a = State::new(vec![0, 1], vec![1.5]);
        let b = State::new(vec![1, 0], vec![1.5]);
        let c = State::new(vec![0, 1], vec![2.5]);
        assert!(memo.insert(&a, 3.));
        assert!(memo.insert(&b, 5.));
        assert!(memo.insert(&c, 5.));
        assert!(!memo.insert(&b, 5.));
        assert!(!memo.insert(&a, 4.));
        assert_eq!(memo.len(), 3);
    }
}
