use crate::search::{Fact, ValueId, VarId, UNDEFINED_VALUE};
use std::hash::{Hash, Hasher};

/// A snapshot of the discrete and numeric variables. States have no identity
/// beyond their contents, every consumer owns its own copy.
#[derive(Debug, Clone)]
pub struct State {
    pub values: Vec<ValueId>,
    pub numeric: Vec<f32>,
}

impl State {
    pub fn new(values: Vec<ValueId>, numeric: Vec<f32>) -> Self {
        Self { values, numeric }
    }

    #[inline]
    pub fn value(&self, var: VarId) -> ValueId {
        self.values[var as usize]
    }

    #[inline]
    pub fn holds(&self, fact: &Fact) -> bool {
        self.values[fact.var as usize] == fact.value
    }

    #[inline]
    pub fn is_defined(&self, var: VarId) -> bool {
        self.values[var as usize] != UNDEFINED_VALUE
    }

    #[inline]
    pub fn set(&mut self, fact: &Fact) {
        self.values[fact.var as usize] = fact.value;
    }

    pub fn satisfies_all<'a>(&self, facts: impl IntoIterator<Item = &'a Fact>) -> bool {
        facts.into_iter().all(|fact| self.holds(fact))
    }
}

// Numeric values are compared bitwise so that `Eq` and `Hash` agree.
impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
            && self.numeric.len() == other.numeric.len()
            && self
                .numeric
                .iter()
                .zip(&other.numeric)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
        for value in &self.numeric {
            value.to_bits().hash(state);
        }
    }
}
