use crate::name::Atom;
use std::collections::BTreeSet;
use std::fmt::Display;

/// The free atoms a term depends on, together with the term's dangling bound
/// indices. The bound part is relative to the term's own position: index 0 is
/// the innermost enclosing binder not contained in the term itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssumptionSet {
    atoms: BTreeSet<Atom>,
    bounds: BTreeSet<usize>,
}

impl Display for AssumptionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for a in &self.atoms {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
            first = false;
        }
        Ok(())
    }
}

impl AssumptionSet {
    pub fn empty() -> AssumptionSet {
        Default::default()
    }

    pub fn singleton_atom(a: Atom) -> AssumptionSet {
        AssumptionSet {
            atoms: BTreeSet::from([a]),
            bounds: BTreeSet::new(),
        }
    }

    pub fn singleton_bound(k: usize) -> AssumptionSet {
        AssumptionSet {
            atoms: BTreeSet::new(),
            bounds: BTreeSet::from([k]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty() && self.bounds.is_empty()
    }

    pub fn mem_atom(&self, a: Atom) -> bool {
        self.atoms.contains(&a)
    }

    pub fn atoms(&self) -> impl Iterator<Item = Atom> + '_ {
        self.atoms.iter().copied()
    }

    pub fn has_bound_at_or_above(&self, lvl: usize) -> bool {
        self.bounds.iter().any(|&i| i >= lvl)
    }

    pub fn mentions_any_atom(&self, xs: &[Atom]) -> bool {
        xs.iter().any(|x| self.atoms.contains(x))
    }

    pub fn union(&self, other: &AssumptionSet) -> AssumptionSet {
        AssumptionSet {
            atoms: self.atoms.union(&other.atoms).copied().collect(),
            bounds: self.bounds.union(&other.bounds).copied().collect(),
        }
    }

    /// The set as seen from outside `k` more binders: indices below `k` are
    /// captured and disappear, the rest shift down.
    pub fn bind(&self, k: usize) -> AssumptionSet {
        AssumptionSet {
            atoms: self.atoms.clone(),
            bounds: self
                .bounds
                .iter()
                .filter(|&&i| i >= k)
                .map(|&i| i - k)
                .collect(),
        }
    }

    /// Substitution of the indices `[lvl, lvl + hs.len())` by terms whose
    /// assumption sets are `hs`; higher indices shift down by `hs.len()`.
    pub fn instantiate(&self, hs: &[AssumptionSet], lvl: usize) -> AssumptionSet {
        let n = hs.len();
        let mut result = AssumptionSet {
            atoms: self.atoms.clone(),
            bounds: BTreeSet::new(),
        };
        for &i in &self.bounds {
            if i < lvl {
                result.bounds.insert(i);
            } else if i < lvl + n {
                result = result.union(&hs[i - lvl]);
            } else {
                result.bounds.insert(i - n);
            }
        }
        result
    }

    /// The inverse of [instantiate]: capture the atoms `xs` as the indices
    /// `lvl, lvl + 1, …`.
    pub fn abstract_atoms(&self, xs: &[Atom], lvl: usize) -> AssumptionSet {
        let mut result = self.clone();
        for (offset, x) in xs.iter().enumerate() {
            if result.atoms.remove(x) {
                result.bounds.insert(lvl + offset);
            }
        }
        result
    }
}
