use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::graph::{arena::ArenaId, term::TermId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(pub(crate) ArenaId);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch#{}", self.0.index())
    }
}

/// Ordered sequence of terms forming a lexical scope.
#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub terms: Vec<TermId>,
    /// Last binding wins.
    pub names: HashMap<String, TermId>,
    pub parent: Option<BranchId>,
    pub owner: Option<TermId>,
}

impl Branch {
    pub(crate) fn new(id: BranchId, parent: Option<BranchId>, owner: Option<TermId>) -> Self {
        Self {
            id,
            terms: Vec::new(),
            names: HashMap::new(),
            parent,
            owner,
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TermId> {
        self.terms.get(index).copied()
    }

    pub fn last(&self) -> Option<TermId> {
        self.terms.last().copied()
    }

    pub fn get_named(&self, name: &str) -> Option<TermId> {
        self.names.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = TermId> + '_ {
        self.terms.iter().copied()
    }
}
