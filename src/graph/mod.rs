pub mod arena;
pub mod branch;
pub mod building;
pub mod snapshot;
pub mod term;
pub mod validation;

pub use branch::{Branch, BranchId};
pub use term::{Term, TermId, TermStatus};

use std::{collections::HashSet, rc::Rc};

use crate::runtime::{
    function::{Function, FunctionKind},
    types::{TypeRef, default_value},
};

use self::arena::Arena;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("unknown branch {0}")]
    UnknownBranch(BranchId),
    #[error("unknown term {0}")]
    UnknownTerm(TermId),
    #[error("term {0} is not a function")]
    NotAFunction(TermId),
    #[error("term {0} has no nested branch")]
    NoNestedBranch(TermId),
}

/// Owner of every term and branch. Everything else holds ids.
#[derive(Debug, Default)]
pub struct Graph {
    terms: Arena<Term>,
    branches: Arena<Branch>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_branch(&mut self, parent: Option<BranchId>) -> BranchId {
        BranchId(
            self.branches
                .insert_with(|id| Branch::new(BranchId(id), parent, None)),
        )
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(id.0)
    }

    pub fn branch_mut(&mut self, id: BranchId) -> Option<&mut Branch> {
        self.branches.get_mut(id.0)
    }

    pub fn term(&self, id: TermId) -> Option<&Term> {
        self.terms.get(id.0)
    }

    pub fn term_mut(&mut self, id: TermId) -> Option<&mut Term> {
        self.terms.get_mut(id.0)
    }

    pub fn contains_term(&self, id: TermId) -> bool {
        self.terms.contains(id.0)
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Appends a term without any resolution. `World::append` is the usual
    /// entry point; it resolves overloads and specializes the output type.
    pub fn append_raw(
        &mut self,
        branch: BranchId,
        function: TermId,
        inputs: Vec<TermId>,
        declared_type: TypeRef,
    ) -> Result<TermId, GraphError> {
        let index = self
            .branch(branch)
            .ok_or(GraphError::UnknownBranch(branch))?
            .len();
        let output = default_value(&declared_type);
        let id = TermId(self.terms.insert_with(|id| Term {
            id: TermId(id),
            owning_branch: branch,
            index,
            inputs,
            function,
            declared_type,
            output,
            state: None,
            nested: None,
            name: None,
            status: TermStatus::Pending,
            static_error: None,
            trainable: false,
            function_record: None,
        }));
        if let Some(owner) = self.branch_mut(branch) {
            owner.terms.push(id);
        }
        Ok(id)
    }

    pub fn bind_name(&mut self, branch: BranchId, term: TermId, name: &str) -> Result<(), GraphError> {
        let target = self.terms.get_mut(term.0).ok_or(GraphError::UnknownTerm(term))?;
        target.name = Some(name.to_string());
        let scope = self
            .branches
            .get_mut(branch.0)
            .ok_or(GraphError::UnknownBranch(branch))?;
        scope.names.insert(name.to_string(), term);
        Ok(())
    }

    pub fn lookup_local(&self, branch: BranchId, name: &str) -> Option<TermId> {
        self.branch(branch)?.get_named(name)
    }

    /// Lexical lookup walking enclosing scopes up to the kernel.
    pub fn lookup(&self, branch: BranchId, name: &str) -> Option<TermId> {
        let mut current = Some(branch);
        while let Some(id) = current {
            let scope = self.branch(id)?;
            if let Some(found) = scope.get_named(name) {
                return Some(found);
            }
            current = scope.parent;
        }
        None
    }

    pub fn nested_id(&self, term: TermId) -> Option<BranchId> {
        self.term(term)?.nested
    }

    pub fn nested(&mut self, term: TermId) -> Option<&mut Branch> {
        let id = self.nested_id(term)?;
        self.branch_mut(id)
    }

    /// Returns the term's nested branch, creating it on first use.
    pub fn create_nested(&mut self, term: TermId) -> Result<BranchId, GraphError> {
        let owner = self.term(term).ok_or(GraphError::UnknownTerm(term))?;
        if let Some(existing) = owner.nested {
            return Ok(existing);
        }
        let parent = owner.owning_branch;
        let nested = BranchId(
            self.branches
                .insert_with(|id| Branch::new(BranchId(id), Some(parent), Some(term))),
        );
        if let Some(owner) = self.term_mut(term) {
            owner.nested = Some(nested);
        }
        Ok(nested)
    }

    pub fn set_input(&mut self, term: TermId, index: usize, input: TermId) -> Result<(), GraphError> {
        let target = self.term_mut(term).ok_or(GraphError::UnknownTerm(term))?;
        if target.inputs.len() <= index {
            target.inputs.resize(index + 1, TermId::NULL);
        }
        target.inputs[index] = input;
        Ok(())
    }

    /// Function record of a function-value term.
    pub fn record_of(&self, function: TermId) -> Option<Rc<Function>> {
        self.term(function)?.function_record.clone()
    }

    /// Function record of the function a term applies.
    pub fn function_of(&self, term: TermId) -> Option<Rc<Function>> {
        self.record_of(self.term(term)?.function)
    }

    pub fn kind_of(&self, term: TermId) -> Option<FunctionKind> {
        self.function_of(term).map(|record| record.kind)
    }

    pub fn is_descendant(&self, branch: BranchId, ancestor: BranchId) -> bool {
        let mut current = Some(branch);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.branch(id).and_then(|b| b.parent);
        }
        false
    }

    /// Every term in `branch` and its nested branches, depth first.
    pub fn walk(&self, branch: BranchId) -> Vec<TermId> {
        let mut out = Vec::new();
        self.walk_into(branch, &mut out);
        out
    }

    fn walk_into(&self, branch: BranchId, out: &mut Vec<TermId>) {
        let Some(scope) = self.branch(branch) else {
            return;
        };
        for id in scope.iter() {
            out.push(id);
            if let Some(nested) = self.nested_id(id) {
                self.walk_into(nested, out);
            }
        }
    }

    /// Frees a term, its nested branches and their terms. Every remaining
    /// reference to a freed term is rewritten to [`TermId::NULL`].
    pub fn delete_term(&mut self, term: TermId) -> Result<(), GraphError> {
        let owning_branch = self
            .term(term)
            .ok_or(GraphError::UnknownTerm(term))?
            .owning_branch;

        let mut doomed = vec![term];
        if let Some(nested) = self.nested_id(term) {
            doomed.extend(self.walk(nested));
        }
        let mut doomed_branches = Vec::new();
        for &id in &doomed {
            if let Some(nested) = self.nested_id(id) {
                doomed_branches.push(nested);
            }
        }

        let freed: HashSet<TermId> = doomed.iter().copied().collect();
        let removed: Vec<Term> = doomed.iter().filter_map(|id| self.terms.remove(id.0)).collect();
        for id in doomed_branches {
            self.branches.remove(id.0);
        }

        if let Some(first) = removed.first() {
            self.unlink(owning_branch, term, first);
        }

        for (_, dependent) in self.terms.iter_mut() {
            for input in dependent.inputs.iter_mut() {
                if freed.contains(input) {
                    *input = TermId::NULL;
                }
            }
            if freed.contains(&dependent.function) {
                dependent.function = TermId::NULL;
            }
        }
        for (_, scope) in self.branches.iter_mut() {
            if scope.owner.is_some_and(|owner| freed.contains(&owner)) {
                scope.owner = None;
            }
        }
        Ok(())
    }

    fn unlink(&mut self, branch: BranchId, term: TermId, removed: &Term) {
        let terms = &mut self.terms;
        let Some(scope) = self.branches.get_mut(branch.0) else {
            return;
        };
        scope.terms.retain(|id| *id != term);
        for (index, id) in scope.terms.iter().enumerate() {
            if let Some(remaining) = terms.get_mut(id.0) {
                remaining.index = index;
            }
        }

        let Some(name) = removed.name.as_deref() else {
            return;
        };
        if scope.names.get(name) != Some(&term) {
            return;
        }
        let earlier = scope
            .terms
            .iter()
            .rev()
            .find(|id| terms.get(id.0).and_then(|t| t.name.as_deref()) == Some(name))
            .copied();
        match earlier {
            Some(id) => {
                scope.names.insert(name.to_string(), id);
            }
            None => {
                scope.names.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::BuiltinTypes;

    fn graph_with_branch() -> (Graph, BranchId, BuiltinTypes) {
        let mut graph = Graph::new();
        let branch = graph.create_branch(None);
        (graph, branch, BuiltinTypes::new())
    }

    #[test]
    fn append_tracks_index() {
        let (mut graph, branch, types) = graph_with_branch();
        let a = graph.append_raw(branch, TermId::NULL, vec![], types.int.clone()).unwrap();
        let b = graph.append_raw(branch, TermId::NULL, vec![a], types.int.clone()).unwrap();
        assert_eq!(graph.term(a).unwrap().index, 0);
        assert_eq!(graph.term(b).unwrap().index, 1);
        assert_eq!(graph.term(b).unwrap().input(0), a);
        assert_eq!(graph.term(b).unwrap().input(5), TermId::NULL);
    }

    #[test]
    fn lookup_walks_parent_scopes() {
        let (mut graph, outer, types) = graph_with_branch();
        let x = graph.append_raw(outer, TermId::NULL, vec![], types.int.clone()).unwrap();
        graph.bind_name(outer, x, "x").unwrap();
        let holder = graph.append_raw(outer, TermId::NULL, vec![], types.any.clone()).unwrap();
        let inner = graph.create_nested(holder).unwrap();

        assert_eq!(graph.lookup(inner, "x"), Some(x));
        assert_eq!(graph.lookup_local(inner, "x"), None);
        assert!(graph.is_descendant(inner, outer));
        assert_eq!(graph.branch(inner).unwrap().owner, Some(holder));
    }

    #[test]
    fn rebinding_does_not_touch_existing_inputs() {
        let (mut graph, branch, types) = graph_with_branch();
        let first = graph.append_raw(branch, TermId::NULL, vec![], types.int.clone()).unwrap();
        graph.bind_name(branch, first, "x").unwrap();
        let user = graph.append_raw(branch, TermId::NULL, vec![first], types.int.clone()).unwrap();
        let second = graph.append_raw(branch, TermId::NULL, vec![], types.int.clone()).unwrap();
        graph.bind_name(branch, second, "x").unwrap();

        assert_eq!(graph.lookup(branch, "x"), Some(second));
        assert_eq!(graph.term(user).unwrap().input(0), first);
    }

    #[test]
    fn delete_rewrites_dependents_and_rebinds() {
        let (mut graph, branch, types) = graph_with_branch();
        let first = graph.append_raw(branch, TermId::NULL, vec![], types.int.clone()).unwrap();
        graph.bind_name(branch, first, "x").unwrap();
        let second = graph.append_raw(branch, TermId::NULL, vec![], types.int.clone()).unwrap();
        graph.bind_name(branch, second, "x").unwrap();
        let user = graph.append_raw(branch, TermId::NULL, vec![second], types.int.clone()).unwrap();

        graph.delete_term(second).unwrap();

        assert!(!graph.contains_term(second));
        assert_eq!(graph.term(user).unwrap().input(0), TermId::NULL);
        assert_eq!(graph.term(user).unwrap().index, 1);
        assert_eq!(graph.lookup(branch, "x"), Some(first));
    }

    #[test]
    fn delete_frees_nested_branches() {
        let (mut graph, branch, types) = graph_with_branch();
        let holder = graph.append_raw(branch, TermId::NULL, vec![], types.any.clone()).unwrap();
        let inner = graph.create_nested(holder).unwrap();
        let inside = graph.append_raw(inner, TermId::NULL, vec![], types.int.clone()).unwrap();
        let outside = graph.append_raw(branch, TermId::NULL, vec![inside], types.int.clone()).unwrap();

        graph.delete_term(holder).unwrap();

        assert!(graph.branch(inner).is_none());
        assert!(!graph.contains_term(inside));
        assert_eq!(graph.term(outside).unwrap().input(0), TermId::NULL);
    }

    #[test]
    fn set_input_extends_with_null() {
        let (mut graph, branch, types) = graph_with_branch();
        let a = graph.append_raw(branch, TermId::NULL, vec![], types.int.clone()).unwrap();
        let b = graph.append_raw(branch, TermId::NULL, vec![], types.int.clone()).unwrap();
        graph.set_input(b, 2, a).unwrap();
        assert_eq!(graph.term(b).unwrap().inputs, vec![TermId::NULL, TermId::NULL, a]);
    }
}
