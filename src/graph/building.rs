//! Programmatic graph construction. Parsers and hosts build terms through
//! these calls; each one leaves the graph in the shape the evaluator expects
//! (nested branches, input placeholders, static-error annotations).
use std::{collections::BTreeSet, rc::Rc};

use crate::{
    graph::{BranchId, GraphError, TermId, validation::StaticErrorKind},
    runtime::{
        overload,
        function::{Function, FunctionKind, Param},
        types::{TypeRef, default_value},
        value::Value,
        world::World,
    },
};

/// Name the loop index placeholder is bound to inside a for-loop body.
pub const LOOP_INDEX_NAME: &str = "#index";

impl World {
    /// Appends `function(inputs...)`, resolving overloads statically and
    /// specializing the declared output type.
    pub fn append(&mut self, branch: BranchId, function: TermId, inputs: Vec<TermId>) -> Result<TermId, GraphError> {
        let output_type = self
            .graph
            .record_of(function)
            .map(|record| record.output_type.clone())
            .unwrap_or_else(|| self.types.builtins().any.clone());
        let term = self.graph.append_raw(branch, function, inputs, output_type)?;
        overload::resolve_on_append(self, term);
        Ok(term)
    }

    pub fn append_named(
        &mut self,
        branch: BranchId,
        name: &str,
        function: TermId,
        inputs: Vec<TermId>,
    ) -> Result<TermId, GraphError> {
        let term = self.append(branch, function, inputs)?;
        self.graph.bind_name(branch, term, name)?;
        Ok(term)
    }

    /// Applies the function visible as `name` from `branch`. An unresolved
    /// name yields an `unknown_function` term carrying a static error.
    pub fn call(&mut self, branch: BranchId, name: &str, inputs: Vec<TermId>) -> Result<TermId, GraphError> {
        let function = self
            .graph
            .lookup(branch, name)
            .filter(|id| self.graph.term(*id).is_some_and(|t| t.is_function()));
        match function {
            Some(function) => self.append(branch, function, inputs),
            None => self.append_unknown_function(branch, name, inputs),
        }
    }

    pub fn call_named(
        &mut self,
        branch: BranchId,
        name: &str,
        function: &str,
        inputs: Vec<TermId>,
    ) -> Result<TermId, GraphError> {
        let term = self.call(branch, function, inputs)?;
        self.graph.bind_name(branch, term, name)?;
        Ok(term)
    }

    pub fn create_value(&mut self, branch: BranchId, value: Value, name: Option<&str>) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().value;
        let term = self
            .graph
            .append_raw(branch, function, Vec::new(), value.type_().clone())?;
        if let Some(t) = self.graph.term_mut(term) {
            t.output = value;
        }
        if let Some(name) = name {
            self.graph.bind_name(branch, term, name)?;
        }
        Ok(term)
    }

    pub fn create_int(&mut self, branch: BranchId, v: i64, name: Option<&str>) -> Result<TermId, GraphError> {
        let value = self.types.builtins().make_int(v);
        self.create_value(branch, value, name)
    }

    pub fn create_float(&mut self, branch: BranchId, v: f64, name: Option<&str>) -> Result<TermId, GraphError> {
        let value = self.types.builtins().make_float(v);
        self.create_value(branch, value, name)
    }

    pub fn create_bool(&mut self, branch: BranchId, v: bool, name: Option<&str>) -> Result<TermId, GraphError> {
        let value = self.types.builtins().make_bool(v);
        self.create_value(branch, value, name)
    }

    pub fn create_string(&mut self, branch: BranchId, v: &str, name: Option<&str>) -> Result<TermId, GraphError> {
        let value = self.types.builtins().make_string(v);
        self.create_value(branch, value, name)
    }

    /// Constant list with a `List<T>` type when the items agree on one.
    pub fn create_list(&mut self, branch: BranchId, items: Vec<Value>, name: Option<&str>) -> Result<TermId, GraphError> {
        let item_types: Vec<TypeRef> = items.iter().map(|item| item.type_().clone()).collect();
        let element = overload::common_type(self.types.builtins(), &item_types);
        let list_type = self.types.list_of(&element);
        let value = Value::new(list_type, crate::runtime::value::Storage::List(items));
        self.create_value(branch, value, name)
    }

    /// Replaces the constant of a value term.
    pub fn set_value(&mut self, term: TermId, value: Value) -> Result<(), GraphError> {
        let t = self.graph.term_mut(term).ok_or(GraphError::UnknownTerm(term))?;
        t.declared_type = value.type_().clone();
        t.output = value;
        Ok(())
    }

    pub fn set_trainable(&mut self, term: TermId, trainable: bool) -> Result<(), GraphError> {
        let t = self.graph.term_mut(term).ok_or(GraphError::UnknownTerm(term))?;
        t.trainable = trainable;
        Ok(())
    }

    /// `state <type_> <name> = <initial>`. The initializer branch is nested
    /// under the returned term and only evaluated while the state is absent.
    pub fn declare_state(
        &mut self,
        branch: BranchId,
        name: &str,
        type_: TypeRef,
        initial: Option<Value>,
    ) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().declared_state;
        let term = self.append(branch, function, Vec::new())?;
        if let Some(t) = self.graph.term_mut(term) {
            t.output = default_value(&type_);
            t.declared_type = type_;
        }
        self.graph.bind_name(branch, term, name)?;
        let initializer = self.graph.create_nested(term)?;
        if let Some(initial) = initial {
            self.create_value(initializer, initial, None)?;
        }
        Ok(term)
    }

    pub fn state_initializer(&self, term: TermId) -> Option<BranchId> {
        self.graph.nested_id(term)
    }

    /// Defines a subroutine named `name` in `branch` with one input
    /// placeholder per parameter. Terms appended to the returned body become
    /// the subroutine's implementation.
    pub fn define_subroutine(
        &mut self,
        branch: BranchId,
        name: &str,
        params: &[(&str, TypeRef)],
        output_type: TypeRef,
    ) -> Result<TermId, GraphError> {
        let record = Function::new(name, FunctionKind::Subroutine, output_type).impure();
        let def = self.define_function(branch, record)?;
        let body = self.graph.create_nested(def)?;
        for (param, type_) in params {
            self.add_input_placeholder(body, param, type_.clone())?;
        }
        Ok(def)
    }

    pub fn subroutine_body(&self, def: TermId) -> Result<BranchId, GraphError> {
        self.graph.nested_id(def).ok_or(GraphError::NoNestedBranch(def))
    }

    /// Appends a parameter to a subroutine body, extending the owning
    /// function record's signature.
    pub fn add_input_placeholder(&mut self, body: BranchId, name: &str, type_: TypeRef) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().input_placeholder;
        let placeholder = self
            .graph
            .append_raw(body, function, Vec::new(), type_.clone())?;
        self.graph.bind_name(body, placeholder, name)?;

        let owner = self
            .graph
            .branch(body)
            .ok_or(GraphError::UnknownBranch(body))?
            .owner;
        if let Some(owner) = owner {
            if let Some(record) = self.graph.term_mut(owner).and_then(|t| t.function_record.as_mut()) {
                Rc::make_mut(record).inputs.push(Param::new(name, type_));
            }
        }
        Ok(placeholder)
    }

    /// Empty if-block; add cases in order with [`World::add_case`].
    pub fn if_block(&mut self, branch: BranchId) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().if_block;
        let term = self.append(branch, function, Vec::new())?;
        self.graph.create_nested(term)?;
        Ok(term)
    }

    /// Adds a case to an if-block and returns its body. `None` is the
    /// else-case.
    pub fn add_case(&mut self, if_block: TermId, condition: Option<TermId>) -> Result<BranchId, GraphError> {
        let cases = self.graph.create_nested(if_block)?;
        let function = self.kernel_functions().case;
        let case = self.append(cases, function, condition.into_iter().collect())?;
        self.graph.create_nested(case)
    }

    /// Exposes names rebound inside the cases of `if_block` to the branch
    /// holding the block. A name is joined when it is already visible there,
    /// or when every case of a block with an else-case binds it. Each join
    /// term takes the block, then one binding per case (the outer binding
    /// for cases that leave the name alone), then the outer binding again
    /// when no else-case exists. Call once, after the last case is built.
    pub fn finish_if_block(&mut self, if_block: TermId) -> Result<Vec<TermId>, GraphError> {
        let outer = self
            .graph
            .term(if_block)
            .map(|t| t.owning_branch)
            .ok_or(GraphError::UnknownTerm(if_block))?;
        let cases: Vec<TermId> = self
            .graph
            .nested_id(if_block)
            .and_then(|id| self.graph.branch(id))
            .map(|b| b.terms.clone())
            .unwrap_or_default();
        let has_else = cases
            .last()
            .and_then(|case| self.graph.term(*case))
            .is_some_and(|t| t.inputs.is_empty());
        let bodies: Vec<Option<BranchId>> = cases.iter().map(|case| self.graph.nested_id(*case)).collect();

        let mut names = BTreeSet::new();
        for body in bodies.iter().flatten() {
            if let Some(branch) = self.graph.branch(*body) {
                names.extend(branch.names.keys().filter(|name| !name.starts_with('#')).cloned());
            }
        }

        let join = self.kernel_functions().join;
        let mut joins = Vec::new();
        for name in names {
            let outer_binding = self.graph.lookup(outer, &name);
            let per_case: Vec<Option<TermId>> = bodies
                .iter()
                .map(|body| body.and_then(|b| self.graph.lookup_local(b, &name)))
                .collect();
            let mut inputs = vec![if_block];
            match outer_binding {
                Some(fallback) => {
                    inputs.extend(per_case.iter().map(|binding| binding.unwrap_or(fallback)));
                    if !has_else {
                        inputs.push(fallback);
                    }
                }
                None if has_else && per_case.iter().all(Option::is_some) => {
                    inputs.extend(per_case.iter().flatten());
                }
                None => continue,
            }
            let term = self.append_named(outer, &name, join, inputs)?;
            log::debug!("{}: joins `{}` out of {}", term, name, if_block);
            joins.push(term);
        }
        Ok(joins)
    }

    /// `for <iterator> in <list>`. The body starts with the iterator
    /// placeholder followed by the index placeholder.
    pub fn for_loop(&mut self, branch: BranchId, list: TermId, iterator: &str) -> Result<(TermId, BranchId), GraphError> {
        let function = self.kernel_functions().for_loop;
        let term = self.append(branch, function, vec![list])?;
        let body = self.graph.create_nested(term)?;

        let element_type = self
            .graph
            .term(list)
            .and_then(|t| t.declared_type.element.clone())
            .unwrap_or_else(|| self.types.builtins().any.clone());
        let placeholder = self.kernel_functions().input_placeholder;
        let iterator_term = self.graph.append_raw(body, placeholder, Vec::new(), element_type)?;
        self.graph.bind_name(body, iterator_term, iterator)?;
        let int = self.types.builtins().int.clone();
        let index_term = self.graph.append_raw(body, placeholder, Vec::new(), int)?;
        self.graph.bind_name(body, index_term, LOOP_INDEX_NAME)?;
        Ok((term, body))
    }

    pub fn do_once(&mut self, branch: BranchId) -> Result<(TermId, BranchId), GraphError> {
        let function = self.kernel_functions().do_once;
        let term = self.append(branch, function, Vec::new())?;
        let body = self.graph.create_nested(term)?;
        Ok((term, body))
    }

    pub fn ignore_error(&mut self, branch: BranchId) -> Result<(TermId, BranchId), GraphError> {
        let function = self.kernel_functions().ignore_error;
        let term = self.append(branch, function, Vec::new())?;
        let body = self.graph.create_nested(term)?;
        Ok((term, body))
    }

    pub fn append_return(&mut self, branch: BranchId, value: Option<TermId>) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().return_;
        self.append(branch, function, value.into_iter().collect())
    }

    pub fn append_break(&mut self, branch: BranchId) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().break_;
        self.append(branch, function, Vec::new())
    }

    pub fn append_continue(&mut self, branch: BranchId) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().continue_;
        self.append(branch, function, Vec::new())
    }

    /// Term that pushes `desired` into `target` each time it is evaluated.
    pub fn append_feedback(&mut self, branch: BranchId, target: TermId, desired: TermId) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().feedback;
        self.append(branch, function, vec![target, desired])
    }

    pub fn append_unknown_function(
        &mut self,
        branch: BranchId,
        name: &str,
        inputs: Vec<TermId>,
    ) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().unknown_function;
        self.append_annotated(branch, function, inputs, StaticErrorKind::UnknownFunction(name.to_string()))
    }

    pub fn append_unknown_identifier(&mut self, branch: BranchId, name: &str) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().unknown_identifier;
        let term = self.append_annotated(
            branch,
            function,
            Vec::new(),
            StaticErrorKind::UnknownIdentifier(name.to_string()),
        )?;
        self.graph.bind_name(branch, term, name)?;
        Ok(term)
    }

    pub fn append_unknown_type(&mut self, branch: BranchId, type_name: &str) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().unknown_type;
        self.append_annotated(branch, function, Vec::new(), StaticErrorKind::UnknownType(type_name.to_string()))
    }

    pub fn append_unknown_field(&mut self, branch: BranchId, object: TermId, field: &str) -> Result<TermId, GraphError> {
        let function = self.kernel_functions().unknown_field;
        self.append_annotated(branch, function, vec![object], StaticErrorKind::UnknownField(field.to_string()))
    }

    fn append_annotated(
        &mut self,
        branch: BranchId,
        function: TermId,
        inputs: Vec<TermId>,
        error: StaticErrorKind,
    ) -> Result<TermId, GraphError> {
        let term = self.append(branch, function, inputs)?;
        if let Some(t) = self.graph.term_mut(term) {
            t.static_error = Some(error);
        }
        Ok(term)
    }
}
