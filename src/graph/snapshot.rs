//! Serializable views of a branch, for golden tests and structural
//! comparison of two branches.
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    graph::{BranchId, Graph, TermId, TermStatus, validation::check_term},
    runtime::{function::FunctionKind, value, world::World},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermSnapshot {
    pub index: usize,
    pub name: Option<String>,
    pub function: String,
    pub inputs: Vec<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<BranchSnapshot>,
    pub status: TermStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchSnapshot {
    pub terms: Vec<TermSnapshot>,
}

impl BranchSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Position-independent label for an input: its name when bound, `$i` for
/// a sibling at index `i`, `^i` for a term further out.
fn input_label(graph: &Graph, branch: BranchId, input: TermId) -> String {
    let Some(term) = graph.term(input) else {
        return "null".to_string();
    };
    if let Some(name) = term.name() {
        return name.to_string();
    }
    if term.owning_branch == branch {
        format!("${}", term.index)
    } else {
        format!("^{}", term.index)
    }
}

fn function_name(graph: &Graph, term: TermId) -> String {
    graph
        .function_of(term)
        .map_or_else(|| "null".to_string(), |record| record.name.clone())
}

pub fn snapshot_branch(world: &World, branch: BranchId) -> Option<BranchSnapshot> {
    let graph = &world.graph;
    let terms = graph
        .branch(branch)?
        .iter()
        .filter_map(|id| {
            let term = graph.term(id)?;
            Some(TermSnapshot {
                index: term.index,
                name: term.name.clone(),
                function: function_name(graph, id),
                inputs: term.inputs.iter().map(|input| input_label(graph, branch, *input)).collect(),
                type_name: term.declared_type.name.clone(),
                value: value::repr(&term.output),
                state: term.state.as_ref().map(value::repr),
                nested: term.nested.and_then(|nested| snapshot_branch(world, nested)),
                status: term.status,
                error: check_term(graph, id).map(|kind| kind.to_string()),
            })
        })
        .collect();
    Some(BranchSnapshot { terms })
}

/// Hash of a branch's structure: functions, wiring, names, declared types
/// and constants, recursively. Runtime values and state are excluded, so an
/// evaluated branch fingerprints the same as a fresh copy.
pub fn branch_fingerprint(world: &World, branch: BranchId) -> String {
    let mut hasher = Sha256::new();
    hash_branch(&world.graph, branch, &mut hasher);
    to_hex(&hasher.finalize())
}

fn hash_branch(graph: &Graph, branch: BranchId, hasher: &mut Sha256) {
    let Some(terms) = graph.branch(branch).map(|b| b.iter().collect::<Vec<_>>()) else {
        return;
    };
    for id in terms {
        let Some(term) = graph.term(id) else {
            continue;
        };
        hasher.update(function_name(graph, id).as_bytes());
        hasher.update(b"(");
        for input in &term.inputs {
            hasher.update(input_label(graph, branch, *input).as_bytes());
            hasher.update(b",");
        }
        hasher.update(b")");
        if let Some(name) = term.name() {
            hasher.update(b"=");
            hasher.update(name.as_bytes());
        }
        hasher.update(b":");
        hasher.update(term.declared_type.name.as_bytes());
        if !term.is_function() && graph.kind_of(id) == Some(FunctionKind::Value) {
            hasher.update(b"#");
            hasher.update(value::repr(&term.output).as_bytes());
        }
        if let Some(nested) = term.nested {
            hasher.update(b"{");
            hash_branch(graph, nested, hasher);
            hasher.update(b"}");
        }
        hasher.update(b";");
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
