use crate::model::{NamespaceTable, TaxonEntry};

/// Predicates whose value replaces the candidate's display name, in priority order.
pub const CANONICAL_NAME_PREDICATES: [&str; 2] = ["ubio:canonicalName", "dc:title"];

/// Folds an authoritative record into a search candidate.
///
/// Statements from `source` are appended after the existing ones, duplicates
/// included. Namespaces are unioned with first-writer-wins. The display name is
/// the only field that gets overwritten, and only when `source` carries a
/// canonical name.
pub fn merge(
    target: &mut TaxonEntry,
    source: &TaxonEntry,
    target_namespaces: &mut NamespaceTable,
    source_namespaces: &NamespaceTable,
) {
    target.statements.extend(source.statements.iter().cloned());
    target_namespaces.union(source_namespaces);

    let canonical = CANONICAL_NAME_PREDICATES
        .iter()
        .find_map(|predicate| source.value_of(predicate))
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if let Some(name) = canonical {
        target.name = name.to_string();
    }
}
