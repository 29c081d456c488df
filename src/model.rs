use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const UBIO_NS: &str = "http://ubio.org/ns#";
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Closed set of node kinds a result set is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Taxa,
    Taxon,
    Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StatementValue {
    Literal(String),
    Resource(String),
}

impl StatementValue {
    pub fn as_str(&self) -> &str {
        match self {
            StatementValue::Literal(value) | StatementValue::Resource(value) => value,
        }
    }
}

/// A `prefix:local` predicate paired with its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub predicate: String,
    pub value: StatementValue,
}

impl Statement {
    pub fn literal(predicate: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            value: StatementValue::Literal(value.into()),
        }
    }

    pub fn resource(predicate: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            value: StatementValue::Resource(value.into()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.predicate.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.predicate
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.predicate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonEntry {
    pub name: String,
    pub guid: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub statements: Vec<Statement>,
}

impl TaxonEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_statement(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// First value recorded for `predicate`.
    pub fn value_of(&self, predicate: &str) -> Option<&str> {
        self.statements
            .iter()
            .find(|statement| statement.predicate == predicate)
            .map(|statement| statement.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxa {
    pub label: Option<String>,
    pub entries: Vec<TaxonEntry>,
}

/// Prefix to namespace URI. Inserting an existing prefix keeps the first URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceTable(BTreeMap<String, String>);

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the prefix was already bound.
    pub fn declare(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> bool {
        let prefix = prefix.into();
        if self.0.contains_key(&prefix) {
            return false;
        }
        self.0.insert(prefix, uri.into());
        true
    }

    pub fn union(&mut self, other: &NamespaceTable) {
        for (prefix, uri) in &other.0 {
            self.declare(prefix.clone(), uri.clone());
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.0.get(prefix).map(String::as_str)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.0.contains_key(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }
}

/// The document handed back to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub base_url: Option<String>,
    pub guid: Option<String>,
    pub namespaces: NamespaceTable,
    pub taxa: Vec<Taxa>,
    pub retrieved_at: Option<String>,
}

/// Borrowed view of one node while walking a [`ResultSet`].
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Project(&'a ResultSet),
    Taxa(&'a Taxa),
    Taxon(&'a TaxonEntry),
    Meta(&'a Statement),
}

impl Node<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Node::Project(_) => EntityKind::Project,
            Node::Taxa(_) => EntityKind::Taxa,
            Node::Taxon(_) => EntityKind::Taxon,
            Node::Meta(_) => EntityKind::Meta,
        }
    }
}

impl ResultSet {
    pub fn entries(&self) -> impl Iterator<Item = &TaxonEntry> {
        self.taxa.iter().flat_map(|taxa| taxa.entries.iter())
    }

    pub fn entry_count(&self) -> usize {
        self.taxa.iter().map(|taxa| taxa.entries.len()).sum()
    }

    pub fn first_entry(&self) -> Option<&TaxonEntry> {
        self.entries().next()
    }

    /// Depth-first, document order.
    pub fn walk<'a, F>(&'a self, mut visit: F)
    where
        F: FnMut(Node<'a>),
    {
        visit(Node::Project(self));
        for taxa in &self.taxa {
            visit(Node::Taxa(taxa));
            for entry in &taxa.entries {
                visit(Node::Taxon(entry));
                for statement in &entry.statements {
                    visit(Node::Meta(statement));
                }
            }
        }
    }

    /// Predicate prefixes used by some statement but missing from the namespace table.
    pub fn undeclared_prefixes(&self) -> BTreeSet<String> {
        let mut missing = BTreeSet::new();
        self.walk(|node| {
            if let Node::Meta(statement) = node {
                match statement.prefix() {
                    Some(prefix) if self.namespaces.contains(prefix) => {}
                    Some(prefix) => {
                        missing.insert(prefix.to_string());
                    }
                    None => {
                        missing.insert(String::new());
                    }
                }
            }
        });
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_declare_keeps_first_writer() {
        let mut table = NamespaceTable::new();
        assert!(table.declare("dc", DC_NS));
        assert!(!table.declare("dc", "http://example.org/other#"));
        assert_eq!(table.get("dc"), Some(DC_NS));
    }

    #[test]
    fn walk_visits_in_document_order() {
        let mut entry = TaxonEntry::new("Homo sapiens");
        entry.add_statement(Statement::literal("dc:title", "Homo sapiens"));
        let set = ResultSet {
            taxa: vec![Taxa {
                label: None,
                entries: vec![entry],
            }],
            ..ResultSet::default()
        };

        let mut kinds = Vec::new();
        set.walk(|node| kinds.push(node.kind()));
        assert_eq!(
            kinds,
            vec![
                EntityKind::Project,
                EntityKind::Taxa,
                EntityKind::Taxon,
                EntityKind::Meta
            ]
        );
    }

    #[test]
    fn undeclared_prefixes_reports_missing_namespaces() {
        let mut entry = TaxonEntry::new("Homo sapiens");
        entry.add_statement(Statement::literal("dc:title", "Homo sapiens"));
        entry.add_statement(Statement::literal("gla:rank", "species"));
        let mut set = ResultSet {
            taxa: vec![Taxa {
                label: None,
                entries: vec![entry],
            }],
            ..ResultSet::default()
        };
        set.namespaces.declare("dc", DC_NS);

        let missing = set.undeclared_prefixes();
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["gla"]);
    }
}
