//! RDF/XML record documents served by the NameBank metadata endpoint.
//!
//! Only the shape the authority emits is handled: an `rdf:RDF` root holding
//! `rdf:Description` subjects whose children are flat property elements, each
//! with either text content or an `rdf:resource` attribute. The first
//! description becomes the record; later ones are ignored.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{DocumentParser, split_qname};
use crate::domain::DocumentFormat;
use crate::error::ParseError;
use crate::model::{NamespaceTable, RDF_NS, ResultSet, Statement, Taxa, TaxonEntry};

const FORMAT: DocumentFormat = DocumentFormat::UbioMetadata;

#[derive(Debug, Clone, Copy, Default)]
pub struct UbioMetadataParser;

impl DocumentParser for UbioMetadataParser {
    fn format(&self) -> DocumentFormat {
        FORMAT
    }

    fn parse(&self, bytes: &[u8]) -> Result<ResultSet, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|err| ParseError::malformed(FORMAT, err))?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty { format: FORMAT });
        }
        let (namespaces, record) = read_record(text)?;
        let record = record.ok_or(ParseError::Empty { format: FORMAT })?;

        Ok(ResultSet {
            namespaces,
            taxa: vec![Taxa {
                label: None,
                entries: vec![record],
            }],
            ..ResultSet::default()
        })
    }
}

struct Property {
    predicate: String,
    resource: Option<String>,
    text: String,
    depth: usize,
}

fn read_record(text: &str) -> Result<(NamespaceTable, Option<TaxonEntry>), ParseError> {
    let mut reader = Reader::from_str(text);
    let mut namespaces = NamespaceTable::new();
    let mut seen_root = false;
    let mut subject: Option<String> = None;
    let mut statements: Vec<Statement> = Vec::new();
    let mut property: Option<Property> = None;
    let mut record: Option<TaxonEntry> = None;
    let mut upstream_error: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| ParseError::malformed(FORMAT, err))?;
        match event {
            Event::Start(ref e) => {
                if upstream_error.is_some() {
                    continue;
                }
                collect_namespaces(e, &mut namespaces)?;
                let (prefix, local) = split_qname(e.name().as_ref());
                if !seen_root {
                    if is_error_root(&prefix, &local) {
                        seen_root = true;
                        upstream_error = Some(String::new());
                        continue;
                    }
                    if local != "RDF" || !is_rdf(&prefix, &namespaces) {
                        return Err(ParseError::malformed(
                            FORMAT,
                            format!("expected rdf:RDF root, found <{}>", qname(&prefix, &local)),
                        ));
                    }
                    seen_root = true;
                    continue;
                }
                if let Some(open) = property.as_mut() {
                    open.depth += 1;
                    continue;
                }
                if local == "Description" && is_rdf(&prefix, &namespaces) {
                    if record.is_none() {
                        subject = Some(rdf_attr(e, "about", &namespaces)?.unwrap_or_default());
                    }
                } else if subject.is_some() {
                    property = Some(Property {
                        predicate: predicate(&prefix, &local, &namespaces)?,
                        resource: rdf_attr(e, "resource", &namespaces)?,
                        text: String::new(),
                        depth: 0,
                    });
                }
            }
            Event::Empty(ref e) => {
                if upstream_error.is_some() {
                    continue;
                }
                collect_namespaces(e, &mut namespaces)?;
                let (prefix, local) = split_qname(e.name().as_ref());
                if !seen_root {
                    if is_error_root(&prefix, &local) {
                        return Err(ParseError::Upstream {
                            format: FORMAT,
                            message: String::new(),
                        });
                    }
                    // a self-closed root is a document with no records
                    seen_root = true;
                    if local != "RDF" || !is_rdf(&prefix, &namespaces) {
                        return Err(ParseError::malformed(
                            FORMAT,
                            format!("expected rdf:RDF root, found <{}>", qname(&prefix, &local)),
                        ));
                    }
                    continue;
                }
                if property.is_some() || subject.is_none() {
                    continue;
                }
                if local == "Description" && is_rdf(&prefix, &namespaces) {
                    continue;
                }
                let predicate = predicate(&prefix, &local, &namespaces)?;
                if let Some(resource) = rdf_attr(e, "resource", &namespaces)? {
                    statements.push(Statement::resource(predicate, resource));
                }
            }
            Event::Text(ref e) => {
                if let Some(message) = upstream_error.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| ParseError::malformed(FORMAT, err))?;
                    message.push_str(&unescaped);
                } else if let Some(open) = property.as_mut().filter(|open| open.depth == 0) {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| ParseError::malformed(FORMAT, err))?;
                    open.text.push_str(&unescaped);
                }
            }
            Event::CData(ref e) => {
                if let Some(open) = property.as_mut().filter(|open| open.depth == 0) {
                    open.text.push_str(&String::from_utf8_lossy(&e[..]));
                }
            }
            Event::End(ref e) => {
                if let Some(message) = upstream_error.take() {
                    return Err(ParseError::Upstream {
                        format: FORMAT,
                        message: message.trim().to_string(),
                    });
                }
                if let Some(open) = property.as_mut() {
                    if open.depth > 0 {
                        open.depth -= 1;
                        continue;
                    }
                }
                if let Some(open) = property.take() {
                    match open.resource {
                        Some(resource) => {
                            statements.push(Statement::resource(open.predicate, resource))
                        }
                        None => {
                            let value = open.text.trim();
                            if !value.is_empty() {
                                statements.push(Statement::literal(open.predicate, value));
                            }
                        }
                    }
                    continue;
                }
                let (prefix, local) = split_qname(e.name().as_ref());
                if local == "Description" && is_rdf(&prefix, &namespaces) {
                    if let Some(about) = subject.take() {
                        record = Some(build_entry(about, std::mem::take(&mut statements)));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(ParseError::Empty { format: FORMAT });
    }
    Ok((namespaces, record))
}

fn build_entry(about: String, statements: Vec<Statement>) -> TaxonEntry {
    let mut entry = TaxonEntry {
        statements,
        ..TaxonEntry::default()
    };
    entry.name = entry
        .value_of("ubio:canonicalName")
        .or_else(|| entry.value_of("dc:title"))
        .unwrap_or(about.as_str())
        .to_string();
    entry.description = entry.value_of("dc:subject").map(str::to_string);
    entry.guid = (!about.is_empty()).then_some(about);
    entry
}

fn qname(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

/// The authority answers unknown LSIDs with a bare `<error>` document.
fn is_error_root(prefix: &str, local: &str) -> bool {
    prefix.is_empty() && local == "error"
}

fn is_rdf(prefix: &str, namespaces: &NamespaceTable) -> bool {
    namespaces.get(prefix) == Some(RDF_NS)
}

fn predicate(prefix: &str, local: &str, namespaces: &NamespaceTable) -> Result<String, ParseError> {
    if prefix.is_empty() {
        return Err(ParseError::malformed(
            FORMAT,
            format!("unprefixed property element <{local}>"),
        ));
    }
    if !namespaces.contains(prefix) {
        return Err(ParseError::malformed(
            FORMAT,
            format!("undeclared namespace prefix {prefix}"),
        ));
    }
    Ok(qname(prefix, local))
}

fn collect_namespaces(
    e: &BytesStart<'_>,
    namespaces: &mut NamespaceTable,
) -> Result<(), ParseError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::malformed(FORMAT, err))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            let uri = attr
                .unescape_value()
                .map_err(|err| ParseError::malformed(FORMAT, err))?;
            namespaces.declare(prefix, uri.into_owned());
        }
    }
    Ok(())
}

fn rdf_attr(
    e: &BytesStart<'_>,
    local_name: &str,
    namespaces: &NamespaceTable,
) -> Result<Option<String>, ParseError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::malformed(FORMAT, err))?;
        let (prefix, local) = split_qname(attr.key.as_ref());
        if local == local_name && is_rdf(&prefix, namespaces) {
            let value = attr
                .unescape_value()
                .map_err(|err| ParseError::malformed(FORMAT, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
