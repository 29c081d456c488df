//! XML answers from the NameBank `namebank_search` web service.
//!
//! Name strings arrive base64 encoded. Each `scientificNames/value` element is
//! one candidate; vernacular matches are skipped.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::events::Event;

use super::{DocumentParser, split_qname};
use crate::domain::{DocumentFormat, LSID_PREFIX};
use crate::error::ParseError;
use crate::model::{DC_NS, ResultSet, Statement, Taxa, TaxonEntry, UBIO_NS};

const FORMAT: DocumentFormat = DocumentFormat::UbioSearch;

#[derive(Debug, Clone, Copy, Default)]
pub struct UbioSearchParser;

impl DocumentParser for UbioSearchParser {
    fn format(&self) -> DocumentFormat {
        FORMAT
    }

    fn parse(&self, bytes: &[u8]) -> Result<ResultSet, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|err| ParseError::malformed(FORMAT, err))?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty { format: FORMAT });
        }
        let rows = read_rows(text)?;
        let entries = rows
            .into_iter()
            .map(Row::into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        let mut set = ResultSet::default();
        set.namespaces.declare("dc", DC_NS);
        set.namespaces.declare("ubio", UBIO_NS);
        set.taxa.push(Taxa {
            label: None,
            entries,
        });
        Ok(set)
    }
}

#[derive(Debug, Default)]
struct Row {
    namebank_id: Option<String>,
    name_string: Option<String>,
    full_name_string: Option<String>,
    rank_name: Option<String>,
    package_name: Option<String>,
}

impl Row {
    fn set(&mut self, field: &str, value: String) {
        let value = value.trim().to_string();
        if value.is_empty() {
            return;
        }
        match field {
            "namebankID" => self.namebank_id = Some(value),
            "nameString" => self.name_string = Some(value),
            "fullNameString" => self.full_name_string = Some(value),
            "rankName" => self.rank_name = Some(value),
            "packageName" => self.package_name = Some(value),
            _ => {}
        }
    }

    fn into_entry(self) -> Result<TaxonEntry, ParseError> {
        let name = self.name_string.as_deref().map(decode_name).transpose()?;
        let full_name = self
            .full_name_string
            .as_deref()
            .map(decode_name)
            .transpose()?;

        let mut entry = TaxonEntry::new(
            name.clone()
                .or_else(|| full_name.clone())
                .unwrap_or_default(),
        );
        entry.description = full_name;
        if let Some(id) = &self.namebank_id {
            let lsid = format!("{LSID_PREFIX}{id}");
            entry.add_statement(Statement::literal("dc:identifier", lsid.clone()));
            entry.add_statement(Statement::literal("ubio:namebankID", id.clone()));
            entry.guid = Some(lsid);
        }
        if let Some(rank) = self.rank_name {
            entry.add_statement(Statement::literal("ubio:rankName", rank));
        }
        if let Some(package) = self.package_name {
            entry.add_statement(Statement::literal("ubio:packageName", package));
        }
        Ok(entry)
    }
}

fn decode_name(encoded: &str) -> Result<String, ParseError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|err| ParseError::malformed(FORMAT, format!("name string {encoded:?}: {err}")))?;
    String::from_utf8(bytes)
        .map_err(|err| ParseError::malformed(FORMAT, format!("name string {encoded:?}: {err}")))
}

fn read_rows(text: &str) -> Result<Vec<Row>, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut path: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    let mut current: Option<Row> = None;
    let mut field_text = String::new();
    let mut error_text: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| ParseError::malformed(FORMAT, err))?;
        match event {
            Event::Start(ref e) => {
                let (_, local) = split_qname(e.name().as_ref());
                if path.is_empty() && local != "results" {
                    return Err(ParseError::malformed(
                        FORMAT,
                        format!("expected <results> root, found <{local}>"),
                    ));
                }
                path.push(local);
                field_text.clear();
                if in_scientific_value(&path) {
                    current = Some(Row::default());
                }
                if is_error(&path) {
                    error_text = Some(String::new());
                }
            }
            Event::Empty(ref e) => {
                let (_, local) = split_qname(e.name().as_ref());
                if path.is_empty() && local != "results" {
                    return Err(ParseError::malformed(
                        FORMAT,
                        format!("expected <results> root, found <{local}>"),
                    ));
                }
            }
            Event::Text(ref e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| ParseError::malformed(FORMAT, err))?;
                field_text.push_str(&unescaped);
            }
            Event::CData(ref e) => {
                field_text.push_str(&String::from_utf8_lossy(&e[..]));
            }
            Event::End(_) => {
                if is_error(&path) {
                    error_text = Some(field_text.trim().to_string());
                } else if in_scientific_value(&path) {
                    if let Some(row) = current.take() {
                        rows.push(row);
                    }
                } else if path.len() == 4 && path[1] == "scientificNames" && path[2] == "value" {
                    if let (Some(row), Some(field)) = (current.as_mut(), path.last()) {
                        row.set(field, std::mem::take(&mut field_text));
                    }
                }
                field_text.clear();
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(message) = error_text {
        return Err(ParseError::Upstream {
            format: FORMAT,
            message,
        });
    }
    Ok(rows)
}

fn in_scientific_value(path: &[String]) -> bool {
    path.len() == 3 && path[1] == "scientificNames" && path[2] == "value"
}

fn is_error(path: &[String]) -> bool {
    path.len() == 2 && path[1] == "error"
}
