use std::fmt::Write as _;
use std::io::{self, Write};

use quick_xml::escape::escape;

use crate::domain::OutputFormat;
use crate::error::TaxaError;
use crate::model::{Node, ResultSet, StatementValue};
use crate::service::{ProgressEvent, ProgressSink, ProgressSinkKind, Response};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Serializes a result set in one of the advertised formats.
pub fn render(set: &ResultSet, format: OutputFormat) -> Result<String, TaxaError> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(set).map_err(|err| TaxaError::Render {
            format,
            reason: err.to_string(),
        }),
        OutputFormat::Nexus => Ok(render_nexus(set)),
        OutputFormat::Nexml => Ok(render_nexml(set)),
        OutputFormat::Html => Err(TaxaError::UnsupportedOutput(format)),
    }
}

fn render_nexus(set: &ResultSet) -> String {
    let labels = set
        .entries()
        .map(|entry| nexus_quote(&entry.name))
        .collect::<Vec<_>>();
    let mut out = String::from("#NEXUS\n");
    if let Some(guid) = &set.guid {
        let _ = writeln!(out, "[ guid: {} ]", guid.replace(['[', ']'], ""));
    }
    out.push_str("BEGIN TAXA;\n");
    let _ = writeln!(out, "\tDIMENSIONS NTAX={};", labels.len());
    out.push_str("\tTAXLABELS\n");
    for label in &labels {
        let _ = writeln!(out, "\t\t{label}");
    }
    out.push_str("\t;\nEND;\n");
    out
}

fn nexus_quote(label: &str) -> String {
    format!("'{}'", label.replace('\'', "''"))
}

fn render_nexml(set: &ResultSet) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let mut otus = 0usize;
    let mut otu = 0usize;
    let mut open_otu = false;
    let mut open_otus = false;

    let close_otu = |out: &mut String, open: &mut bool| {
        if *open {
            out.push_str("    </otu>\n");
            *open = false;
        }
    };

    set.walk(|node| match node {
        Node::Project(project) => {
            out.push_str("<nex:nexml version=\"0.9\" xmlns:nex=\"http://www.nexml.org/2009\"");
            out.push_str(" xmlns=\"http://www.nexml.org/2009\"");
            out.push_str(" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"");
            for (prefix, uri) in project.namespaces.iter() {
                if matches!(prefix, "nex" | "xsi" | "") {
                    continue;
                }
                let _ = write!(out, " xmlns:{prefix}=\"{}\"", escape(uri));
            }
            if let Some(base) = &project.base_url {
                let _ = write!(out, " xml:base=\"{}\"", escape(base.as_str()));
            }
            out.push_str(">\n");
        }
        Node::Taxa(taxa) => {
            close_otu(&mut out, &mut open_otu);
            if open_otus {
                out.push_str("  </otus>\n");
            }
            otus += 1;
            let label = taxa.label.as_deref().unwrap_or("");
            let _ = writeln!(out, "  <otus id=\"otus{otus}\" label=\"{}\">", escape(label));
            open_otus = true;
        }
        Node::Taxon(entry) => {
            close_otu(&mut out, &mut open_otu);
            otu += 1;
            let label = escape(entry.name.as_str());
            let _ = write!(out, "    <otu id=\"otu{otu}\" label=\"{label}\"");
            if let Some(guid) = &entry.guid {
                let _ = write!(out, " about=\"{}\"", escape(guid.as_str()));
            }
            out.push_str(">\n");
            open_otu = true;
        }
        Node::Meta(statement) => {
            let property = escape(statement.predicate.as_str());
            match &statement.value {
                StatementValue::Literal(value) => {
                    let _ = writeln!(
                        out,
                        "      <meta xsi:type=\"nex:LiteralMeta\" property=\"{property}\" content=\"{}\"/>",
                        escape(value.as_str())
                    );
                }
                StatementValue::Resource(value) => {
                    let _ = writeln!(
                        out,
                        "      <meta xsi:type=\"nex:ResourceMeta\" rel=\"{property}\" href=\"{}\"/>",
                        escape(value.as_str())
                    );
                }
            }
        }
    });

    close_otu(&mut out, &mut open_otu);
    if open_otus {
        out.push_str("  </otus>\n");
    }
    out.push_str("</nex:nexml>\n");
    out
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_response(response: &Response, format: OutputFormat) -> Result<(), TaxaError> {
        let text = match response {
            Response::Redirect(url) => url.clone(),
            Response::Document(set) => render(set, format)?,
        };
        Self::print_text(&text).map_err(|err| TaxaError::Render {
            format,
            reason: err.to_string(),
        })
    }

    pub fn print_document(set: &ResultSet, format: OutputFormat) -> Result<(), TaxaError> {
        let text = render(set, format)?;
        Self::print_text(&text).map_err(|err| TaxaError::Render {
            format,
            reason: err.to_string(),
        })
    }

    fn print_text(text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr for interactive runs.
pub struct StderrProgress {
    kind: ProgressSinkKind,
}

impl StderrProgress {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self { kind }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            ProgressSinkKind::Record => "record",
            ProgressSinkKind::Search => "search",
            ProgressSinkKind::Resolve => "resolve",
        }
    }
}

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!(
                "[{}] {} ({} ms)",
                self.label(),
                event.message,
                elapsed.as_millis()
            ),
            None => eprintln!("[{}] {}", self.label(), event.message),
        }
    }
}
