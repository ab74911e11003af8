use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tempfile::TempDir;
use tracing::debug;

use super::{InvoiceDocument, StatementDocument};
use crate::error::{LedgerError, Result};

/// Shared page setup and party block. `DATA_JSON_PATH` is replaced before compiling.
const PREAMBLE: &str = r##"#let data = json("DATA_JSON_PATH")

#set page(paper: "a4", margin: (x: 2cm, y: 2cm))
#set text(font: "Helvetica", size: 10pt)

#let party(p) = [
  #text(weight: "bold")[#p.name]
  #for line in p.lines [ \ #line ]
]

#let money-table(rows) = align(right)[
  #table(
    columns: (auto, auto),
    stroke: none,
    align: (right, right),
    inset: 5pt,
    ..rows.flatten()
  )
]

#let company-footer = if data.company.tax_id != none [
  #v(2em)
  #text(size: 9pt, fill: gray)[Tax ID: #data.company.tax_id]
]
"##;

const INVOICE_TEMPLATE: &str = r##"
#grid(
  columns: (1fr, 1fr),
  align: (left, right),
  [
    #text(size: 16pt)[#party(data.company)]
  ],
  [
    #text(size: 22pt, weight: "bold")[INVOICE]
    #v(0.4em)
    #table(
      columns: (auto, auto),
      stroke: none,
      align: (right, left),
      inset: 2pt,
      [*Number:*], [#data.number],
      [*Issued:*], [#data.issue_date],
      [*Due:*], [#data.due_date],
      [*Status:*], [#data.status],
    )
  ]
)

#v(1em)
#line(length: 100%, stroke: 0.5pt + gray)
#v(1em)

#grid(
  columns: (1fr, 1fr),
  [
    #text(weight: "bold", size: 11pt)[Bill To:]
    #v(0.3em)
    #party(data.bill_to)
  ],
  [
    #text(weight: "bold", size: 11pt)[Unit:]
    #v(0.3em)
    #data.unit.label (#data.unit.kind) \
    #if data.unit.area != none [ Area: #data.unit.area \ ]
    Price: #data.unit.price
  ]
)

#v(1.5em)

#money-table((
  ([Subtotal:], [#data.subtotal]),
  ([Paid (pinned):], [#data.pinned]),
  ([Paid (in order):], [#data.in_order]),
  ([Paid:], [#data.paid]),
  (table.hline(stroke: 1pt),),
  ([*Remaining:*], [*#data.remaining*]),
))

#if data.contributions.len() > 0 [
  #v(1em)
  #text(weight: "bold")[Pinned payments]
  #table(
    columns: (1fr, auto, auto),
    align: (left, left, right),
    stroke: (x, y) => if y == 0 { (bottom: 1pt + black) } else { (bottom: 0.5pt + gray) },
    inset: 6pt,
    [*Payment*], [*Date*], [*Amount*],
    ..data.contributions.map(c => (c.payment, c.date, c.amount)).flatten()
  )
]

#if data.notes != none [
  #v(1em)
  #text(weight: "bold")[Notes:] #data.notes
]

#company-footer
"##;

const STATEMENT_TEMPLATE: &str = r##"
#grid(
  columns: (1fr, 1fr),
  align: (left, right),
  [
    #text(size: 16pt)[#party(data.company)]
  ],
  [
    #text(size: 22pt, weight: "bold")[STATEMENT]
    #v(0.4em)
    #text(fill: gray)[Generated #data.generated]
  ]
)

#v(1em)
#line(length: 100%, stroke: 0.5pt + gray)
#v(1em)

#text(weight: "bold", size: 11pt)[Client:]
#v(0.3em)
#party(data.client)

#v(1.5em)

#if data.units.len() > 0 [
  #table(
    columns: (1fr, auto, auto, auto, auto),
    align: (left, right, right, right, right),
    stroke: (x, y) => if y == 0 { (bottom: 1pt + black) } else { (bottom: 0.5pt + gray) },
    fill: (x, y) => if y == 0 { luma(240) } else { none },
    inset: 6pt,
    [*Unit*], [*Price*], [*Paid*], [*Remaining*], [*Progress*],
    ..data.units.map(u => (u.label, u.price, u.paid, u.remaining, u.progress)).flatten()
  )
  #v(1em)
]

#table(
  columns: (auto, auto, auto, auto, auto, auto, auto, auto),
  align: (left, left, left, left, right, right, right, center),
  stroke: (x, y) => if y == 0 { (bottom: 1pt + black) } else { (bottom: 0.5pt + gray) },
  fill: (x, y) => if y == 0 { luma(240) } else { none },
  inset: 5pt,
  [*Number*], [*Unit*], [*Issued*], [*Due*], [*Subtotal*], [*Paid*], [*Remaining*], [*Status*],
  ..data.rows.map(r => (
    r.number, r.unit, r.issue_date, r.due_date, r.subtotal, r.paid, r.remaining, r.status,
  )).flatten()
)

#v(1.5em)

#money-table((
  ([Invoiced:], [#data.invoiced]),
  ([Paid on invoices:], [#data.paid]),
  (table.hline(stroke: 1pt),),
  ([*Outstanding on invoices:*], [*#data.remaining*]),
  ([Remaining on units:], [#data.unit_remaining]),
))

#company-footer
"##;

pub fn render_invoice(doc: &InvoiceDocument, output_path: &Path) -> Result<()> {
    compile("invoice", INVOICE_TEMPLATE, doc, output_path)
}

pub fn render_statement(doc: &StatementDocument, output_path: &Path) -> Result<()> {
    compile("statement", STATEMENT_TEMPLATE, doc, output_path)
}

/// Write the template and its JSON data side by side in a scratch directory.
/// The directory and both files go away when the returned `TempDir` drops.
fn stage<T: Serialize>(name: &str, body: &str, data: &T) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::Builder::new().prefix("unitbook-").tempdir()?;

    let json = serde_json::to_string(data).map_err(|e| LedgerError::PdfGeneration(e.to_string()))?;
    fs::write(dir.path().join(format!("{name}.json")), json)?;

    let source = PREAMBLE.replace("DATA_JSON_PATH", &format!("{name}.json")) + body;
    let template_path = dir.path().join(format!("{name}.typ"));
    fs::write(&template_path, source)?;

    Ok((dir, template_path))
}

/// Stage the data and template, then run `typst compile`.
fn compile<T: Serialize>(name: &str, body: &str, data: &T, output_path: &Path) -> Result<()> {
    if Command::new("typst").arg("--version").output().is_err() {
        return Err(LedgerError::TypstNotFound);
    }

    let (dir, template_path) = stage(name, body, data)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    debug!(template = %template_path.display(), output = %output_path.display(), "running typst");
    let output = Command::new("typst")
        .arg("compile")
        .arg("--root")
        .arg(dir.path())
        .arg(&template_path)
        .arg(output_path)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LedgerError::PdfGeneration(stderr.trim().to_string()));
    }
    Ok(())
}
