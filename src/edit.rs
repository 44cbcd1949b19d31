//! Edits applied to a parsed tree before export.
//!
//! Edits only change tree state. Nothing is written until the tree is passed
//! to an exporter together with its base container.

use crate::Error;
use crate::model::{
    Block, CheckboxControl, DropdownControl, InlineContent, Notice, NoticeKind, Outcome,
    StructuredDocument, TextRun,
};
use crate::xlsx::{Cell, CellRef, CellValue, FormControlKind, FormulaKind, Sheet, Workbook};

fn find_run<'d>(blocks: &'d mut [Block], id: &str) -> Option<&'d mut TextRun> {
    for block in blocks {
        let found = match block {
            Block::Paragraph(p) => p.content.iter_mut().find_map(|item| match item {
                InlineContent::TextRun(r) if r.id == id => Some(r),
                _ => None,
            }),
            Block::Table(t) => t
                .rows
                .iter_mut()
                .flat_map(|row| row.cells.iter_mut())
                .find_map(|cell| find_run(&mut cell.blocks, id)),
            Block::Drawing(_) => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Visit every inline control in the tree.
fn for_each_inline(blocks: &mut [Block], f: &mut impl FnMut(&mut InlineContent)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => p.content.iter_mut().for_each(&mut *f),
            Block::Table(t) => {
                for cell in t.rows.iter_mut().flat_map(|row| row.cells.iter_mut()) {
                    for_each_inline(&mut cell.blocks, f);
                }
            }
            Block::Drawing(_) => {}
        }
    }
}

pub fn set_run_text(doc: &mut StructuredDocument, run_id: &str, text: &str) -> Result<(), Error> {
    let run = find_run(&mut doc.blocks, run_id)
        .ok_or_else(|| Error::AddressNotFound(run_id.to_string()))?;
    run.text = text.to_string();
    Ok(())
}

/// Set a checkbox in the body and in the document-level list.
pub fn set_checkbox(doc: &mut StructuredDocument, control_id: &str, checked: bool) -> Result<(), Error> {
    let mut found = false;
    let mut update = |cb: &mut CheckboxControl| {
        if cb.id == control_id {
            cb.checked = checked;
            found = true;
        }
    };
    for_each_inline(&mut doc.blocks, &mut |item| {
        if let InlineContent::Checkbox(cb) = item {
            update(cb);
        }
    });
    doc.checkboxes.iter_mut().for_each(&mut update);
    if !found {
        return Err(Error::ControlNotFound(control_id.to_string()));
    }
    Ok(())
}

/// Select a dropdown option. The value must be one of the control's options.
pub fn select_dropdown(doc: &mut StructuredDocument, control_id: &str, value: &str) -> Result<(), Error> {
    let options = doc
        .dropdowns
        .iter()
        .find(|d| d.id == control_id)
        .map(|d| d.options.clone())
        .or_else(|| {
            let mut options = None;
            for_each_inline(&mut doc.blocks, &mut |item| {
                if let InlineContent::Dropdown(d) = item
                    && d.id == control_id
                {
                    options = Some(d.options.clone());
                }
            });
            options
        })
        .ok_or_else(|| Error::ControlNotFound(control_id.to_string()))?;
    if !options.iter().any(|o| o == value) {
        return Err(Error::InvalidSelection {
            control: control_id.to_string(),
            value: value.to_string(),
        });
    }

    let mut update = |d: &mut DropdownControl| {
        if d.id == control_id {
            d.selected = Some(value.to_string());
        }
    };
    for_each_inline(&mut doc.blocks, &mut |item| {
        if let InlineContent::Dropdown(d) = item {
            update(d);
        }
    });
    doc.dropdowns.iter_mut().for_each(&mut update);
    Ok(())
}

/// Sheet position by name, falling back to a zero-based index.
fn sheet_index(workbook: &Workbook, sheet: &str) -> Result<usize, Error> {
    workbook
        .sheets
        .iter()
        .position(|s| s.name == sheet)
        .or_else(|| sheet.parse::<usize>().ok().filter(|&i| i < workbook.sheets.len()))
        .ok_or_else(|| Error::SheetNotFound(sheet.to_string()))
}

fn sheet_mut<'w>(workbook: &'w mut Workbook, sheet: &str) -> Result<&'w mut Sheet, Error> {
    let i = sheet_index(workbook, sheet)?;
    Ok(&mut workbook.sheets[i])
}

/// Cell at `reference`, created empty when the sheet has none.
fn cell_entry(sheet: &mut Sheet, reference: CellRef) -> &mut Cell {
    let sheet_id = sheet.id.clone();
    let has_validation = sheet.validation_for(reference).is_some();
    sheet.cells.entry(reference).or_insert_with(|| {
        let mut cell = Cell::new(&sheet_id, reference);
        cell.has_validation = has_validation;
        cell
    })
}

/// Store `value`, keeping the value from parse time the first time round.
fn write_value(cell: &mut Cell, value: CellValue) {
    if cell.original_value.is_none() {
        cell.original_value = Some(cell.value.clone());
    }
    cell.value = value;
    cell.dirty = true;
}

/// Write a literal value into a cell.
///
/// A formula in the cell is dropped and reported as
/// [`NoticeKind::FormulaCleared`]. Values outside a list validation covering
/// the cell are rejected.
pub fn set_cell_value(
    workbook: &mut Workbook,
    sheet: &str,
    reference: &str,
    value: CellValue,
) -> Result<Outcome<()>, Error> {
    let sheet = sheet_mut(workbook, sheet)?;
    let at: CellRef = reference.parse()?;

    if let Some(rule) = sheet.validation_for(at)
        && rule.kind == "list"
        && !rule.options.is_empty()
        && !value.is_empty()
    {
        let shown = value.display();
        if !rule.options.contains(&shown) {
            return Err(Error::RejectedValue {
                cell: at.to_string(),
                value: shown,
            });
        }
    }

    let notices = clear_formula(sheet, at);
    write_value(cell_entry(sheet, at), value);
    Ok(Outcome { value: (), notices })
}

/// Drop the formula at `at`. Clearing the master of a shared formula also
/// turns every cell sharing it into its cached value, since those cells
/// hold no formula text of their own.
fn clear_formula(sheet: &mut Sheet, at: CellRef) -> Vec<Notice> {
    let Some(cell) = sheet.cells.get_mut(&at) else {
        return Vec::new();
    };
    let Some(formula) = cell.formula.take() else {
        return Vec::new();
    };
    log::debug!("Clearing formula of {}", cell.id);
    let mut notices = vec![Notice::new(
        NoticeKind::FormulaCleared,
        format!("Cell {at} had formula '={}' which was cleared", formula.text),
    )];

    let master_of = match (&formula.kind, &formula.shared_ref, formula.shared_index) {
        (FormulaKind::Shared, Some(_), Some(si)) => si,
        _ => return notices,
    };
    for cell in sheet.cells.values_mut() {
        let follows = cell.formula.as_ref().is_some_and(|f| {
            f.kind == FormulaKind::Shared && f.shared_ref.is_none() && f.shared_index == Some(master_of)
        });
        if !follows {
            continue;
        }
        cell.formula = None;
        let cached = cell.value.clone();
        write_value(cell, cached);
        notices.push(Notice::new(
            NoticeKind::FormulaCleared,
            format!(
                "Cell {} shared the formula of {at}, which was cleared; it keeps its cached value",
                cell.reference
            ),
        ));
    }
    notices
}

/// Set a form checkbox and mirror the state into its linked cell.
///
/// The drawing that renders the control is left as it is; the linked cell
/// carries the state into the exported package. A link qualified with a sheet
/// name (`Data!$A$1`, `'My Data'!$A$1`) writes to that sheet. A checkbox
/// without a linked cell changes the tree only, reported as
/// [`NoticeKind::NotPersisted`].
pub fn toggle_form_checkbox(
    workbook: &mut Workbook,
    sheet: &str,
    control_id: &str,
    checked: bool,
) -> Result<Outcome<()>, Error> {
    let owner = sheet_index(workbook, sheet)?;
    let control = workbook.sheets[owner]
        .form_controls
        .iter()
        .position(|c| c.id == control_id && c.kind == FormControlKind::Checkbox)
        .ok_or_else(|| Error::ControlNotFound(control_id.to_string()))?;

    let link = match workbook.sheets[owner].form_controls[control].linked_cell.as_deref() {
        Some(linked) => Some(resolve_link(workbook, owner, linked)?),
        None => None,
    };
    workbook.sheets[owner].form_controls[control].checked = Some(checked);

    let Some((target, at)) = link else {
        return Ok(Outcome {
            value: (),
            notices: vec![Notice::new(
                NoticeKind::NotPersisted,
                format!("checkbox {control_id} has no linked cell; its state is not exported"),
            )],
        });
    };
    let sheet = &mut workbook.sheets[target];
    let notices = clear_formula(sheet, at);
    write_value(cell_entry(sheet, at), CellValue::Boolean(checked));
    Ok(Outcome { value: (), notices })
}

/// Sheet index and cell of a control link. An unqualified link points into
/// the control's own sheet.
fn resolve_link(workbook: &Workbook, owner: usize, linked: &str) -> Result<(usize, CellRef), Error> {
    let at: CellRef = linked.parse()?;
    let Some((qualifier, _)) = linked.rsplit_once('!') else {
        return Ok((owner, at));
    };
    let name = qualifier.trim();
    let name = match name.strip_prefix('\'').and_then(|n| n.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => name.to_string(),
    };
    workbook
        .sheets
        .iter()
        .position(|s| s.name == name)
        .map(|i| (i, at))
        .ok_or(Error::SheetNotFound(name))
}
