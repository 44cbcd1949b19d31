mod common;

use common::{checkbox_sdt, docx, dropdown_sdt, entry_text, para};
use ooxml_roundtrip::{Block, InlineContent, NoticeKind, VMerge, docx as wp, edit};

/// A row whose second and third cells sit inside checkbox 7, then a cell
/// spanning two columns.
fn form_table() -> String {
    let glyph_cell = r#"<w:tc><w:p><w:r><w:t>☐</w:t></w:r></w:p></w:tc>"#;
    let wrapped = checkbox_sdt(7, false, &format!("{glyph_cell}<w:tc>{}</w:tc>", para("I agree")));
    format!(
        r#"<w:tbl><w:tblGrid><w:gridCol/><w:gridCol/><w:gridCol/></w:tblGrid><w:tr><w:tc>{}</w:tc>{wrapped}</w:tr><w:tr><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>"#,
        para("Terms"),
        para("Wide"),
        para("Narrow"),
    )
}

#[test]
fn row_wrapper_checkbox_surfaces_on_first_wrapped_cell() {
    let bytes = docx(&form_table());
    let doc = wp::parse(&bytes, "form").unwrap().value;

    assert_eq!(doc.checkboxes.len(), 1);
    let cb = &doc.checkboxes[0];
    assert_eq!(cb.id, "checkbox-7");
    assert_eq!(cb.label, "Check 7");
    assert!(!cb.checked);

    let Block::Table(table) = &doc.blocks[0] else { panic!() };
    let row = &table.rows[0];
    assert_eq!(row.cells.len(), 3);
    let Block::Paragraph(synthetic) = &row.cells[1].blocks[0] else { panic!() };
    assert!(synthetic.synthetic);
    assert_eq!(synthetic.address.to_string(), "tbl[0]/tr[0]/tc[1]/p[0]");
    assert!(matches!(&synthetic.content[0], InlineContent::Checkbox(c) if c.id == "checkbox-7"));
    // The glyph paragraph comes after the control slot.
    assert_eq!(row.cells[1].blocks[1].address().to_string(), "tbl[0]/tr[0]/tc[1]/p[1]");
    // The second wrapped cell does not repeat the control.
    assert!(row.cells[2].blocks.iter().all(|b| match b {
        Block::Paragraph(p) => !p.synthetic,
        _ => true,
    }));

    let located = wp::locate(&bytes, &[synthetic.address.clone()]).unwrap();
    assert_eq!(located[0].as_ref().unwrap().tag, "sdt");
}

#[test]
fn checking_a_box_writes_state_and_glyph() {
    let bytes = docx(&form_table());
    let mut doc = wp::parse(&bytes, "form").unwrap().value;
    edit::set_checkbox(&mut doc, "checkbox-7", true).unwrap();

    let out = wp::apply(&doc, &bytes).unwrap();
    assert!(out.notices.is_empty());
    let xml = entry_text(&out.value, "word/document.xml");
    assert!(xml.contains(r#"<w14:checked w14:val="1"/>"#));
    assert!(xml.contains("<w:t>☒</w:t>"));
    assert!(xml.contains("I agree"));

    let reparsed = wp::parse(&out.value, "form").unwrap().value;
    assert!(reparsed.checkboxes[0].checked);
    let Block::Table(table) = &reparsed.blocks[0] else { panic!() };
    assert_eq!(table.rows[0].cells[2].blocks.len(), 1);
}

#[test]
fn logical_row_width_counts_spans() {
    let bytes = docx(&form_table());
    let outcome = wp::parse(&bytes, "form").unwrap();
    let Block::Table(table) = &outcome.value.blocks[0] else { panic!() };
    assert_eq!(table.rows[1].cells[0].col_span, 2);
    assert_eq!(table.row_width(0), 3);
    assert_eq!(table.row_width(1), 3);
    assert_eq!(outcome.notices_of(NoticeKind::StructureWarning).count(), 0);
}

#[test]
fn vertical_merges_produce_row_spans_and_flag_orphans() {
    let merged = |val: &str, text: &str| {
        let vm = if val.is_empty() {
            "<w:vMerge/>".to_string()
        } else {
            format!(r#"<w:vMerge w:val="{val}"/>"#)
        };
        format!("<w:tc><w:tcPr>{vm}</w:tcPr>{}</w:tc>", para(text))
    };
    let plain = |text: &str| format!("<w:tc>{}</w:tc>", para(text));
    let body = format!(
        "<w:tbl><w:tblGrid><w:gridCol/><w:gridCol/></w:tblGrid><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
        merged("restart", "top"),
        plain("a"),
        merged("", ""),
        plain("b"),
        merged("", ""),
        merged("", "orphan"),
    );
    let bytes = docx(&body);
    let outcome = wp::parse(&bytes, "merge").unwrap();
    let Block::Table(table) = &outcome.value.blocks[0] else { panic!() };
    assert_eq!(table.rows[0].cells[0].v_merge, VMerge::Start);
    assert_eq!(table.rows[0].cells[0].row_span, 3);
    assert_eq!(table.rows[1].cells[0].v_merge, VMerge::Continuation);
    // Warned about, never rejected.
    assert_eq!(outcome.notices_of(NoticeKind::StructureWarning).count(), 1);
}

#[test]
fn inline_dropdown_selection_is_validated_and_written() {
    let body = format!(
        "<w:p><w:r><w:t xml:space=\"preserve\">Colour: </w:t></w:r>{}</w:p>",
        dropdown_sdt(3, &["Red", "Green", "Blue"], "Red")
    );
    let bytes = docx(&body);
    let mut doc = wp::parse(&bytes, "dd").unwrap().value;
    let Block::Paragraph(p) = &doc.blocks[0] else { panic!() };
    assert_eq!(p.text_runs().count(), 1);
    let InlineContent::Dropdown(dd) = &p.content[1] else { panic!() };
    assert_eq!(dd.options, ["Red", "Green", "Blue"]);
    assert_eq!(dd.selected.as_deref(), Some("Red"));

    assert!(edit::select_dropdown(&mut doc, "dropdown-3", "Purple").is_err());
    edit::select_dropdown(&mut doc, "dropdown-3", "Blue").unwrap();
    let out = wp::apply(&doc, &bytes).unwrap().value;
    let xml = entry_text(&out, "word/document.xml");
    assert!(xml.contains(r#"w:lastValue="Blue""#));
    assert!(xml.contains("<w:t>Blue</w:t>"));
    assert_eq!(wp::parse(&out, "dd").unwrap().value.dropdowns[0].selected.as_deref(), Some("Blue"));
}

#[test]
fn inline_checkbox_without_state_element_gains_one() {
    let sdt = r#"<w:sdt><w:sdtPr><w:id w:val="12"/><w14:checkbox><w14:checkedState w14:val="2612"/></w14:checkbox></w:sdtPr><w:sdtContent><w:r><w:t>☐</w:t></w:r></w:sdtContent></w:sdt>"#;
    let bytes = docx(&format!("<w:p>{sdt}<w:r><w:t>Opt in</w:t></w:r></w:p>"));
    let mut doc = wp::parse(&bytes, "cb").unwrap().value;
    assert_eq!(doc.checkboxes[0].label, "Checkbox 12");
    edit::set_checkbox(&mut doc, "checkbox-12", true).unwrap();
    let out = wp::apply(&doc, &bytes).unwrap().value;
    let reparsed = wp::parse(&out, "cb").unwrap().value;
    assert!(reparsed.checkboxes[0].checked);
    let Block::Paragraph(p) = &reparsed.blocks[0] else { panic!() };
    assert_eq!(p.text(), "Opt in");
}
