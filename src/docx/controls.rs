use crate::address::Address;
use crate::model::{CheckboxControl, DropdownControl};

use super::{W14_NS, WML_NS, XNode, is_w, wml, wml_attr};

const CHECKED_GLYPH: char = '\u{2612}';
const UNCHECKED_GLYPH: char = '\u{2610}';

fn w14<'a>(node: XNode<'a>, name: &str) -> Option<XNode<'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(W14_NS))
}

/// Control id as exposed to editors: `checkbox-<w:id>` or `dropdown-<w:id>`.
/// Wrappers without a `w:id` are keyed by their offset in the part.
pub(crate) fn control_id(sdt: XNode, prefix: &str) -> String {
    match wml(sdt, "sdtPr").and_then(|pr| wml_attr(pr, "id")) {
        Some(id) => format!("{prefix}-{id}"),
        None => format!("{prefix}-at{}", sdt.range().start),
    }
}

fn label(pr: XNode, fallback: String) -> String {
    wml_attr(pr, "alias")
        .filter(|s| !s.is_empty())
        .or_else(|| wml_attr(pr, "tag").filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or(fallback)
}

fn glyph(state: Option<XNode>, default: char) -> char {
    state
        .and_then(|n| n.attribute((W14_NS, "val")))
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .and_then(char::from_u32)
        .unwrap_or(default)
}

pub(crate) fn checkbox_element<'a>(sdt: XNode<'a>) -> Option<XNode<'a>> {
    wml(sdt, "sdtPr").and_then(|pr| w14(pr, "checkbox"))
}

pub(crate) fn checked_element<'a>(sdt: XNode<'a>) -> Option<XNode<'a>> {
    checkbox_element(sdt).and_then(|cb| w14(cb, "checked"))
}

pub(crate) fn is_checked(sdt: XNode) -> bool {
    checked_element(sdt)
        .and_then(|n| n.attribute((W14_NS, "val")))
        .is_some_and(|v| v == "1" || v == "true")
}

pub(crate) fn checkbox_glyphs(sdt: XNode) -> (char, char) {
    let cb = checkbox_element(sdt);
    (
        glyph(cb.and_then(|cb| w14(cb, "checkedState")), CHECKED_GLYPH),
        glyph(cb.and_then(|cb| w14(cb, "uncheckedState")), UNCHECKED_GLYPH),
    )
}

pub(crate) fn read_checkbox(sdt: XNode, address: &Address) -> Option<CheckboxControl> {
    let pr = wml(sdt, "sdtPr")?;
    checkbox_element(sdt)?;
    let id = control_id(sdt, "checkbox");
    let fallback = format!("Checkbox {}", wml_attr(pr, "id").unwrap_or(""));
    let (checked_glyph, unchecked_glyph) = checkbox_glyphs(sdt);
    Some(CheckboxControl {
        id,
        address: address.clone(),
        label: label(pr, fallback),
        checked: is_checked(sdt),
        checked_glyph,
        unchecked_glyph,
    })
}

pub(crate) fn list_element<'a>(sdt: XNode<'a>) -> Option<XNode<'a>> {
    let pr = wml(sdt, "sdtPr")?;
    wml(pr, "dropDownList").or_else(|| wml(pr, "comboBox"))
}

/// `(display text, value)` of each list item.
pub(crate) fn list_items<'a>(list: XNode<'a>) -> Vec<(&'a str, &'a str)> {
    list.children()
        .filter(|n| is_w(*n, "listItem"))
        .map(|item| {
            let display = item.attribute((WML_NS, "displayText")).unwrap_or("");
            let value = item.attribute((WML_NS, "value")).unwrap_or("");
            (display, value)
        })
        .collect()
}

/// The text node showing the current selection: the first non-empty `w:t`
/// in the wrapper content, else the first `w:t`.
pub(crate) fn display_text_node<'a>(sdt: XNode<'a>) -> Option<XNode<'a>> {
    let content = wml(sdt, "sdtContent")?;
    let mut texts = content.descendants().filter(|n| is_w(*n, "t"));
    let first = texts.clone().next();
    texts.find(|t| t.text().is_some_and(|s| !s.is_empty())).or(first)
}

pub(crate) fn read_dropdown(sdt: XNode, address: &Address) -> Option<DropdownControl> {
    let pr = wml(sdt, "sdtPr")?;
    let list = list_element(sdt)?;
    let options = list_items(list)
        .into_iter()
        .map(|(display, value)| {
            let text = if display.is_empty() { value } else { display };
            text.to_string()
        })
        .collect();
    let selected = display_text_node(sdt)
        .and_then(|t| t.text())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let fallback = format!("Dropdown {}", wml_attr(pr, "id").unwrap_or(""));
    Some(DropdownControl {
        id: control_id(sdt, "dropdown"),
        address: address.clone(),
        label: label(pr, fallback),
        options,
        selected,
    })
}
