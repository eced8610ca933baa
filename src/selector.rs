use std::borrow::Cow;
use std::sync::OnceLock;

use fancy_regex::Regex;

use crate::dom::{Dom, NodeId, has_class};
use crate::{Error, Result};

/// Attribute that backs `ref:name` selector markers.
pub(crate) const REF_ATTR: &str = "data-ref";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    Includes { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectorPseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Not(Vec<Vec<SelectorPart>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<SelectorAttrCondition>,
    pseudo_classes: Vec<SelectorPseudoClass>,
}

impl SelectorStep {
    pub(crate) fn id_only(&self) -> Option<&str> {
        if !self.universal
            && self.tag.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudo_classes.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SelectorCombinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    // Relation to previous (left) selector part.
    combinator: Option<SelectorCombinator>,
}

fn ref_marker_regex() -> Result<&'static Regex> {
    static REF_MARKER: OnceLock<std::result::Result<Regex, String>> = OnceLock::new();
    REF_MARKER
        .get_or_init(|| Regex::new(r"(?<![\w-])ref:([\w-]+)").map_err(|err| err.to_string()))
        .as_ref()
        .map_err(|err| Error::UnsupportedSelector(format!("ref marker pattern: {err}")))
}

/// Rewrites `ref:name` markers into `[data-ref~='name']` attribute conditions.
pub(crate) fn expand_ref_markers(selector: &str) -> Result<Cow<'_, str>> {
    if !selector.contains("ref:") {
        return Ok(Cow::Borrowed(selector));
    }

    let regex = ref_marker_regex()?;
    let mut out = String::with_capacity(selector.len() + 16);
    let mut last = 0usize;
    for captures in regex.captures_iter(selector) {
        let captures =
            captures.map_err(|err| Error::UnsupportedSelector(format!("{selector}: {err}")))?;
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        out.push_str(&selector[last..whole.start()]);
        out.push_str(&format!("[{REF_ATTR}~='{}']", name.as_str()));
        last = whole.end();
    }
    out.push_str(&selector[last..]);
    Ok(Cow::Owned(out))
}

pub(crate) fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    let expanded = expand_ref_markers(selector)?;
    let groups = split_selector_groups(&expanded)?;
    let mut parsed = Vec::with_capacity(groups.len());
    for group in groups {
        parsed.push(parse_selector_chain(&group)?);
    }
    Ok(parsed)
}

fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let tokens = tokenize_selector(selector)?;
    let mut steps = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for token in tokens {
        let combinator = match token.as_str() {
            ">" => Some(SelectorCombinator::Child),
            "+" => Some(SelectorCombinator::AdjacentSibling),
            "~" => Some(SelectorCombinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending_combinator.is_some() || steps.is_empty() {
                return Err(Error::UnsupportedSelector(selector.into()));
            }
            pending_combinator = Some(combinator);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if steps.is_empty() {
            None
        } else {
            Some(
                pending_combinator
                    .take()
                    .unwrap_or(SelectorCombinator::Descendant),
            )
        };
        steps.push(SelectorPart { step, combinator });
    }

    if steps.is_empty() || pending_combinator.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    Ok(steps)
}

/// Splits `selector` on separator characters that sit outside brackets and parens.
/// Each separator is reported back through `on_separator`.
fn split_top_level(
    selector: &str,
    is_separator: impl Fn(char) -> bool,
    mut on_separator: impl FnMut(char, &mut Vec<String>),
) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut paren_depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in selector.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '\'' | '"' if bracket_depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            '(' => {
                paren_depth += 1;
                current.push(ch);
            }
            ')' => {
                if paren_depth == 0 {
                    return Err(Error::UnsupportedSelector(selector.into()));
                }
                paren_depth -= 1;
                current.push(ch);
            }
            ch if bracket_depth == 0 && paren_depth == 0 && is_separator(ch) => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
                current.clear();
                on_separator(ch, &mut parts);
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 || paren_depth != 0 || quote.is_some() {
        return Err(Error::UnsupportedSelector(selector.into()));
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    Ok(parts)
}

fn split_selector_groups(selector: &str) -> Result<Vec<String>> {
    let groups = split_top_level(selector, |ch| ch == ',', |_, _| {})?;
    // Empty groups (`a,,b`, `a,`) collapse during the split, so the comma count exposes them.
    let commas = count_top_level_commas(selector);
    if groups.is_empty() || groups.len() != commas + 1 {
        return Err(Error::UnsupportedSelector(selector.into()));
    }
    Ok(groups)
}

fn count_top_level_commas(selector: &str) -> usize {
    let mut depth = 0isize;
    let mut quote: Option<char> = None;
    let mut commas = 0usize;
    for ch in selector.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' if depth > 0 => quote = Some(ch),
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => commas += 1,
            _ => {}
        }
    }
    commas
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    split_top_level(
        selector,
        |ch| matches!(ch, '>' | '+' | '~') || ch.is_ascii_whitespace(),
        |ch, parts| {
            if !ch.is_ascii_whitespace() {
                parts.push(ch.to_string());
            }
        },
    )
}

fn parse_selector_step(part: &str) -> Result<SelectorStep> {
    let part = part.trim();
    if part.is_empty() {
        return Err(Error::UnsupportedSelector(part.into()));
    }

    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                i += 1;
                let Some((id, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                if step.id.replace(id).is_some() {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                i = next;
            }
            b'.' => {
                i += 1;
                let Some((class_name, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (attr, next) = parse_selector_attr_condition(part, i)?;
                step.attrs.push(attr);
                i = next;
            }
            b':' => {
                let (pseudo, next) = parse_selector_pseudo(part, i)?;
                step.pseudo_classes.push(pseudo);
                i = next;
            }
            _ => {
                if step.tag.is_some()
                    || step.id.is_some()
                    || !step.classes.is_empty()
                    || step.universal
                {
                    return Err(Error::UnsupportedSelector(part.into()));
                }
                let Some((tag, next)) = parse_selector_ident(part, i) else {
                    return Err(Error::UnsupportedSelector(part.into()));
                };
                step.tag = Some(tag);
                i = next;
            }
        }
    }

    Ok(step)
}

fn parse_selector_pseudo(part: &str, start: usize) -> Result<(SelectorPseudoClass, usize)> {
    let unsupported = || Error::UnsupportedSelector(part.into());
    let name_start = start + 1;
    let Some((name, next)) = parse_selector_ident(part, name_start) else {
        return Err(unsupported());
    };

    let simple = match name.as_str() {
        "first-child" => Some(SelectorPseudoClass::FirstChild),
        "last-child" => Some(SelectorPseudoClass::LastChild),
        "only-child" => Some(SelectorPseudoClass::OnlyChild),
        "empty" => Some(SelectorPseudoClass::Empty),
        _ => None,
    };
    if let Some(pseudo) = simple {
        return Ok((pseudo, next));
    }

    if name != "not" || part.as_bytes().get(next) != Some(&b'(') {
        return Err(unsupported());
    }

    let mut depth = 0usize;
    for (offset, b) in part.as_bytes()[next..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    let close = next + offset;
                    let inner = part.get(next + 1..close).ok_or_else(unsupported)?;
                    let groups = parse_selector_groups(inner)?;
                    return Ok((SelectorPseudoClass::Not(groups), close + 1));
                }
            }
            _ => {}
        }
    }
    Err(unsupported())
}

fn parse_selector_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if start >= bytes.len() || !is_selector_ident_char(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_selector_ident_char(bytes[end]) {
        end += 1;
    }
    Some((src.get(start..end)?.to_string(), end))
}

fn is_selector_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn parse_selector_attr_condition(
    src: &str,
    open_bracket: usize,
) -> Result<(SelectorAttrCondition, usize)> {
    let bytes = src.as_bytes();
    let mut i = open_bracket + 1;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        if b == b'\'' || b == b'"' {
            quote = Some(b);
            i += 1;
            continue;
        }

        if b == b']' {
            let Some(body) = src.get(open_bracket + 1..i) else {
                return Err(Error::UnsupportedSelector(src.into()));
            };
            let body = body.trim();
            if body.is_empty() {
                return Err(Error::UnsupportedSelector(src.into()));
            }
            let cond = if let Some((key, value)) = body.split_once('=') {
                let (key, includes) = match key.strip_suffix('~') {
                    Some(key) => (key, true),
                    None => (key, false),
                };
                let key = key.trim().to_ascii_lowercase();
                if key.is_empty() {
                    return Err(Error::UnsupportedSelector(src.into()));
                }
                let value = unquote(value.trim()).to_string();
                if includes {
                    SelectorAttrCondition::Includes { key, value }
                } else {
                    SelectorAttrCondition::Eq { key, value }
                }
            } else {
                SelectorAttrCondition::Exists {
                    key: body.to_ascii_lowercase(),
                }
            };
            return Ok((cond, i + 1));
        }

        i += 1;
    }

    Err(Error::UnsupportedSelector(src.into()))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

pub(crate) fn matches_selector_chain(dom: &Dom, node_id: NodeId, steps: &[SelectorPart]) -> bool {
    let Some(last) = steps.last() else {
        return false;
    };
    if !matches_step(dom, node_id, &last.step) {
        return false;
    }

    let mut current = node_id;
    for idx in (1..steps.len()).rev() {
        let prev_step = &steps[idx - 1].step;
        let combinator = steps[idx]
            .combinator
            .unwrap_or(SelectorCombinator::Descendant);

        let matched = match combinator {
            SelectorCombinator::Child => dom
                .parent(current)
                .filter(|parent| matches_step(dom, *parent, prev_step)),
            SelectorCombinator::Descendant => {
                let mut cursor = dom.parent(current);
                let mut found = None;
                while let Some(parent) = cursor {
                    if matches_step(dom, parent, prev_step) {
                        found = Some(parent);
                        break;
                    }
                    cursor = dom.parent(parent);
                }
                found
            }
            SelectorCombinator::AdjacentSibling => dom
                .previous_element_sibling(current)
                .filter(|sibling| matches_step(dom, *sibling, prev_step)),
            SelectorCombinator::GeneralSibling => {
                let mut cursor = dom.previous_element_sibling(current);
                let mut found = None;
                while let Some(sibling) = cursor {
                    if matches_step(dom, sibling, prev_step) {
                        found = Some(sibling);
                        break;
                    }
                    cursor = dom.previous_element_sibling(sibling);
                }
                found
            }
        };

        let Some(matched) = matched else {
            return false;
        };
        current = matched;
    }

    true
}

fn matches_step(dom: &Dom, node_id: NodeId, step: &SelectorStep) -> bool {
    let Some(element) = dom.element(node_id) else {
        return false;
    };

    if let Some(tag) = &step.tag {
        if !element.tag_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }

    if let Some(id) = &step.id {
        if element.attrs.get("id") != Some(id) {
            return false;
        }
    }

    if step
        .classes
        .iter()
        .any(|class_name| !has_class(element, class_name))
    {
        return false;
    }

    for cond in &step.attrs {
        let matched = match cond {
            SelectorAttrCondition::Exists { key } => element.attrs.contains_key(key),
            SelectorAttrCondition::Eq { key, value } => element.attrs.get(key) == Some(value),
            SelectorAttrCondition::Includes { key, value } => element
                .attrs
                .get(key)
                .is_some_and(|attr| attr.split_whitespace().any(|token| token == value)),
        };
        if !matched {
            return false;
        }
    }

    step.pseudo_classes.iter().all(|pseudo| match pseudo {
        SelectorPseudoClass::FirstChild => dom.previous_element_sibling(node_id).is_none(),
        SelectorPseudoClass::LastChild => dom.next_element_sibling(node_id).is_none(),
        SelectorPseudoClass::OnlyChild => {
            dom.previous_element_sibling(node_id).is_none()
                && dom.next_element_sibling(node_id).is_none()
        }
        SelectorPseudoClass::Empty => dom.children(node_id).is_empty(),
        SelectorPseudoClass::Not(groups) => !groups
            .iter()
            .any(|steps| matches_selector_chain(dom, node_id, steps)),
    })
}
