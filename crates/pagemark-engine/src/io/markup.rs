//! Page markup: XHTML text to [`ContentTree`] and back.
//!
//! Annotation elements are recognised by their `data-pagemark-*` attributes
//! and stored as [`Annotation`]s rather than host attributes, so the engine
//! never has to look at attribute strings.
//!
//! Whatever surrounds the root element (XML declaration, DOCTYPE, comments)
//! is carried through untouched. Named HTML entities are read as the
//! characters they stand for; a no-break space is written back as `&nbsp;`.

use std::borrow::Cow;

use crate::io::IoError;
use crate::models::{Annotation, ColourToken, ContentTree, Element, NodeId, NodeKind, NoteId, NoteKind};

pub const MARKER_ATTR: &str = "data-pagemark-marker";
pub const NOTE_ATTR: &str = "data-pagemark-note";
pub const NOTE_KIND_ATTR: &str = "data-pagemark-kind";
pub const NOTE_TEXT_ATTR: &str = "data-pagemark-note-text";

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// Entities XML defines itself.
const XML_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse a well-formed XHTML page or fragment. Its root element becomes the
/// tree root.
pub fn parse_page(source: &str) -> Result<ContentTree, IoError> {
    let source = expand_html_entities(source);
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let document = roxmltree::Document::parse_with_options(&source, options)?;
    let root = document.root_element();
    let range = root.range();

    let mut tree = ContentTree::with_root(element_from(root));
    tree.set_prologue(&source[..range.start]);
    tree.set_epilogue(&source[range.end..]);
    let tree_root = tree.root();
    append_children(&mut tree, tree_root, root);
    log::debug!("parsed page rooted at <{}>", root.tag_name().name());
    Ok(tree)
}

/// Write the attached part of `tree` back out as XHTML.
pub fn serialize_page(tree: &ContentTree) -> String {
    let mut out = String::from(tree.prologue());
    write_node(tree, tree.root(), &mut out);
    out.push_str(tree.epilogue());
    out
}

/// Replace named HTML entities XML does not know with numeric references.
///
/// Entities declared by the page itself are left for the parser.
fn expand_html_entities(source: &str) -> Cow<'_, str> {
    if !source.contains('&') {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let name_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        let name = &after[..name_len];

        if !name.is_empty() && after[name_len..].starts_with(';') && !XML_ENTITIES.contains(&name) {
            let reference = &rest[amp..amp + name_len + 2];
            let decoded = html_escape::decode_html_entities(reference);
            if decoded != reference {
                for ch in decoded.chars() {
                    out.push_str(&format!("&#{};", u32::from(ch)));
                }
                rest = &rest[amp + name_len + 2..];
                continue;
            }
        }
        out.push('&');
        rest = after;
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn append_children(tree: &mut ContentTree, parent: NodeId, source: roxmltree::Node<'_, '_>) {
    for child in source.children() {
        let node = if child.is_element() {
            let node = tree.create_element(element_from(child));
            append_children(tree, node, child);
            node
        } else if child.is_text()
            && let Some(text) = child.text()
        {
            tree.create_text(text)
        } else if child.is_comment()
            && let Some(comment) = child.text()
        {
            tree.create_comment(comment)
        } else {
            continue;
        };
        tree.append_child(parent, node);
    }
}

/// `prefix:name` when `uri` is bound to a prefix in scope, else `name`.
fn qualified_name(node: roxmltree::Node<'_, '_>, uri: Option<&str>, name: &str) -> String {
    let prefix = uri.and_then(|uri| {
        if uri == XML_NAMESPACE {
            Some("xml")
        } else {
            node.lookup_prefix(uri)
        }
    });
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{name}"),
        _ => name.to_string(),
    }
}

/// Namespace declarations made on `node` itself, as `xmlns` attributes.
fn namespace_declarations(node: roxmltree::Node<'_, '_>) -> Vec<(String, String)> {
    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|parent| parent.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    node.namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| {
            let name = match ns.name() {
                Some(prefix) => format!("xmlns:{prefix}"),
                None => "xmlns".to_string(),
            };
            (name, ns.uri().to_string())
        })
        .collect()
}

fn element_from(node: roxmltree::Node<'_, '_>) -> Element {
    let mut attributes = namespace_declarations(node);
    attributes.extend(node.attributes().map(|attr| {
        (
            qualified_name(node, attr.namespace(), attr.name()),
            attr.value().to_string(),
        )
    }));
    let annotation = annotation_from(&attributes);

    let tag = node.tag_name();
    let mut element = Element::new(qualified_name(node, tag.namespace(), tag.name()));
    element.attributes = match annotation {
        Some(_) => attributes
            .into_iter()
            .filter(|(name, _)| !is_annotation_attribute(name))
            .collect(),
        None => attributes,
    };
    element.annotation = annotation;
    element
}

/// Annotation carried by a set of attributes. Malformed ids are not an
/// annotation; the attributes are then kept as they are.
fn annotation_from(attributes: &[(String, String)]) -> Option<Annotation> {
    let get = |name: &str| {
        attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    if let Some(colour) = get(MARKER_ATTR) {
        return Some(Annotation::Marker {
            colour: ColourToken::new(colour),
        });
    }
    if let Some(raw) = get(NOTE_ATTR) {
        let id = NoteId::parse(raw)?;
        let kind = get(NOTE_KIND_ATTR)
            .and_then(NoteKind::parse)
            .unwrap_or(NoteKind::Solid);
        return Some(Annotation::Note { id, kind });
    }
    get(NOTE_TEXT_ATTR).map(|_| Annotation::NoteText)
}

fn is_annotation_attribute(name: &str) -> bool {
    matches!(name, MARKER_ATTR | NOTE_ATTR | NOTE_KIND_ATTR | NOTE_TEXT_ATTR)
}

fn annotation_attributes(annotation: &Annotation) -> Vec<(&'static str, String)> {
    match annotation {
        Annotation::Marker { colour } => vec![(MARKER_ATTR, colour.to_string())],
        Annotation::Note { id, kind } => vec![
            (NOTE_ATTR, id.to_string()),
            (NOTE_KIND_ATTR, kind.as_str().to_string()),
        ],
        Annotation::NoteText => vec![(NOTE_TEXT_ATTR, String::new())],
    }
}

fn write_node(tree: &ContentTree, node: NodeId, out: &mut String) {
    match tree.kind(node) {
        NodeKind::Text(text) => out.push_str(&encode_nbsp(html_escape::encode_text(text))),
        NodeKind::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                write_attribute(out, name, value);
            }
            if let Some(annotation) = &element.annotation {
                for (name, value) in annotation_attributes(annotation) {
                    write_attribute(out, name, &value);
                }
            }

            let children = tree.children(node);
            if children.is_empty() && VOID_ELEMENTS.contains(&element.tag.as_str()) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for &child in children {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}

fn write_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&encode_nbsp(html_escape::encode_double_quoted_attribute(value)));
    out.push('"');
}

fn encode_nbsp(escaped: Cow<'_, str>) -> Cow<'_, str> {
    if escaped.contains('\u{a0}') {
        Cow::Owned(escaped.replace('\u{a0}', "&nbsp;"))
    } else {
        escaped
    }
}
