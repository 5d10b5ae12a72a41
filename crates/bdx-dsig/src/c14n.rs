//! # XML canonicalization
//!
//! Renders an element subtree into the canonical byte form that reference
//! digests and signature values are computed over. Supports the inclusive
//! (Canonical XML 1.0/1.1) and exclusive (`xml-exc-c14n`) namespace rules;
//! comments are always omitted, which is what every publisher signature in
//! the wild uses.
//!
//! The `omit` parameter implements the enveloped-signature transform: the
//! subtree rooted at that node is skipped entirely during rendering.

use roxmltree::{Node, NodeId};

/// Which namespace-declaration rules to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Render every in-scope namespace not already rendered by an output
    /// ancestor (Canonical XML 1.0/1.1).
    Inclusive,
    /// Render only visibly utilized namespaces (Exclusive XML
    /// Canonicalization).
    Exclusive,
}

/// Canonicalize the subtree rooted at `root`, skipping the subtree rooted at
/// `omit` when given.
pub fn canonicalize(root: Node<'_, '_>, mode: C14nMode, omit: Option<NodeId>) -> String {
    let mut canon = Canonicalizer {
        mode,
        omit,
        out: String::new(),
        rendered: Vec::new(),
    };
    canon.element(root);
    canon.out
}

struct Canonicalizer {
    mode: C14nMode,
    omit: Option<NodeId>,
    out: String,
    /// Namespace bindings rendered on output ancestors, innermost last.
    rendered: Vec<(Option<String>, String)>,
}

impl Canonicalizer {
    fn element(&mut self, node: Node<'_, '_>) {
        if Some(node.id()) == self.omit {
            return;
        }
        let scope_mark = self.rendered.len();

        let tag = node.tag_name();
        let elem_uri = tag.namespace().unwrap_or("");
        let elem_prefix = element_prefix(node);
        let qname = match &elem_prefix {
            Some(prefix) => format!("{prefix}:{}", tag.name()),
            None => tag.name().to_string(),
        };

        self.out.push('<');
        self.out.push_str(&qname);

        // Collect the namespace declarations this element must carry.
        let mut decls: Vec<(Option<String>, String)> = Vec::new();
        match self.mode {
            C14nMode::Inclusive => {
                for ns in node.namespaces() {
                    if ns.name() == Some("xml") {
                        continue;
                    }
                    add_decl(&mut decls, ns.name().map(str::to_string), ns.uri().to_string());
                }
            }
            C14nMode::Exclusive => {
                add_decl(&mut decls, elem_prefix.clone(), elem_uri.to_string());
                for attr in node.attributes() {
                    if let Some(uri) = attr.namespace() {
                        if let Some(prefix) = prefix_bound_to(node, uri) {
                            add_decl(&mut decls, Some(prefix), uri.to_string());
                        }
                    }
                }
            }
        }
        decls.retain(|(prefix, uri)| self.needs_declaration(prefix, uri));
        // Default declaration first, then by prefix.
        decls.sort_by(|a, b| a.0.cmp(&b.0));
        for (prefix, uri) in decls {
            match &prefix {
                Some(p) => {
                    self.out.push_str(" xmlns:");
                    self.out.push_str(p);
                }
                None => self.out.push_str(" xmlns"),
            }
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(&uri));
            self.out.push('"');
            self.rendered.push((prefix, uri));
        }

        // Attributes, sorted by (namespace URI, local name); the empty URI
        // of unqualified attributes sorts first.
        let mut attrs: Vec<(&str, &str, String, &str)> = node
            .attributes()
            .map(|attr| {
                let uri = attr.namespace().unwrap_or("");
                let qname = match attr.namespace().and_then(|u| prefix_bound_to(node, u)) {
                    Some(prefix) => format!("{prefix}:{}", attr.name()),
                    None => attr.name().to_string(),
                };
                (uri, attr.name(), qname, attr.value())
            })
            .collect();
        attrs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        for (_, _, qname, value) in attrs {
            self.out.push(' ');
            self.out.push_str(&qname);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(value));
            self.out.push('"');
        }

        self.out.push('>');

        for child in node.children() {
            if child.is_element() {
                self.element(child);
            } else if child.is_text() {
                if let Some(text) = child.text() {
                    self.out.push_str(&escape_text(text));
                }
            } else if let Some(pi) = child.pi() {
                self.out.push_str("<?");
                self.out.push_str(pi.target);
                if let Some(value) = pi.value {
                    self.out.push(' ');
                    self.out.push_str(value);
                }
                self.out.push_str("?>");
            }
            // Comments are omitted.
        }

        self.out.push_str("</");
        self.out.push_str(&qname);
        self.out.push('>');

        self.rendered.truncate(scope_mark);
    }

    /// Whether the binding differs from what the nearest output ancestor
    /// already rendered. An unrendered default prefix counts as bound to the
    /// empty URI, so `xmlns=""` is only emitted below a non-empty default.
    fn needs_declaration(&self, prefix: &Option<String>, uri: &str) -> bool {
        let current = self
            .rendered
            .iter()
            .rev()
            .find(|(rendered_prefix, _)| rendered_prefix == prefix)
            .map(|(_, rendered_uri)| rendered_uri.as_str());
        match current {
            Some(rendered_uri) => rendered_uri != uri,
            None => !uri.is_empty(),
        }
    }
}

fn add_decl(decls: &mut Vec<(Option<String>, String)>, prefix: Option<String>, uri: String) {
    if !decls.iter().any(|(p, _)| *p == prefix) {
        decls.push((prefix, uri));
    }
}

/// The prefix the element is rendered with: none for an element in no
/// namespace or in the default namespace, otherwise a prefix bound to its
/// namespace URI.
fn element_prefix(node: Node<'_, '_>) -> Option<String> {
    let uri = node.tag_name().namespace()?;
    let mut prefixed = None;
    for ns in node.namespaces() {
        if ns.uri() != uri {
            continue;
        }
        match ns.name() {
            None => return None,
            Some(prefix) if prefixed.is_none() => prefixed = Some(prefix.to_string()),
            Some(_) => {}
        }
    }
    prefixed
}

/// A non-default prefix bound to the given URI; attributes cannot use the
/// default namespace.
fn prefix_bound_to(node: Node<'_, '_>, uri: &str) -> Option<String> {
    node.namespaces()
        .find(|ns| ns.uri() == uri && ns.name().is_some())
        .and_then(|ns| ns.name().map(str::to_string))
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(doc: &str, mode: C14nMode) -> String {
        let parsed = roxmltree::Document::parse(doc).unwrap();
        canonicalize(parsed.root_element(), mode, None)
    }

    #[test]
    fn empty_element_becomes_start_end_pair() {
        assert_eq!(canon("<a/>", C14nMode::Inclusive), "<a></a>");
    }

    #[test]
    fn attributes_sort_by_local_name() {
        assert_eq!(
            canon(r#"<a c="3" a="1" b="2"/>"#, C14nMode::Inclusive),
            r#"<a a="1" b="2" c="3"></a>"#
        );
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(
            canon("<a>x &amp; y &lt; z</a>", C14nMode::Inclusive),
            "<a>x &amp; y &lt; z</a>"
        );
    }

    #[test]
    fn comments_are_omitted() {
        assert_eq!(
            canon("<a>x<!-- noise -->y</a>", C14nMode::Inclusive),
            "<a>xy</a>"
        );
    }

    #[test]
    fn exclusive_renders_only_utilized_namespaces() {
        let doc = roxmltree::Document::parse(
            r#"<root xmlns:x="urn:x" xmlns:y="urn:y"><x:child/></root>"#,
        )
        .unwrap();
        let child = doc
            .root_element()
            .children()
            .find(|n| n.is_element())
            .unwrap();
        assert_eq!(
            canonicalize(child, C14nMode::Exclusive, None),
            r#"<x:child xmlns:x="urn:x"></x:child>"#
        );
    }

    #[test]
    fn inclusive_renders_all_in_scope_namespaces() {
        let doc = roxmltree::Document::parse(
            r#"<root xmlns:x="urn:x" xmlns:y="urn:y"><x:child/></root>"#,
        )
        .unwrap();
        let child = doc
            .root_element()
            .children()
            .find(|n| n.is_element())
            .unwrap();
        assert_eq!(
            canonicalize(child, C14nMode::Inclusive, None),
            r#"<x:child xmlns:x="urn:x" xmlns:y="urn:y"></x:child>"#
        );
    }

    #[test]
    fn inherited_namespace_is_not_redeclared_on_children() {
        assert_eq!(
            canon(
                r#"<x:root xmlns:x="urn:x"><x:child/></x:root>"#,
                C14nMode::Exclusive
            ),
            r#"<x:root xmlns:x="urn:x"><x:child></x:child></x:root>"#
        );
    }

    #[test]
    fn default_namespace_is_rendered_without_prefix() {
        assert_eq!(
            canon(r#"<root xmlns="urn:d"><child/></root>"#, C14nMode::Exclusive),
            r#"<root xmlns="urn:d"><child></child></root>"#
        );
    }

    #[test]
    fn omit_skips_the_subtree() {
        let doc = roxmltree::Document::parse("<r><a/><b><c/></b></r>").unwrap();
        let b = doc
            .descendants()
            .find(|n| n.has_tag_name("b"))
            .unwrap();
        assert_eq!(
            canonicalize(doc.root_element(), C14nMode::Inclusive, Some(b.id())),
            "<r><a></a></r>"
        );
    }

    #[test]
    fn attribute_values_are_escaped() {
        assert_eq!(
            canon(r#"<a v="x &amp; &quot;y&quot;"/>"#, C14nMode::Inclusive),
            r#"<a v="x &amp; &quot;y&quot;"></a>"#
        );
    }

    #[test]
    fn namespaced_attributes_keep_their_prefix() {
        assert_eq!(
            canon(
                r#"<a xmlns:m="urn:m" m:k="v"/>"#,
                C14nMode::Exclusive
            ),
            r#"<a xmlns:m="urn:m" m:k="v"></a>"#
        );
    }
}
