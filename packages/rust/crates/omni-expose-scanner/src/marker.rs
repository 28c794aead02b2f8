//! Syntax-tree search for marker attributes.

use syn::visit::{self, Visit};
use syn::{Attribute, ItemFn, ItemMod};

/// A function carrying the marker attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedFunction {
    /// Function identifier.
    pub name: String,
    /// Inline modules enclosing the function, outermost first.
    pub modules: Vec<String>,
}

/// Parse `content` as a Rust file and list the functions marked with `marker`.
///
/// Matches `#[marker]`, `#[marker(...)]` and path forms such as
/// `#[omni_expose::marker(...)]`. Mentions in comments or strings do not count.
///
/// # Errors
///
/// Returns the `syn` error when `content` is not valid Rust.
pub fn find_marked_functions(
    content: &str,
    marker: &str,
) -> Result<Vec<MarkedFunction>, syn::Error> {
    let file = syn::parse_file(content)?;
    let mut visitor = MarkerVisitor {
        marker,
        modules: Vec::new(),
        found: Vec::new(),
    };
    visitor.visit_file(&file);
    Ok(visitor.found)
}

struct MarkerVisitor<'m> {
    marker: &'m str,
    modules: Vec<String>,
    found: Vec<MarkedFunction>,
}

impl<'ast> Visit<'ast> for MarkerVisitor<'_> {
    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        if has_marker(&node.attrs, self.marker) {
            self.found.push(MarkedFunction {
                name: node.sig.ident.to_string(),
                modules: self.modules.clone(),
            });
        }
        visit::visit_item_fn(self, node);
    }

    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        self.modules.push(node.ident.to_string());
        visit::visit_item_mod(self, node);
        self.modules.pop();
    }
}

fn has_marker(attrs: &[Attribute], marker: &str) -> bool {
    attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == marker)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bare_and_qualified_markers() {
        let source = r#"
            #[expose(interfaces(api))]
            fn a() -> Output { Output::ok(1) }

            #[omni_expose::expose(interfaces(cli))]
            fn b() -> Output { Output::ok(2) }

            #[inline]
            fn c() {}
        "#;
        let found = find_marked_functions(source, "expose").unwrap();
        let names: Vec<_> = found.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn records_enclosing_inline_modules() {
        let source = r#"
            mod outer {
                mod inner {
                    #[expose]
                    fn deep() -> Output { Output::ok(0) }
                }
            }
        "#;
        let found = find_marked_functions(source, "expose").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].modules, vec!["outer".to_string(), "inner".to_string()]);
    }

    #[test]
    fn ignores_mentions_outside_attributes() {
        let source = r##"
            // #[expose] in a comment
            const NOTE: &str = "#[expose]";
            fn expose() {}
        "##;
        assert!(find_marked_functions(source, "expose").unwrap().is_empty());
    }

    #[test]
    fn invalid_rust_is_an_error() {
        assert!(find_marked_functions("fn broken( {", "expose").is_err());
    }
}
