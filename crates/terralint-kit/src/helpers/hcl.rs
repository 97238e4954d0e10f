use std::fmt::Display;

use crate::hcl::{
    expr::Expression,
    structure::{Block, BlockLabel},
    template::Element,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitorError {
    MissingField(String),
    MissingAttribute(String),
    TypeExpected(String, String),
}

impl Display for VisitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitorError::MissingField(name) => write!(f, "missing label '{}'", name),
            VisitorError::MissingAttribute(name) => write!(f, "missing attribute '{}'", name),
            VisitorError::TypeExpected(expected, name) => {
                write!(f, "'{}' must be a {}", name, expected)
            }
        }
    }
}

pub fn visit_label(index: usize, name: &str, block: &Block) -> Result<String, VisitorError> {
    let label = block.labels.get(index).ok_or(VisitorError::MissingField(name.to_string()))?;
    match label {
        BlockLabel::String(literal) => Ok(literal.value().to_string()),
        BlockLabel::Ident(ident) => Ok(ident.as_str().to_string()),
    }
}

pub fn visit_required_string_literal_attribute(
    field_name: &str,
    block: &Block,
) -> Result<String, VisitorError> {
    let Some(attribute) = block.body.get_attribute(field_name) else {
        return Err(VisitorError::MissingAttribute(field_name.to_string()));
    };

    expression_as_static_string(&attribute.value)
        .ok_or(VisitorError::TypeExpected("string literal".into(), field_name.to_string()))
}

/// Returns the string an expression stands for when it contains no
/// interpolation, e.g. a module `source`.
pub fn expression_as_static_string(expr: &Expression) -> Option<String> {
    match expr {
        Expression::String(value) => Some(value.value().to_string()),
        Expression::StringTemplate(template) => {
            let mut res = String::new();
            for element in template.iter() {
                match element {
                    Element::Literal(literal) => res.push_str(literal.value()),
                    Element::Interpolation(_) | Element::Directive(_) => return None,
                }
            }
            Some(res)
        }
        Expression::Parenthesis(inner) => expression_as_static_string(inner.inner()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hcl::parser::parse_body;

    fn first_block(source: &str) -> Block {
        let body = parse_body(source).unwrap();
        let block = body.blocks().next().cloned().unwrap();
        block
    }

    #[test]
    fn labels_and_literal_attributes() {
        let block = first_block("module \"network\" {\n  source = \"./modules/network\"\n}\n");
        assert_eq!(visit_label(0, "name", &block).unwrap(), "network");
        assert_eq!(
            visit_label(1, "type", &block),
            Err(VisitorError::MissingField("type".to_string()))
        );
        assert_eq!(
            visit_required_string_literal_attribute("source", &block).unwrap(),
            "./modules/network"
        );
    }

    #[test]
    fn interpolated_sources_are_not_static() {
        let block = first_block("module \"network\" {\n  source = \"./${var.dir}\"\n}\n");
        assert_eq!(
            visit_required_string_literal_attribute("source", &block),
            Err(VisitorError::TypeExpected("string literal".into(), "source".into()))
        );
    }
}
