use terralint_kit::hcl::structure::{Block, Body};
use terralint_kit::hcl::Span;
use terralint_kit::helpers::hcl::{
    visit_label, visit_required_string_literal_attribute, VisitorError,
};
use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::{Diagnostic, Range, SourceFile};

use super::{
    Attribute, ModuleCall, ModuleDefinition, Output, Resource, ResourceMode, Variable,
    MODULE_META_ARGUMENTS,
};

/// Decodes the top-level blocks of one parsed file into `module`.
///
/// Blocks the engine has no use for (`terraform`, `provider`, `moved`, ...)
/// are ignored. Malformed blocks are reported and skipped.
pub(crate) fn decode_body(
    body: &Body,
    file: &SourceFile,
    module: &mut ModuleDefinition,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for block in body.blocks() {
        let res = match block.ident.as_str() {
            "variable" => decode_variable(block, file, module),
            "locals" => decode_locals(block, file, module),
            "resource" => decode_resource(ResourceMode::Managed, block, file, module),
            "data" => decode_resource(ResourceMode::Data, block, file, module),
            "module" => decode_module_call(block, file, module),
            "output" => decode_output(block, file, module),
            _ => Ok(()),
        };
        if let Err(diag) = res {
            diagnostics.push(diag);
        }
    }
}

fn block_range(block: &Block, file: &SourceFile) -> Range {
    file.range_of_optional(block.ident.span())
}

fn invalid_block(block: &Block, file: &SourceFile, e: VisitorError) -> Diagnostic {
    Diagnostic::error(format!("invalid {} block: {}", block.ident.as_str(), e))
        .with_code("load")
        .with_range(block_range(block, file))
}

fn duplicate(kind: &str, name: &str, range: Range) -> Diagnostic {
    Diagnostic::error(format!("duplicate {} '{}'", kind, name))
        .with_code("load")
        .with_range(range)
}

pub(crate) fn decode_attributes(body: &Body, file: &SourceFile) -> IndexMap<String, Attribute> {
    let mut attributes = IndexMap::new();
    for attribute in body.attributes() {
        let name = attribute.key.as_str().to_string();
        attributes.insert(
            name.clone(),
            Attribute {
                name,
                expr: attribute.value.clone(),
                range: file.range_of_optional(attribute.span()),
                expr_range: file.range_of_optional(attribute.value.span()),
            },
        );
    }
    attributes
}

fn decode_variable(
    block: &Block,
    file: &SourceFile,
    module: &mut ModuleDefinition,
) -> Result<(), Diagnostic> {
    let name = visit_label(0, "name", block).map_err(|e| invalid_block(block, file, e))?;
    let decl_range = block_range(block, file);
    if module.variables.contains_key(&name) {
        return Err(duplicate("variable", &name, decl_range));
    }
    let default = decode_attributes(&block.body, file).shift_remove("default");
    module.variables.insert(name.clone(), Variable { name, default, decl_range });
    Ok(())
}

fn decode_locals(
    block: &Block,
    file: &SourceFile,
    module: &mut ModuleDefinition,
) -> Result<(), Diagnostic> {
    for (name, attribute) in decode_attributes(&block.body, file) {
        if module.locals.contains_key(&name) {
            return Err(duplicate("local value", &name, attribute.range));
        }
        module.locals.insert(name, attribute);
    }
    Ok(())
}

fn decode_resource(
    mode: ResourceMode,
    block: &Block,
    file: &SourceFile,
    module: &mut ModuleDefinition,
) -> Result<(), Diagnostic> {
    let type_name = visit_label(0, "type", block).map_err(|e| invalid_block(block, file, e))?;
    let name = visit_label(1, "name", block).map_err(|e| invalid_block(block, file, e))?;
    let decl_range = block_range(block, file);
    if module.find_resource(mode, &type_name, &name).is_some() {
        let address = match mode {
            ResourceMode::Managed => format!("{}.{}", type_name, name),
            ResourceMode::Data => format!("data.{}.{}", type_name, name),
        };
        return Err(duplicate("resource", &address, decl_range));
    }
    module.resources.push(Resource {
        mode,
        type_name,
        name,
        attributes: decode_attributes(&block.body, file),
        decl_range,
    });
    Ok(())
}

fn decode_module_call(
    block: &Block,
    file: &SourceFile,
    module: &mut ModuleDefinition,
) -> Result<(), Diagnostic> {
    let name = visit_label(0, "name", block).map_err(|e| invalid_block(block, file, e))?;
    let source = visit_required_string_literal_attribute("source", block)
        .map_err(|e| invalid_block(block, file, e))?;
    let decl_range = block_range(block, file);
    if module.find_module_call(&name).is_some() {
        return Err(duplicate("module call", &name, decl_range));
    }

    let mut arguments = decode_attributes(&block.body, file);
    let has_count = arguments.contains_key("count");
    let has_for_each = arguments.contains_key("for_each");
    arguments.retain(|name, _| !MODULE_META_ARGUMENTS.contains(&name.as_str()));

    module.module_calls.push(ModuleCall {
        name,
        source,
        arguments,
        decl_range,
        has_count,
        has_for_each,
        target: None,
        output_names: None,
    });
    Ok(())
}

fn decode_output(
    block: &Block,
    file: &SourceFile,
    module: &mut ModuleDefinition,
) -> Result<(), Diagnostic> {
    let name = visit_label(0, "name", block).map_err(|e| invalid_block(block, file, e))?;
    let decl_range = block_range(block, file);
    if module.outputs.contains_key(&name) {
        return Err(duplicate("output", &name, decl_range));
    }
    let value = decode_attributes(&block.body, file).shift_remove("value");
    module.outputs.insert(name.clone(), Output { name, value, decl_range });
    Ok(())
}
