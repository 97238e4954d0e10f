//! In-memory model of a loaded configuration tree.
//!
//! A [`Configuration`] is an arena of [`ModuleDefinition`]s, one per module
//! directory. Module calls point at their target definition by [`ModuleId`],
//! so a definition called from several places is loaded once, and a call
//! graph containing cycles can be represented (it is rejected when module
//! instances are built, see [`crate::runner::walker`]).

mod decoder;
pub mod loader;
pub mod manifest;

use std::fmt::Display;
use std::path::{Component, Path, PathBuf};

use terralint_kit::hcl::expr::Expression;
use terralint_kit::indexmap::IndexMap;
use terralint_kit::types::{Range, SourceFile};

pub use loader::{FileSystemProvider, InMemoryProvider, LoadResult, ModuleLoader, SourceProvider};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

impl Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named expression inside a block.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
    /// Range of the whole `name = expr` attribute.
    pub range: Range,
    /// Range of the expression alone. Issues about a value point here.
    pub expr_range: Range,
}

impl Attribute {
    pub fn filename(&self) -> &str {
        &self.range.filename
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceMode {
    Managed,
    Data,
}

#[derive(Clone, Debug)]
pub struct Resource {
    pub mode: ResourceMode,
    pub type_name: String,
    pub name: String,
    pub attributes: IndexMap<String, Attribute>,
    pub decl_range: Range,
}

impl Resource {
    /// Resources expanded with `count` or `for_each` have one object per
    /// instance, only known once the meta-argument is applied.
    pub fn is_multi_instance(&self) -> bool {
        self.attributes.contains_key("count") || self.attributes.contains_key("for_each")
    }

    pub fn address(&self) -> String {
        match self.mode {
            ResourceMode::Managed => format!("{}.{}", self.type_name, self.name),
            ResourceMode::Data => format!("data.{}.{}", self.type_name, self.name),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub default: Option<Attribute>,
    pub decl_range: Range,
}

#[derive(Clone, Debug)]
pub struct Output {
    pub name: String,
    pub value: Option<Attribute>,
    pub decl_range: Range,
}

/// Arguments of a `module` block that are not input variables of the
/// called module.
pub const MODULE_META_ARGUMENTS: &[&str] =
    &["source", "version", "providers", "depends_on", "count", "for_each"];

#[derive(Clone, Debug)]
pub struct ModuleCall {
    pub name: String,
    pub source: String,
    /// Input variable assignments, meta-arguments excluded.
    pub arguments: IndexMap<String, Attribute>,
    pub decl_range: Range,
    pub has_count: bool,
    pub has_for_each: bool,
    /// Target definition, `None` when the module source is not installed
    /// or could not be read.
    pub target: Option<ModuleId>,
    /// Outputs declared by the target definition.
    pub output_names: Option<Vec<String>>,
}

impl ModuleCall {
    pub fn is_local(&self) -> bool {
        is_local_source(&self.source)
    }
}

pub fn is_local_source(source: &str) -> bool {
    source.starts_with("./") || source.starts_with("../")
}

/// One module directory: every `*.tf` file in it, decoded.
#[derive(Clone, Debug)]
pub struct ModuleDefinition {
    pub id: ModuleId,
    /// Directory relative to the root module, empty for the root module.
    pub dir: PathBuf,
    pub files: IndexMap<String, SourceFile>,
    pub variables: IndexMap<String, Variable>,
    pub locals: IndexMap<String, Attribute>,
    pub resources: Vec<Resource>,
    pub module_calls: Vec<ModuleCall>,
    pub outputs: IndexMap<String, Output>,
    /// Set when at least one file of the module failed to parse.
    pub has_parse_errors: bool,
}

impl ModuleDefinition {
    pub fn new(id: ModuleId, dir: PathBuf) -> Self {
        ModuleDefinition {
            id,
            dir,
            files: IndexMap::new(),
            variables: IndexMap::new(),
            locals: IndexMap::new(),
            resources: vec![],
            module_calls: vec![],
            outputs: IndexMap::new(),
            has_parse_errors: false,
        }
    }

    /// A module with nothing declared, used to evaluate standalone
    /// expressions such as tfvars values.
    pub fn empty() -> Self {
        ModuleDefinition::new(ModuleId(0), PathBuf::new())
    }

    /// `path.module` as Terraform renders it.
    pub fn display_dir(&self) -> String {
        display_path(&self.dir)
    }

    pub fn file(&self, filename: &str) -> Option<&SourceFile> {
        self.files.get(filename)
    }

    pub fn find_resource(&self, mode: ResourceMode, type_name: &str, name: &str) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|r| r.mode == mode && r.type_name == type_name && r.name == name)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.mode == ResourceMode::Managed && r.type_name == type_name)
    }

    pub fn find_module_call(&self, name: &str) -> Option<&ModuleCall> {
        self.module_calls.iter().find(|c| c.name == name)
    }
}

/// The loaded configuration tree.
#[derive(Clone, Debug)]
pub struct Configuration {
    pub modules: Vec<ModuleDefinition>,
    pub root: ModuleId,
    /// Directory the configuration was loaded from, as given by the caller.
    pub root_dir: PathBuf,
}

impl Configuration {
    pub fn module(&self, id: ModuleId) -> &ModuleDefinition {
        &self.modules[id.0]
    }

    pub fn root_module(&self) -> &ModuleDefinition {
        self.module(self.root)
    }

    /// Looks a parsed file up by the name ranges refer to it with.
    pub fn find_source(&self, filename: &str) -> Option<&SourceFile> {
        self.modules.iter().find_map(|module| module.files.get(filename))
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceFile> {
        self.modules.iter().flat_map(|module| module.files.values())
    }
}

/// Normalizes a path lexically: `.` components are dropped and `..` pops
/// the previous component when there is one.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component> = vec![];
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                _ => components.push(component),
            },
            other => components.push(other),
        }
    }
    components.iter().collect()
}

pub fn display_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        ".".to_string()
    } else {
        path.to_string_lossy().replace('\\', "/")
    }
}

/// The name ranges use for a file: its path relative to the root module.
pub fn source_name(dir: &Path, file_name: &str) -> String {
    if dir.as_os_str().is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", display_path(dir), file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("./modules/a", "modules/a" ; "current dir prefix")]
    #[test_case("modules/a/../b", "modules/b" ; "parent in the middle")]
    #[test_case("modules/a/../../../shared", "../shared" ; "escaping the root")]
    #[test_case(".", "" ; "root")]
    fn normalizes_lexically(input: &str, expected: &str) {
        assert_eq!(normalize_path(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn source_names_are_relative_to_the_root() {
        assert_eq!(source_name(Path::new(""), "main.tf"), "main.tf");
        assert_eq!(source_name(Path::new("modules/a"), "main.tf"), "modules/a/main.tf");
        assert_eq!(display_path(Path::new("")), ".");
    }

    #[test_case("./vpc", true)]
    #[test_case("../shared", true)]
    #[test_case("terraform-aws-modules/vpc/aws", false)]
    #[test_case("git::https://example.com/vpc.git", false)]
    fn local_sources(source: &str, expected: bool) {
        assert_eq!(is_local_source(source), expected);
    }
}
