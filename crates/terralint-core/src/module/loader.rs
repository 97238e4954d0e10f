use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use terralint_kit::hcl::parser::parse_body;
use terralint_kit::types::{Diagnostic, Range, SourceFile};

use super::decoder::decode_body;
use super::manifest::{ModuleManifest, MANIFEST_PATH};
use super::{display_path, normalize_path, source_name, Configuration, ModuleDefinition, ModuleId};

/// Where configuration files come from. Paths are relative to the root
/// module directory.
pub trait SourceProvider {
    /// Names of the files directly inside `dir` ending with `suffix`, in
    /// lexical order.
    fn list_files(&self, dir: &Path, suffix: &str) -> Result<Vec<String>, Diagnostic>;

    fn read_file(&self, path: &Path) -> Result<String, Diagnostic>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// The root module directory, as shown to users.
    fn root_dir(&self) -> PathBuf {
        PathBuf::from(".")
    }
}

pub struct FileSystemProvider {
    base: PathBuf,
}

impl FileSystemProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        FileSystemProvider { base: base.into() }
    }
}

impl SourceProvider for FileSystemProvider {
    fn list_files(&self, dir: &Path, suffix: &str) -> Result<Vec<String>, Diagnostic> {
        let location = self.base.join(dir);
        let entries = std::fs::read_dir(&location).map_err(|e| {
            Diagnostic::error(format!("unable to read directory {}: {}", location.display(), e))
                .with_code("load")
        })?;

        let mut names = vec![];
        for entry in entries {
            let entry = entry.map_err(Diagnostic::from)?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(suffix) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_file(&self, path: &Path) -> Result<String, Diagnostic> {
        let location = self.base.join(path);
        std::fs::read_to_string(&location).map_err(|e| {
            Diagnostic::error(format!("unable to read {}: {}", location.display(), e))
                .with_code("load")
        })
    }

    fn is_file(&self, path: &Path) -> bool {
        self.base.join(path).is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.base.join(path).is_dir()
    }

    fn root_dir(&self) -> PathBuf {
        self.base.clone()
    }
}

/// A set of files held in memory, keyed by path relative to the root
/// module.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    files: BTreeMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        InMemoryProvider::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files.insert(normalize_path(path.as_ref()), content.into());
    }
}

impl SourceProvider for InMemoryProvider {
    fn list_files(&self, dir: &Path, suffix: &str) -> Result<Vec<String>, Diagnostic> {
        let dir = normalize_path(dir);
        Ok(self
            .files
            .keys()
            .filter(|path| path.parent().map(|parent| parent == dir).unwrap_or(false))
            .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().to_string()))
            .filter(|name| name.ends_with(suffix))
            .collect())
    }

    fn read_file(&self, path: &Path) -> Result<String, Diagnostic> {
        self.files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| diagnosed_error!("file not found: {}", display_path(path)))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = normalize_path(path);
        self.files.keys().any(|file| file.starts_with(&dir) && file != &dir)
    }
}

#[derive(Debug, Clone)]
pub struct LoadResult {
    pub configuration: Configuration,
    /// Parse and load diagnostics, passed through as a batch.
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Loads a root module and, recursively, every module it calls.
pub struct ModuleLoader<'p, P: SourceProvider + ?Sized> {
    provider: &'p P,
    manifest: Option<ModuleManifest>,
    modules: Vec<ModuleDefinition>,
    /// Definitions loaded from each directory, with the directories their
    /// module calls resolved to. Installed modules are keyed by call path,
    /// so a directory reached through two paths may need two definitions.
    by_dir: HashMap<PathBuf, Vec<(ModuleId, Vec<Option<PathBuf>>)>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'p, P: SourceProvider + ?Sized> ModuleLoader<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        ModuleLoader {
            provider,
            manifest: None,
            modules: vec![],
            by_dir: HashMap::new(),
            diagnostics: vec![],
        }
    }

    pub fn load(mut self) -> LoadResult {
        self.manifest = self.load_manifest();

        let root_dir = PathBuf::new();
        if self.provider.list_files(&root_dir, ".tf").map(|f| f.is_empty()).unwrap_or(true) {
            self.diagnostics.push(
                Diagnostic::warning(format!(
                    "no configuration files found in {}",
                    self.provider.root_dir().display()
                ))
                .with_code("load"),
            );
        }
        let root = self.load_module(root_dir, "");

        LoadResult {
            configuration: Configuration {
                modules: self.modules,
                root,
                root_dir: self.provider.root_dir(),
            },
            diagnostics: self.diagnostics,
        }
    }

    fn load_manifest(&mut self) -> Option<ModuleManifest> {
        let path = Path::new(MANIFEST_PATH);
        if !self.provider.is_file(path) {
            return None;
        }
        let res = self
            .provider
            .read_file(path)
            .and_then(|content| ModuleManifest::from_json(&content).map_err(Diagnostic::from));
        match res {
            Ok(manifest) => Some(manifest),
            Err(diag) => {
                self.diagnostics.push(diag.with_code("load").with_range(Range::at_start(MANIFEST_PATH)));
                None
            }
        }
    }

    /// Loads the module in `dir` for the call path `key`, the dot
    /// separated call names leading to it. A definition already loaded from
    /// `dir` is reused when its calls resolve to the same directories.
    fn load_module(&mut self, dir: PathBuf, key: &str) -> ModuleId {
        let id = ModuleId(self.modules.len());
        let loaded = self.by_dir.get(&dir).and_then(|variants| variants.first()).map(|(id, _)| *id);
        let mut module = match loaded {
            Some(first) => {
                let targets = self.resolve_calls(&self.modules[first.0], key);
                if let Some((known, _)) =
                    self.by_dir[&dir].iter().find(|(_, resolved)| *resolved == targets)
                {
                    return *known;
                }
                debug!("module {} has other installed modules through {}", display_path(&dir), key);
                let mut module = self.modules[first.0].clone();
                module.id = id;
                for call in module.module_calls.iter_mut() {
                    call.target = None;
                    call.output_names = None;
                }
                module
            }
            None => {
                debug!("loading module {} from {}", id, display_path(&dir));
                let mut module = ModuleDefinition::new(id, dir.clone());
                self.read_module_files(&mut module);
                module
            }
        };

        let targets = self.resolve_calls(&module, key);
        self.by_dir.entry(dir).or_default().push((id, targets.clone()));
        self.modules.push(module);

        for (index, target_dir) in targets.into_iter().enumerate() {
            let call = &self.modules[id.0].module_calls[index];
            let Some(target_dir) = target_dir else {
                debug!("module '{}' ({}) is not installed, skipping", call.name, call.source);
                continue;
            };
            if !self.provider.is_dir(&target_dir) {
                let diagnostic = Diagnostic::error(format!(
                    "unreadable module directory {} for module '{}'",
                    display_path(&target_dir),
                    call.name
                ))
                .with_code("load")
                .with_range(call.decl_range.clone());
                self.diagnostics.push(diagnostic);
                continue;
            }

            let child_key =
                if key.is_empty() { call.name.clone() } else { format!("{}.{}", key, call.name) };
            let target = self.load_module(target_dir, &child_key);
            let output_names = self.modules[target.0].outputs.keys().cloned().collect();
            let call = &mut self.modules[id.0].module_calls[index];
            call.target = Some(target);
            call.output_names = Some(output_names);
        }
        id
    }

    fn resolve_calls(&self, module: &ModuleDefinition, key: &str) -> Vec<Option<PathBuf>> {
        module
            .module_calls
            .iter()
            .map(|call| self.resolve_call_dir(&module.dir, key, &call.name, &call.source))
            .collect()
    }

    fn resolve_call_dir(&self, dir: &Path, key: &str, name: &str, source: &str) -> Option<PathBuf> {
        if super::is_local_source(source) {
            return Some(normalize_path(&dir.join(source)));
        }
        let key = if key.is_empty() { name.to_string() } else { format!("{}.{}", key, name) };
        self.manifest.as_ref().and_then(|manifest| manifest.installed_dir(&key, source))
    }

    fn read_module_files(&mut self, module: &mut ModuleDefinition) {
        let dir = module.dir.clone();
        if let Ok(json_files) = self.provider.list_files(&dir, ".tf.json") {
            for name in json_files {
                debug!("skipping JSON configuration file {}", source_name(&dir, &name));
            }
        }

        let file_names = match self.provider.list_files(&dir, ".tf") {
            Ok(names) => names,
            Err(diag) => {
                self.diagnostics.push(diag);
                return;
            }
        };

        for file_name in file_names {
            let name = source_name(&dir, &file_name);
            let content = match self.provider.read_file(&dir.join(&file_name)) {
                Ok(content) => content,
                Err(diag) => {
                    module.has_parse_errors = true;
                    self.diagnostics.push(diag.with_range(Range::at_start(name)));
                    continue;
                }
            };
            let file = SourceFile::new(name.clone(), content);
            match parse_body(file.content()) {
                Ok(body) => decode_body(&body, &file, module, &mut self.diagnostics),
                Err(e) => {
                    module.has_parse_errors = true;
                    let range = file.range_of(&(e.location().offset()..e.location().offset()));
                    self.diagnostics.push(
                        Diagnostic::error(e.message().to_string())
                            .with_code("parse")
                            .with_range(range),
                    );
                }
            }
            trace!("parsed {}", name);
            module.files.insert(name, file);
        }
    }
}
