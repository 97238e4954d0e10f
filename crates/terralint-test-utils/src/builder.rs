use terralint_core::module::{Configuration, InMemoryProvider, ModuleLoader};
use terralint_kit::types::Diagnostic;

/// A loaded configuration together with its load diagnostics.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub configuration: Configuration,
    pub diagnostics: Vec<Diagnostic>,
}

impl Loaded {
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error()).collect()
    }
}

/// Builds a [`Configuration`] out of in-memory files.
///
/// Paths are relative to the root module. Called modules are laid out the
/// same way they would be on disk:
///
/// ```rust
/// use terralint_test_utils::ConfigurationBuilder;
///
/// let configuration = ConfigurationBuilder::new()
///     .with_file("main.tf", "module \"net\" {\n  source = \"./net\"\n}\n")
///     .with_file("net/main.tf", "variable \"cidr\" {}\n")
///     .build();
///
/// assert_eq!(configuration.modules.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    provider: InMemoryProvider,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        ConfigurationBuilder::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.provider.add_file(path, content);
        self
    }

    pub fn provider(&self) -> &InMemoryProvider {
        &self.provider
    }

    pub fn build_with_diagnostics(&self) -> Loaded {
        let loaded = ModuleLoader::new(&self.provider).load();
        Loaded { configuration: loaded.configuration, diagnostics: loaded.diagnostics }
    }

    /// Loads the configuration.
    ///
    /// # Panics
    ///
    /// When loading reports an error.
    pub fn build(&self) -> Configuration {
        let loaded = self.build_with_diagnostics();
        let errors = loaded.errors();
        if !errors.is_empty() {
            let messages = errors.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("\n");
            panic!("configuration failed to load:\n{}", messages);
        }
        loaded.configuration
    }
}
