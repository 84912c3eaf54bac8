//! Configuration — filter pattern lists and front-end arguments.
//!
//! [`Options`] can be deserialized from a `declscrape.toml` file or built in
//! code with the chaining helpers. Front-end settings are forwarded to the
//! analyzer verbatim as command-line arguments; nothing here is interpreted.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Input language passed through to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Language {
    #[serde(rename = "c")]
    C,
    #[serde(rename = "c++")]
    Cpp,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "c++",
        }
    }
}

/// Extraction options.
///
/// The eight pattern lists select declarations by qualified name or source
/// path; see [`crate::filter::FilterSet`] for the classification rules. The
/// remaining fields configure the front-end invocation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    pub included_names: Vec<String>,
    pub included_sources: Vec<String>,
    pub excluded_names: Vec<String>,
    pub excluded_sources: Vec<String>,
    pub enforced_names: Vec<String>,
    pub enforced_sources: Vec<String>,
    pub ignored_names: Vec<String>,
    pub ignored_sources: Vec<String>,

    pub include_paths: Vec<PathBuf>,
    pub framework_paths: Vec<PathBuf>,
    pub target: Option<String>,
    pub language: Option<Language>,
    pub standard: Option<String>,
    pub abi: Option<String>,
    pub arch: Option<String>,
    pub cpu: Option<String>,
    /// Extra arguments appended to the front-end command line as-is.
    pub clang_args: Vec<String>,

    /// Emit one `INCL`/`ENF` line per surviving declaration after shaking.
    pub diagnostics: bool,
}

impl Options {
    pub fn include_name(mut self, pattern: &str) -> Self {
        self.included_names.push(pattern.to_string());
        self
    }

    pub fn include_source(mut self, pattern: &str) -> Self {
        self.included_sources.push(pattern.to_string());
        self
    }

    pub fn exclude_name(mut self, pattern: &str) -> Self {
        self.excluded_names.push(pattern.to_string());
        self
    }

    pub fn exclude_source(mut self, pattern: &str) -> Self {
        self.excluded_sources.push(pattern.to_string());
        self
    }

    pub fn enforce_name(mut self, pattern: &str) -> Self {
        self.enforced_names.push(pattern.to_string());
        self
    }

    pub fn enforce_source(mut self, pattern: &str) -> Self {
        self.enforced_sources.push(pattern.to_string());
        self
    }

    pub fn ignore_name(mut self, pattern: &str) -> Self {
        self.ignored_names.push(pattern.to_string());
        self
    }

    pub fn ignore_source(mut self, pattern: &str) -> Self {
        self.ignored_sources.push(pattern.to_string());
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_standard(mut self, standard: &str) -> Self {
        self.standard = Some(standard.to_string());
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_clang_arg(mut self, arg: &str) -> Self {
        self.clang_args.push(arg.to_string());
        self
    }

    pub fn with_diagnostics(mut self) -> Self {
        self.diagnostics = true;
        self
    }

    /// Assemble the front-end command line.
    pub fn clang_args(&self) -> Vec<String> {
        let mut args = vec!["-ferror-limit=0".to_string()];
        for path in &self.include_paths {
            args.push("--include-directory".to_string());
            args.push(path.display().to_string());
        }
        for path in &self.framework_paths {
            args.push(format!("-F{}", path.display()));
        }
        if let Some(target) = &self.target {
            args.push("-target".to_string());
            args.push(target.clone());
        }
        if let Some(language) = self.language {
            args.push("--language".to_string());
            args.push(language.as_str().to_string());
        }
        if let Some(standard) = &self.standard {
            args.push("--std".to_string());
            args.push(standard.clone());
        }
        if let Some(abi) = &self.abi {
            args.push(format!("-mabi={abi}"));
        }
        if let Some(arch) = &self.arch {
            args.push(format!("-march={arch}"));
        }
        if let Some(cpu) = &self.cpu {
            args.push(format!("-mcpu={cpu}"));
        }
        args.extend(self.clang_args.iter().cloned());
        args
    }
}

/// Load and parse a `declscrape.toml` configuration file.
pub fn load_options(path: &Path) -> anyhow::Result<Options> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let options: Options = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(options)
}
