//! declscrape — filtered declaration extraction from C/C++ headers.
//!
//! Parses a translation unit via libclang and re-materializes its cursor tree
//! as a typed, cyclic declaration graph, then tree-shakes that graph against
//! user-supplied include/exclude/enforce patterns. Downstream tooling
//! (binding generators, reflection emitters) gets an ordered sequence of
//! exposed declarations it can traverse without re-parsing source.
//!
//! Inclusion is reachability-based with two twists: an excluded declaration
//! anywhere on a required path poisons the declarations that need it, and an
//! enforced declaration overrides that poisoning along every path that can
//! reach it.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! let options = declscrape::Options::default().include_name("^zip_");
//! let translation = declscrape::extract(Path::new("zip.h"), &options).unwrap();
//! for decl in translation.exposed() {
//!     println!("{} {}", decl.kind, decl.qualified_name);
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use clang::{Clang, Index};
use tracing::info;

pub mod config;
pub mod extract;
pub mod filter;
pub mod graph;
pub mod model;
pub mod shake;

pub use config::{Language, Options};
pub use filter::FilterStatus;
pub use model::{Decl, DeclIdx, DeclKind, Translation, Type, TypeCategory, TypeIdx, TypeKind};
pub use shake::{InclusionRegistry, InclusionStatus};

/// Parse `header` and extract its filtered declaration model.
///
/// Initializes libclang for the duration of the call; use [`extract_with`]
/// when extracting several translation units in one process.
pub fn extract(header: &Path, options: &Options) -> Result<Translation> {
    let clang =
        Clang::new().map_err(|e| anyhow::anyhow!("failed to initialize libclang: {e}"))?;
    extract_with(&clang, header, options)
}

/// Parse `header` against an already-initialized front-end and extract its
/// filtered declaration model.
pub fn extract_with(clang: &Clang, header: &Path, options: &Options) -> Result<Translation> {
    let filter = filter::FilterSet::new(options)?;
    let args = options.clang_args();
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    let index = Index::new(clang, false, false);
    let tu = index
        .parser(header.to_str().context("header path is not valid UTF-8")?)
        .arguments(&arg_refs)
        .detailed_preprocessing_record(true)
        .skip_function_bodies(true)
        .parse()
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {:?}", header.display(), e))?;

    info!(header = %header.display(), "parsed translation unit");
    Ok(extract::extract_entity(
        tu.get_entity(),
        &filter,
        options.diagnostics,
    ))
}
