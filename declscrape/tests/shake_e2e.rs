//! End-to-end shaking over real translation units: mutually recursive
//! records under include, exclude and enforce patterns, and source-path
//! based filtering across headers.
//!
//! libclang can only be initialized once per process, so this file is a
//! single test driving all scenarios.

use std::fs;
use std::path::PathBuf;

use clang::Clang;
use declscrape::{InclusionStatus, Options};

const CYCLIC_HEADER: &str = "\
struct A {
    struct B *b;
};

struct B {
    struct A *a;
};
";

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write header");
    path
}

#[test]
fn shaking_scenarios() {
    let clang = Clang::new().expect("initialize libclang");
    let dir = tempfile::tempdir().expect("tempdir");
    let cyclic = write_file(&dir, "cyclic.h", CYCLIC_HEADER);

    // Including A pulls in B through the pointer edge, cycle and all.
    {
        let options = Options::default().include_name("^A$");
        let translation = declscrape::extract_with(&clang, &cyclic, &options).expect("extract");

        let a = translation.find_decl_by_name("A").expect("A materialized");
        let b = translation.find_decl_by_name("B").expect("B materialized");
        assert_eq!(translation.registry().status(&a.id), InclusionStatus::Included);
        assert_eq!(translation.registry().status(&b.id), InclusionStatus::Included);

        let exposed: Vec<&str> = translation
            .exposed()
            .map(|d| d.qualified_name.as_str())
            .collect();
        assert_eq!(
            exposed,
            ["A", "A::b", "B", "B::a"],
            "exposure follows discovery order"
        );
    }

    // Excluding B poisons A: every path that requires B is contaminated.
    {
        let options = Options::default().include_name("^A$").exclude_name("^B$");
        let translation = declscrape::extract_with(&clang, &cyclic, &options).expect("extract");

        let a = translation.find_decl_by_name("A").expect("A materialized");
        let b = translation.find_decl_by_name("B").expect("B materialized");
        assert_eq!(translation.registry().status(&a.id), InclusionStatus::Excluded);
        assert_eq!(translation.registry().status(&b.id), InclusionStatus::Excluded);
        assert_eq!(translation.exposed().count(), 0);
    }

    // Enforcing A overrides the exclusion on B along the reachable path.
    {
        let options = Options::default()
            .include_name("^A$")
            .exclude_name("^B$")
            .enforce_name("^A$");
        let translation = declscrape::extract_with(&clang, &cyclic, &options).expect("extract");

        let a = translation.find_decl_by_name("A").expect("A materialized");
        let b = translation.find_decl_by_name("B").expect("B materialized");
        assert_eq!(translation.registry().status(&a.id), InclusionStatus::Enforced);
        assert_eq!(translation.registry().status(&b.id), InclusionStatus::Enforced);

        let exposed: Vec<&str> = translation
            .exposed()
            .map(|d| d.qualified_name.as_str())
            .collect();
        assert!(exposed.contains(&"A"));
        assert!(exposed.contains(&"B"));
    }

    // Source-path buckets: declarations are selected by the header that
    // spelled them, and dependencies still cross the file boundary.
    let dep = "struct Dep {\n    int v;\n};\n";
    let api = "#include \"dep.h\"\n\nstruct Api {\n    struct Dep *d;\n};\n";
    write_file(&dir, "dep.h", dep);
    let api_header = write_file(&dir, "api.h", api);

    {
        let options = Options::default().include_source("api\\.h$");
        let translation = declscrape::extract_with(&clang, &api_header, &options).expect("extract");

        let api = translation.find_decl_by_name("Api").expect("Api materialized");
        let dep = translation.find_decl_by_name("Dep").expect("Dep materialized");
        assert_eq!(translation.registry().status(&api.id), InclusionStatus::Included);
        assert_eq!(translation.registry().status(&dep.id), InclusionStatus::Included);
    }

    {
        let options = Options::default()
            .include_source("api\\.h$")
            .exclude_source("dep\\.h$");
        let translation = declscrape::extract_with(&clang, &api_header, &options).expect("extract");

        let api = translation.find_decl_by_name("Api").expect("Api materialized");
        let dep = translation.find_decl_by_name("Dep").expect("Dep materialized");
        assert_eq!(translation.registry().status(&api.id), InclusionStatus::Excluded);
        assert_eq!(translation.registry().status(&dep.id), InclusionStatus::Excluded);
    }
}
