//! Scratch workspaces for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const GO_GRAMMAR: &str = r#"
name: go
scope: source.go
file_types: [go]
patterns:
  - begin: '//'
    end: '(?m)$'
    scope: comment.line.double-slash
  - begin: '"'
    end: '"'
    scope: string.quoted.double
    patterns:
      - match: '\\.'
        scope: constant.character.escape
  - match: '\b(func)\s+([A-Za-z_][A-Za-z0-9_]*)'
    captures:
      1: keyword
      2: entity.name.function
  - match: '\b(package|import|func|return)\b'
    scope: keyword
  - match: '[0-9]+'
    scope: constant.numeric
  - match: '[A-Za-z_][A-Za-z0-9_]*'
    scope: identifier
  - match: '[{}()]'
    scope: punctuation
"#;

/// A fixtures/grammars/snapshots tree in a temporary directory, with a
/// `scopesnap.yaml` at its root.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let workspace = Self {
            dir: TempDir::new().unwrap(),
        };
        workspace.write("grammars/go.yaml", GO_GRAMMAR);
        workspace.write(
            "scopesnap.yaml",
            "fixtures: fixtures\nsnapshots: snapshots\ngrammar_dirs: [grammars]\n",
        );
        workspace
    }

    /// A workspace with two Go fixtures.
    pub fn with_go_fixtures() -> Self {
        let workspace = Self::new();
        workspace.write("fixtures/go/hello.go", "package main");
        workspace.write(
            "fixtures/go/func.go",
            "package main\n\n// greet\nfunc greet() {\n\treturn \"hi\\n\"\n}\n",
        );
        workspace
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    /// The `scopesnap` binary, run from the workspace root without colours.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("scopesnap").unwrap();
        cmd.current_dir(self.root()).args(["--color", "never"]);
        cmd
    }
}
