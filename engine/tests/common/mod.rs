//! Shared fixtures for integration tests

#![allow(dead_code)]

use scriptset::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Temporary asset root with `scripts/` and `scenes/` directories
pub struct Assets {
    pub dir: TempDir,
}

impl Assets {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        fs::create_dir(dir.path().join("scenes")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn script(&self, file: &str, source: &str) -> &Self {
        fs::write(self.root().join("scripts").join(file), source).unwrap();
        self
    }

    pub fn scene(&self, name: &str, json: &str) -> &Self {
        fs::write(self.root().join("scenes").join(format!("{name}.json")), json).unwrap();
        self
    }

    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.assets = AssetConfig::with_root(self.root());
        config
    }

    pub fn app(&self) -> ScriptApp {
        let mut app = ScriptApp::with_config(self.config());
        app.load_assets().unwrap();
        app
    }
}

/// A script that reports entry and exit under `name`
pub fn tracer(name: &str) -> String {
    format!(
        r#"fn on_enter(e) {{ emit("enter {name}"); }}
fn on_exit(e) {{ emit("exit {name}"); }}"#
    )
}
