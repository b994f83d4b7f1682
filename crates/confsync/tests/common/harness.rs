//! Test harness for isolated test execution.
//!
//! `TestHarness` owns a temporary directory with `source/`, `output/` and
//! `templates/` subdirectories and a settings file at its root.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use confsync::Settings;

use super::builders::SettingsBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub template_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let source_dir = base.join("source");
        let output_dir = base.join("output");
        let template_dir = base.join("templates");

        std::fs::create_dir_all(&source_dir).expect("Failed to create source dir");
        std::fs::create_dir_all(&template_dir).expect("Failed to create template dir");

        Self {
            temp_dir,
            source_dir,
            output_dir,
            template_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the settings file written by [`write_settings`](Self::write_settings).
    pub fn settings_path(&self) -> PathBuf {
        self.temp_path().join("confsync-settings.yaml")
    }

    /// Writes a source file and returns its path.
    pub fn write_source(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.source_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write source file");
        path
    }

    /// Writes a template file and returns its path.
    pub fn write_template(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.template_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write template file");
        path
    }

    /// Path inside the (not yet created) output directory.
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    pub fn read_output(&self, filename: &str) -> String {
        std::fs::read_to_string(self.output_path(filename)).expect("Failed to read output file")
    }

    pub fn write_settings(&self, settings: &SettingsBuilder) -> PathBuf {
        let path = self.settings_path();
        std::fs::write(&path, settings.to_yaml()).expect("Failed to write settings file");
        path
    }

    pub fn load_settings(&self, settings: &SettingsBuilder) -> Settings {
        Settings::load(self.write_settings(settings)).expect("Failed to load settings")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
