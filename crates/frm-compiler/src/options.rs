//! Driver configuration.

use std::env;
use std::path::{Path, PathBuf};

use frm_codegen::CodegenOptions;
use frm_translate::FormulaKind;
use serde::{Deserialize, Serialize};

/// Environment variable naming the C compiler executable.
pub const CC_ENV: &str = "FRM_CC";

/// Environment variable naming the artifact cache directory.
pub const CACHE_DIR_ENV: &str = "FRM_CACHE_DIR";

/// Kinds of formula file, told apart by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Fractal,
    Coloring,
    Transform,
    Gradient,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::Fractal,
        FileKind::Coloring,
        FileKind::Transform,
        FileKind::Gradient,
    ];

    /// Extensions of this kind, preferred one first.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            FileKind::Fractal => &["frm", "ufm"],
            FileKind::Coloring => &["cfrm", "ucl"],
            FileKind::Transform => &["uxf"],
            FileKind::Gradient => &["ugr"],
        }
    }

    /// Kind of the file at `path`, if its extension is a formula one.
    pub fn of(path: impl AsRef<Path>) -> Option<FileKind> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        FileKind::ALL
            .into_iter()
            .find(|kind| kind.extensions().contains(&ext.as_str()))
    }

    /// How formulas from files of this kind are translated.
    pub fn formula_kind(self) -> FormulaKind {
        match self {
            FileKind::Fractal => FormulaKind::Fractal,
            FileKind::Coloring => FormulaKind::ColorFunc,
            FileKind::Transform => FormulaKind::Transform,
            FileKind::Gradient => FormulaKind::GradientFunc,
        }
    }
}

/// Everything the driver needs besides the formulas themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// C compiler executable.
    pub cc: String,
    pub flags: Vec<String>,
    pub libs: Vec<String>,
    /// Generated sources, compiled artifacts and the file cache index.
    pub cache_dir: PathBuf,
    pub fractal_path: Vec<PathBuf>,
    pub coloring_path: Vec<PathBuf>,
    pub transform_path: Vec<PathBuf>,
    pub gradient_path: Vec<PathBuf>,
    /// Run the peephole optimizer on generated code.
    pub optimize: bool,
    /// Print every assignment to a user variable.
    pub trace: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            cc: "cc".to_string(),
            flags: ["-fPIC", "-DNDEBUG", "-Wall", "-O2", "-shared"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            libs: vec!["-lm".to_string()],
            cache_dir: env::temp_dir().join("frm-cache"),
            fractal_path: Vec::new(),
            coloring_path: Vec::new(),
            transform_path: Vec::new(),
            gradient_path: Vec::new(),
            optimize: true,
            trace: false,
        }
    }
}

impl CompilerOptions {
    /// Defaults with `FRM_CC` and `FRM_CACHE_DIR` applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(cc) = env::var(CC_ENV) {
            if !cc.is_empty() {
                options.cc = cc;
            }
        }
        if let Some(dir) = env::var_os(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                options.cache_dir = PathBuf::from(dir);
            }
        }
        options
    }

    /// Directories searched for files of `kind`, in order.
    pub fn search_path(&self, kind: FileKind) -> &[PathBuf] {
        match kind {
            FileKind::Fractal => &self.fractal_path,
            FileKind::Coloring => &self.coloring_path,
            FileKind::Transform => &self.transform_path,
            FileKind::Gradient => &self.gradient_path,
        }
    }

    pub fn search_path_mut(&mut self, kind: FileKind) -> &mut Vec<PathBuf> {
        match kind {
            FileKind::Fractal => &mut self.fractal_path,
            FileKind::Coloring => &mut self.coloring_path,
            FileKind::Transform => &mut self.transform_path,
            FileKind::Gradient => &mut self.gradient_path,
        }
    }

    pub fn codegen(&self) -> CodegenOptions {
        CodegenOptions {
            optimize: self.optimize,
            trace: self.trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(FileKind::of("gf4d.frm"), Some(FileKind::Fractal));
        assert_eq!(FileKind::of("lib/Standard.UFM"), Some(FileKind::Fractal));
        assert_eq!(FileKind::of("gf4d.cfrm"), Some(FileKind::Coloring));
        assert_eq!(FileKind::of("standard.ucl"), Some(FileKind::Coloring));
        assert_eq!(FileKind::of("shapes.uxf"), Some(FileKind::Transform));
        assert_eq!(FileKind::of("blues.ugr"), Some(FileKind::Gradient));
        assert_eq!(FileKind::of("blues.map"), None);
        assert_eq!(FileKind::of("README"), None);
    }

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.cc, "cc");
        assert_eq!(options.flags, ["-fPIC", "-DNDEBUG", "-Wall", "-O2", "-shared"]);
        assert_eq!(options.libs, ["-lm"]);
        assert!(options.cache_dir.ends_with("frm-cache"));
    }

    #[test]
    fn test_search_path_per_kind() {
        let mut options = CompilerOptions::default();
        options
            .search_path_mut(FileKind::Coloring)
            .push(PathBuf::from("formulas"));
        assert_eq!(options.search_path(FileKind::Coloring), [PathBuf::from("formulas")]);
        assert!(options.search_path(FileKind::Fractal).is_empty());
    }
}
