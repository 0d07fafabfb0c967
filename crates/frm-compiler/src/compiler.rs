//! The compiler driver.
//!
//! A [`Compiler`] owns its configuration and caches. Construct one at
//! start-up and pass it to whatever needs to compile; it is meant for
//! sequential use from one thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use frm_ast::{Formlist, Formula};
use frm_codegen::CodegenOptions;
use frm_translate::{TranslateOptions, TranslatedFormula, translate};
use tracing::{debug, info, instrument};

use crate::cache::{FileCache, artifact_hash};
use crate::error::{CompilerError, Result};
use crate::options::{CompilerOptions, FileKind};

/// Scope prefix of the coloring formula used outside the set.
pub const OUTER_PREFIX: &str = "cf0";
/// Scope prefix of the coloring formula used inside the set.
pub const INNER_PREFIX: &str = "cf1";

/// File name prefix of generated sources and artifacts.
const ARTIFACT_PREFIX: &str = "frm_";

#[derive(Debug)]
pub struct Compiler {
    options: CompilerOptions,
    files: FileCache,
    next_inline: usize,
}

impl Compiler {
    /// Create a compiler, its cache directory, and load the saved file
    /// cache index.
    ///
    /// # Errors
    ///
    /// [`CompilerError::Io`] if the cache directory cannot be created.
    pub fn new(options: CompilerOptions) -> Result<Self> {
        fs::create_dir_all(&options.cache_dir)
            .map_err(|e| CompilerError::io(&options.cache_dir, e))?;
        let files = FileCache::open(&options.cache_dir);
        Ok(Self {
            options,
            files,
            next_inline: 0,
        })
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CompilerOptions {
        &mut self.options
    }

    pub fn file_cache(&self) -> &FileCache {
        &self.files
    }

    /// Locate `filename` on the search path for its kind.
    ///
    /// Paths that exist as given are used directly, as are inline sources.
    pub fn find_file(&self, filename: &str) -> Result<PathBuf> {
        let given = Path::new(filename);
        if self.is_inline(given) {
            return Ok(given.to_path_buf());
        }
        if given.is_file() {
            return Ok(given.to_path_buf());
        }
        let not_found = || CompilerError::NotFound(filename.to_string());
        let kind = FileKind::of(given).ok_or_else(not_found)?;
        self.options
            .search_path(kind)
            .iter()
            .map(|dir| dir.join(given))
            .find(|candidate| candidate.is_file())
            .ok_or_else(not_found)
    }

    /// Parsed contents of a formula file, from the file cache when the file
    /// has not changed since it was last read.
    pub fn load_formula_file(&mut self, filename: &str) -> Result<&Formlist> {
        let path = self.find_file(filename)?;
        if self.is_inline(&path) {
            return self
                .files
                .cached(&path)
                .ok_or_else(|| CompilerError::NotFound(filename.to_string()));
        }
        self.files.get(&path)
    }

    /// The parse tree of one formula.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the file has no formula called `name`.
    ///
    /// # Errors
    ///
    /// [`CompilerError::NotFound`] when the file is not on the search path,
    /// [`CompilerError::Preprocess`] when it cannot be preprocessed.
    pub fn get_parsetree(&mut self, filename: &str, name: &str) -> Result<Option<Formula>> {
        Ok(self.load_formula_file(filename)?.get(name).cloned())
    }

    /// Translate a formula with default function choices.
    ///
    /// See [`Compiler::get_formula_with`].
    pub fn get_formula(
        &mut self,
        filename: &str,
        name: &str,
        prefix: Option<&str>,
    ) -> Result<Option<TranslatedFormula>> {
        self.get_formula_with(filename, name, prefix, &TranslateOptions::default())
    }

    /// Translate a formula from a file.
    ///
    /// # Parameters
    ///
    /// * `filename` - File name, resolved along the search path for its
    ///   extension
    /// * `name` - Formula id
    /// * `prefix` - Scope prefix; [`OUTER_PREFIX`], [`INNER_PREFIX`] or
    ///   `t<n>` for formulas that will be merged into a fractal
    /// * `options` - Function parameter overrides
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the file has no such formula. A formula that fails
    /// to translate is still returned; its errors are in
    /// [`TranslatedFormula::errors`].
    #[instrument(skip(self, options))]
    pub fn get_formula_with(
        &mut self,
        filename: &str,
        name: &str,
        prefix: Option<&str>,
        options: &TranslateOptions,
    ) -> Result<Option<TranslatedFormula>> {
        let kind = FileKind::of(filename).unwrap_or(FileKind::Fractal);
        let Some(formula) = self.get_parsetree(filename, name)? else {
            debug!("no such formula");
            return Ok(None);
        };
        Ok(Some(translate(&formula, kind.formula_kind(), prefix, options)))
    }

    /// File names of every known file of `kind`: those on its search path
    /// and inline sources, sorted and without duplicates.
    pub fn find_files_of_type(&self, kind: FileKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .options
            .search_path(kind)
            .iter()
            .filter_map(|dir| fs::read_dir(dir).ok())
            .flatten()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .chain(self.files.inline_paths().map(Path::to_path_buf))
            .filter(|path| FileKind::of(path) == Some(kind))
            .filter_map(|path| Some(path.file_name()?.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Register formula source that did not come from a library file, such
    /// as a formula embedded in a saved parameter file.
    ///
    /// # Returns
    ///
    /// The synthetic file name the source is now known by and the id of its
    /// first formula. Both work with [`Compiler::get_formula`].
    ///
    /// # Errors
    ///
    /// [`CompilerError::NoFormula`] when the source holds no formula.
    pub fn add_inline_formula(&mut self, source: &str, kind: FileKind) -> Result<(String, String)> {
        let ext = kind.extensions()[0];
        let filename = format!("__inline__{}.{}", self.next_inline, ext);
        self.next_inline += 1;
        let formlist = self.files.insert_inline(Path::new(&filename), source)?;
        let name = formlist
            .formulas
            .first()
            .map(|f| f.id.clone())
            .ok_or(CompilerError::NoFormula)?;
        debug!(%filename, %name, "added inline formula");
        Ok((filename, name))
    }

    /// Generate C source for a translated compilation unit.
    ///
    /// # Errors
    ///
    /// [`CompilerError::Formula`] when the formula has translation errors,
    /// [`CompilerError::Codegen`] for internal code generation failures.
    pub fn compile(&self, formula: &TranslatedFormula, options: &CodegenOptions) -> Result<String> {
        if formula.has_errors() {
            return Err(CompilerError::Formula {
                id: formula.id.clone(),
                errors: formula.errors(),
            });
        }
        Ok(frm_codegen::generate(formula, options)?)
    }

    /// Build a shared object from generated C source.
    ///
    /// The artifact is named after [`artifact_hash`] of the source and the
    /// compile command; when it already exists the compiler is not run. It
    /// is built under a temporary name and renamed once the compiler
    /// succeeds, so an interrupted build never looks like a cache hit.
    /// With `outfile` the artifact is always built at that path instead.
    ///
    /// # Errors
    ///
    /// [`CompilerError::CCompiler`] with the compiler's output when it
    /// fails, [`CompilerError::Io`] when it cannot be started or the source
    /// cannot be written.
    #[instrument(skip_all)]
    pub fn generate_code(&mut self, source: &str, outfile: Option<&Path>) -> Result<PathBuf> {
        let hash = artifact_hash(source, &self.options.cc, &self.options.flags, &self.options.libs);
        let cache_dir = &self.options.cache_dir;
        let (target, cached) = match outfile {
            Some(path) => (path.to_path_buf(), false),
            None => {
                let cached = cache_dir.join(format!("{}{}.so", ARTIFACT_PREFIX, hash));
                if cached.is_file() {
                    debug!(artifact = %cached.display(), "artifact cache hit");
                    return Ok(cached);
                }
                (cached, true)
            }
        };

        fs::create_dir_all(cache_dir).map_err(|e| CompilerError::io(cache_dir, e))?;
        let c_file = cache_dir.join(format!("{}{}.c", ARTIFACT_PREFIX, hash));
        fs::write(&c_file, source).map_err(|e| CompilerError::io(&c_file, e))?;

        // Removed on drop unless persisted below.
        let staging = if cached {
            let file = tempfile::Builder::new()
                .prefix(&format!("{}{}.", ARTIFACT_PREFIX, hash))
                .suffix(".so.tmp")
                .tempfile_in(cache_dir)
                .map_err(|e| CompilerError::io(cache_dir, e))?;
            Some(file.into_temp_path())
        } else {
            None
        };
        let build_path: &Path = staging.as_deref().unwrap_or(&target);

        info!(cc = %self.options.cc, artifact = %target.display(), "compiling generated code");
        let output = Command::new(&self.options.cc)
            .args(&self.options.flags)
            .arg("-o")
            .arg(build_path)
            .arg(&c_file)
            .args(&self.options.libs)
            .output()
            .map_err(|e| CompilerError::io(&self.options.cc, e))?;
        if !output.status.success() {
            return Err(CompilerError::CCompiler {
                status: output.status.to_string(),
                output: format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stderr),
                    String::from_utf8_lossy(&output.stdout)
                ),
            });
        }
        if let Some(staging) = staging {
            staging
                .persist(&target)
                .map_err(|e| CompilerError::io(&target, e.error))?;
        }
        Ok(target)
    }

    /// Merge a fractal with its coloring and transform formulas, generate
    /// code for the result and build it.
    ///
    /// # Parameters
    ///
    /// * `fractal` - Main formula, translated without a prefix
    /// * `outer` - Coloring outside the set, translated with [`OUTER_PREFIX`]
    /// * `inner` - Coloring inside the set, translated with [`INNER_PREFIX`]
    /// * `transforms` - Transforms in application order, the n-th translated
    ///   with prefix `t<n>`
    /// * `options` - Code generation flags
    ///
    /// # Returns
    ///
    /// Path of the shared object.
    pub fn compile_all(
        &mut self,
        fractal: &TranslatedFormula,
        outer: &TranslatedFormula,
        inner: &TranslatedFormula,
        transforms: &[TranslatedFormula],
        options: &CodegenOptions,
    ) -> Result<PathBuf> {
        let unit = link(fractal, outer, inner, transforms);
        let source = self.compile(&unit, options)?;
        self.generate_code(&source, None)
    }

    /// Delete generated sources, artifacts and the file cache.
    pub fn clear_cache(&mut self) -> Result<()> {
        self.files.clear();
        let dir = &self.options.cache_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(CompilerError::io(dir, e)),
        };
        for entry in entries {
            let path = entry.map_err(|e| CompilerError::io(dir, e))?.path();
            let ours = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARTIFACT_PREFIX));
            if ours && path.is_file() {
                fs::remove_file(&path).map_err(|e| CompilerError::io(&path, e))?;
            }
        }
        info!(dir = %dir.display(), "cleared compiler cache");
        Ok(())
    }

    fn is_inline(&self, path: &Path) -> bool {
        self.files.inline_paths().any(|p| p == path)
    }
}

/// Merge a fractal with its coloring and transform formulas into one
/// compilation unit. Each argument must carry the prefix documented on
/// [`Compiler::compile_all`].
pub fn link(
    fractal: &TranslatedFormula,
    outer: &TranslatedFormula,
    inner: &TranslatedFormula,
    transforms: &[TranslatedFormula],
) -> TranslatedFormula {
    let mut unit = fractal.clone();
    for (i, transform) in transforms.iter().enumerate() {
        unit.merge(transform, &format!("t{}", i));
    }
    unit.merge(outer, OUTER_PREFIX);
    unit.merge(inner, INNER_PREFIX);
    unit
}
