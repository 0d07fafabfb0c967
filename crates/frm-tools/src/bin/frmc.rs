//!
//! Compile a fractal formula, with its coloring and transform formulas, into
//! a shared object implementing the `pf_*` ABI.
//!
//! Usage: `frmc <file> <formula> [--outer FILE:NAME] [--inner FILE:NAME]
//! [--transform FILE:NAME]... [-I DIR]... [--emit-c] [--output FILE]`

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

use frm_compiler::{
    Compiler, CompilerError, CompilerOptions, FileKind, INNER_PREFIX, OUTER_PREFIX,
    TranslatedFormula, link,
};
use frm_tools::split_formula_ref;

const DEFAULT_OUTER: &str = "basic {\nfinal:\n#index = #numiter / 256.0\n}\n";
const DEFAULT_INNER: &str = "zero {\nfinal:\n#solid = true\n}\n";

#[derive(Parser, Debug)]
#[command(name = "frmc")]
#[command(about = "Compile a fractal formula into a shared object")]
struct Args {
    /// Formula file containing the fractal
    file: String,

    /// Name of the fractal formula
    formula: String,

    /// Coloring used outside the set, as FILE:NAME
    #[arg(long)]
    outer: Option<String>,

    /// Coloring used inside the set, as FILE:NAME
    #[arg(long)]
    inner: Option<String>,

    /// Transform applied to each pixel, as FILE:NAME; repeatable
    #[arg(long = "transform")]
    transforms: Vec<String>,

    /// Directory added to every formula search path; repeatable
    #[arg(short = 'I', long = "path")]
    paths: Vec<PathBuf>,

    /// Print the generated C instead of building it
    #[arg(long)]
    emit_c: bool,

    /// Explicit output path for the shared object
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Print every assignment to a user variable at run time
    #[arg(long)]
    trace: bool,

    /// Skip the peephole optimizer
    #[arg(long)]
    no_optimize: bool,

    /// Delete cached artifacts before compiling
    #[arg(long)]
    clear_cache: bool,
}

fn main() {
    frm_tools::init_logging();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), CompilerError> {
    let mut options = CompilerOptions::from_env();
    for kind in FileKind::ALL {
        options.search_path_mut(kind).extend(args.paths.iter().cloned());
    }
    options.trace = args.trace;
    options.optimize = !args.no_optimize;

    let mut compiler = Compiler::new(options)?;
    if args.clear_cache {
        compiler.clear_cache()?;
    }

    let fractal = load(&mut compiler, &args.file, &args.formula, None)?;
    let outer = coloring(&mut compiler, args.outer.as_deref(), DEFAULT_OUTER, OUTER_PREFIX)?;
    let inner = coloring(&mut compiler, args.inner.as_deref(), DEFAULT_INNER, INNER_PREFIX)?;
    let transforms = args
        .transforms
        .iter()
        .enumerate()
        .map(|(i, reference)| {
            let (file, name) = parse_ref(reference)?;
            load(&mut compiler, file, name, Some(&format!("t{}", i)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let codegen = compiler.options().codegen();
    if args.emit_c {
        let unit = link(&fractal, &outer, &inner, &transforms);
        print!("{}", compiler.compile(&unit, &codegen)?);
        return Ok(());
    }

    let artifact = compiler.compile_all(&fractal, &outer, &inner, &transforms, &codegen)?;
    let artifact = match &args.output {
        Some(out) => {
            std::fs::copy(&artifact, out).map_err(|source| CompilerError::Io {
                path: out.clone(),
                source,
            })?;
            out.clone()
        }
        None => artifact,
    };
    info!("Wrote {}", artifact.display());
    println!("{}", artifact.display());
    Ok(())
}

fn parse_ref(reference: &str) -> Result<(&str, &str), CompilerError> {
    split_formula_ref(reference).ok_or_else(|| CompilerError::NotFound(reference.to_string()))
}

/// Translate a formula, reporting its warnings.
fn load(
    compiler: &mut Compiler,
    file: &str,
    name: &str,
    prefix: Option<&str>,
) -> Result<TranslatedFormula, CompilerError> {
    let formula = compiler
        .get_formula(file, name, prefix)?
        .ok_or_else(|| CompilerError::NotFound(format!("{}:{}", file, name)))?;
    for warning in formula.warnings() {
        warn!("{}:{}: {}", file, name, warning);
    }
    Ok(formula)
}

fn coloring(
    compiler: &mut Compiler,
    reference: Option<&str>,
    fallback: &str,
    prefix: &str,
) -> Result<TranslatedFormula, CompilerError> {
    match reference {
        Some(reference) => {
            let (file, name) = parse_ref(reference)?;
            load(compiler, file, name, Some(prefix))
        }
        None => {
            let (file, name) = compiler.add_inline_formula(fallback, FileKind::Coloring)?;
            load(compiler, &file, &name, Some(prefix))
        }
    }
}
