//! quill-cli — the library behind the `script-compiler` binary.
//!
//! `main.rs` does argument parsing and process exit codes only; everything
//! that can be unit-tested (the lex/parse/compile/write pipeline, import
//! resolution, metadata stamping) lives here.

#![deny(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use quill_bytecode::{CompilerFlags, CompilerType, Metadata};
use quill_compiler::IncludeResolver;
use quill_core::SourceId;

/// Resolves `import "path";` against the directory the entry file lives in.
/// The only include mechanism the standalone compiler offers — an embedding
/// host is free to supply something richer via its own [`quill_bytecode::Host`].
pub struct FileResolver {
    base_dir: PathBuf,
}

impl FileResolver {
    /// A resolver rooted at the directory containing `entry_file`.
    #[must_use]
    pub fn new(entry_file: &Path) -> Self {
        let base_dir = entry_file.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self { base_dir }
    }
}

impl IncludeResolver for FileResolver {
    fn resolve(&mut self, path: &str) -> Option<String> {
        fs::read_to_string(self.base_dir.join(path)).ok()
    }
}

/// One compilation error, already formatted with its originating stage and
/// (when known) a `[line:col]` prefix — the form the CLI prints to stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    /// `"lexer"`, `"parser"`, or `"compiler"`.
    pub stage: &'static str,
    /// The fully formatted message, ready to print as-is.
    pub message: String,
}

/// Everything produced by a successful compile, ready to be written out.
pub struct CompiledProgram {
    /// The compiled, as-yet-unsigned chunk (signing happens in
    /// `quill_bytecode::write_container`).
    pub chunk: quill_bytecode::Chunk,
}

/// Runs the full lex → parse → compile pipeline over `source`, using
/// `resolver` for any `import` statements. Returns every error from
/// whichever stage first failed; later stages never run on invalid input
/// from an earlier one.
pub fn compile_source(
    source: &str,
    source_file_name: &str,
    resolver: &mut dyn IncludeResolver,
) -> Result<CompiledProgram, Vec<StageError>> {
    let source_id = SourceId(0);

    let (tokens, lex_errors) = quill_lexer::lex(source);
    if !lex_errors.is_empty() {
        return Err(lex_errors.into_iter().map(|message| StageError { stage: "lexer", message }).collect());
    }

    let parse_outcome = quill_parser::parse(tokens, source_id);
    if parse_outcome.has_errors() {
        return Err(parse_outcome
            .errors
            .into_iter()
            .map(|e| StageError { stage: "parser", message: e.to_string() })
            .collect());
    }

    let metadata = build_metadata(source, source_file_name);
    let source_hash = hex_sha256(source);
    let outcome = quill_compiler::compile(parse_outcome.program, source_id, resolver, metadata, source_hash);
    if outcome.has_errors() {
        return Err(outcome
            .errors
            .into_iter()
            .map(|e| StageError { stage: "compiler", message: e.to_string() })
            .collect());
    }

    Ok(CompiledProgram { chunk: outcome.chunk })
}

fn build_metadata(source: &str, source_file_name: &str) -> Metadata {
    Metadata {
        compiler_type: CompilerType::Standalone,
        compiler_flags: CompilerFlags::OFFICIAL_BUILD
            | CompilerFlags::TRUSTED_SIGNED
            | CompilerFlags::SECURITY_VERIFIED,
        compiler_name: "script-compiler".to_string(),
        compiler_version: env!("CARGO_PKG_VERSION").to_string(),
        engine_version: String::new(),
        game_name: String::new(),
        game_version: String::new(),
        author_name: std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_default(),
        operating_system: std::env::consts::OS.to_string(),
        machine_name: String::new(),
        compilation_time: SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default(),
        source_file_name: source_file_name.to_string(),
        source_file_size: source.len() as u32,
        source_checksum: hex_sha256(source),
        is_mission: false,
    }
}

fn hex_sha256(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Derives the default output path for `input`: same base name, `.scc`
/// extension, same directory.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("scc")
}

/// Derives the decompiled-listing path from the chosen output path: same
/// base name, `.decompiled.txt` extension.
#[must_use]
pub fn decompiled_listing_path(output: &Path) -> PathBuf {
    output.with_extension("decompiled.txt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_compiler::NullResolver;

    #[test]
    fn compiles_a_trivial_program() {
        let mut resolver = NullResolver;
        let result = compile_source("void Main() { print(1 + 2); }", "test.sc", &mut resolver);
        assert!(result.is_ok());
    }

    #[test]
    fn reports_parser_errors_with_their_stage() {
        let mut resolver = NullResolver;
        let result = compile_source("void Main( {", "test.sc", &mut resolver);
        let errors = result.unwrap_err();
        assert!(errors.iter().all(|e| e.stage == "parser"));
        assert!(!errors.is_empty());
    }

    #[test]
    fn reports_compiler_errors_with_their_stage() {
        let mut resolver = NullResolver;
        let source = "void F() {} void F() {}";
        let result = compile_source(source, "test.sc", &mut resolver);
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.stage == "compiler"));
    }

    #[test]
    fn default_output_path_swaps_extension() {
        assert_eq!(default_output_path(Path::new("Foo.sc")), PathBuf::from("Foo.scc"));
    }

    #[test]
    fn decompiled_listing_path_uses_decompiled_txt() {
        assert_eq!(decompiled_listing_path(Path::new("Foo.scc")), PathBuf::from("Foo.decompiled.txt"));
    }

    #[test]
    fn file_resolver_reads_relative_to_entry_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lib.sc"), "var x = 1;").unwrap();
        let entry = dir.path().join("main.sc");
        fs::write(&entry, "import \"lib.sc\";").unwrap();
        let mut resolver = FileResolver::new(&entry);
        assert_eq!(resolver.resolve("lib.sc"), Some("var x = 1;".to_string()));
        assert_eq!(resolver.resolve("missing.sc"), None);
    }
}
