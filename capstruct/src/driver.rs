use codespan_reporting::diagnostic::{Diagnostic, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term::termcolor::{BufferedStandardStream, ColorChoice, WriteColor};
use std::cell::RefCell;
use std::io::{Read, Write};
use std::path::Path;

use crate::compile::compile;
use crate::message;
use crate::module::Module;
use crate::pretty;
use crate::source::FileId;
use crate::surface;
use crate::BUG_REPORT_URL;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Error => 1,
        }
    }
}

pub struct Driver {
    files: SimpleFiles<String, String>,

    seen_errors: RefCell<bool>,
    codespan_config: codespan_reporting::term::Config,
    diagnostic_writer: RefCell<Box<dyn WriteColor>>,

    emit_width: usize,
    emit_writer: RefCell<Box<dyn WriteColor>>,
}

fn color_choice(stream: atty::Stream) -> ColorChoice {
    if atty::is(stream) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            files: SimpleFiles::new(),

            seen_errors: RefCell::new(false),
            codespan_config: codespan_reporting::term::Config::default(),
            diagnostic_writer: RefCell::new(Box::new(BufferedStandardStream::stderr(
                color_choice(atty::Stream::Stderr),
            ))),

            emit_width: usize::MAX,
            emit_writer: RefCell::new(Box::new(BufferedStandardStream::stdout(color_choice(
                atty::Stream::Stdout,
            )))),
        }
    }

    /// Setup a global panic hook
    pub fn install_panic_hook(&self) {
        let term_config = self.codespan_config.clone();
        let default_hook = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            let location = info.location();
            let message = if let Some(message) = info.payload().downcast_ref::<String>() {
                message.as_str()
            } else if let Some(message) = info.payload().downcast_ref::<&str>() {
                message
            } else {
                "unknown panic type"
            };

            let diagnostic = Diagnostic::bug()
                .with_message(format!("compiler panicked at '{message}'"))
                .with_notes(vec![
                    match location {
                        Some(location) => format!("panicked at: {location}"),
                        None => "panicked at: unknown location".to_owned(),
                    },
                    format!("please file a bug report at: {BUG_REPORT_URL}"),
                ]);

            let mut writer = BufferedStandardStream::stderr(color_choice(atty::Stream::Stderr));
            let dummy_files = SimpleFiles::<String, String>::new();

            default_hook(info);
            eprintln!();
            let _ = codespan_reporting::term::emit(
                &mut writer,
                &term_config,
                &dummy_files,
                &diagnostic,
            );
        }));
    }

    /// Set the writer to use when rendering diagnostics
    pub fn set_diagnostic_writer(&mut self, stream: impl 'static + WriteColor) {
        self.diagnostic_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Set the width to use when emitting listings
    pub fn set_emit_width(&mut self, emit_width: usize) {
        self.emit_width = emit_width;
    }

    /// Set the writer to use when emitting listings and read values
    pub fn set_emit_writer(&mut self, stream: impl 'static + WriteColor) {
        self.emit_writer = RefCell::new(Box::new(stream) as Box<dyn WriteColor>);
    }

    /// Load a source string into the file database.
    pub fn load_source_string(&mut self, name: String, source: String) -> FileId {
        self.files.add(name, source)
    }

    /// Load a source file into the file database using a reader.
    pub fn load_source(&mut self, name: String, mut reader: impl Read) -> Option<FileId> {
        let mut source = String::new();
        match reader.read_to_string(&mut source) {
            Ok(_) => Some(self.load_source_string(name, source)),
            Err(error) => {
                self.emit_read_diagnostic(name, error);
                None
            }
        }
    }

    /// Load a source file into the file database from the given path.
    pub fn load_source_path(&mut self, path: &Path) -> Option<FileId> {
        match std::fs::File::open(path) {
            Ok(file) => self.load_source(path.display().to_string(), file),
            Err(error) => {
                self.emit_read_diagnostic(path.display(), error);
                None
            }
        }
    }

    /// Read all the bytes from a reader into a vector.
    pub fn read_bytes(&mut self, name: String, mut reader: impl Read) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();
        match reader.read_to_end(&mut bytes) {
            Ok(_) => Some(bytes),
            Err(error) => {
                self.emit_read_diagnostic(name, error);
                None
            }
        }
    }

    /// Read all the bytes in a given file.
    pub fn read_bytes_path(&mut self, path: &Path) -> Option<Vec<u8>> {
        match std::fs::File::open(path) {
            Ok(file) => self.read_bytes(path.display().to_string(), file),
            Err(error) => {
                self.emit_read_diagnostic(path.display(), error);
                None
            }
        }
    }

    /// Compile a schema file and print the listing of the compiled module.
    pub fn compile_and_emit_module(&mut self, file_id: FileId) -> Status {
        let module = match self.compile_module(file_id) {
            Some(module) => module,
            None => return Status::Error,
        };

        let doc = pretty::Context::new(&module).module();
        self.emit_line(doc.pretty(self.emit_width));
        Status::Ok
    }

    /// Read a framed message as an instance of `type_name`, printing its
    /// short representation.
    pub fn read_and_emit_struct(&mut self, file_id: FileId, type_name: &str, data: &[u8]) -> Status {
        let module = match self.compile_module(file_id) {
            Some(module) => module,
            None => return Status::Error,
        };

        let id = match module.lookup(type_name) {
            Some(id) => id,
            None => {
                let suggestion = (module.names())
                    .map(|name| (levenshtein::levenshtein(type_name, name), name))
                    .filter(|(distance, _)| *distance < 3)
                    .min();
                let notes = match suggestion {
                    Some((_, name)) => vec![format!("help: did you mean `{name}`?")],
                    None => Vec::new(),
                };
                self.emit_diagnostic(
                    Diagnostic::error()
                        .with_message(format!("cannot find struct `{type_name}` in the schema"))
                        .with_notes(notes),
                );
                return Status::Error;
            }
        };

        let repr = message::loads(data, &module, id).and_then(|reader| reader.shortrepr());
        match repr {
            Ok(repr) => {
                self.emit_line(repr);
                Status::Ok
            }
            Err(error) => {
                self.emit_diagnostic(
                    Diagnostic::error().with_message(format!("failed to read message: {error}")),
                );
                Status::Error
            }
        }
    }

    fn compile_module(&self, file_id: FileId) -> Option<Module> {
        let source = match self.files.get(file_id) {
            Ok(file) => file.source(),
            Err(error) => {
                self.emit_diagnostic(
                    Diagnostic::bug()
                        .with_message(format!("source file was not loaded: {error}"))
                        .with_notes(vec![format!(
                            "please file a bug report at: {BUG_REPORT_URL}"
                        )]),
                );
                return None;
            }
        };

        let schema = match surface::parse_schema(file_id, source) {
            Ok(schema) => schema,
            Err(diagnostics) => {
                self.emit_diagnostics(diagnostics.into_iter());
                return None;
            }
        };

        match compile(&schema) {
            Ok(module) => Some(module),
            Err(error) => {
                self.emit_diagnostic(Diagnostic::error().with_message(error.to_string()));
                None
            }
        }
    }

    fn emit_line(&self, line: impl std::fmt::Display) {
        let mut emit_writer = self.emit_writer.borrow_mut();
        let result = writeln!(emit_writer, "{line}").and_then(|()| emit_writer.flush());
        if let Err(error) = result {
            tracing::error!(%error, "failed to write output");
        }
    }

    fn emit_diagnostic(&self, diagnostic: Diagnostic<FileId>) {
        let mut writer = self.diagnostic_writer.borrow_mut();
        let config = &self.codespan_config;

        if let Err(error) =
            codespan_reporting::term::emit(&mut *writer, config, &self.files, &diagnostic)
        {
            tracing::error!(%error, "failed to render diagnostic");
        }
        if let Err(error) = writer.flush() {
            tracing::error!(%error, "failed to write diagnostic");
        }

        if diagnostic.severity >= Severity::Error {
            *self.seen_errors.borrow_mut() = true;
        }
    }

    fn emit_diagnostics(&self, diagnostics: impl Iterator<Item = Diagnostic<FileId>>) {
        for diagnostic in diagnostics {
            self.emit_diagnostic(diagnostic);
        }
    }

    fn emit_read_diagnostic(&self, name: impl std::fmt::Display, error: std::io::Error) {
        let diagnostic =
            Diagnostic::error().with_message(format!("couldn't read `{name}`: {error}"));
        self.emit_diagnostic(diagnostic);
    }

    /// Whether any errors have been reported so far.
    pub fn seen_errors(&self) -> bool {
        *self.seen_errors.borrow()
    }
}

impl Default for Driver {
    fn default() -> Driver {
        Driver::new()
    }
}
