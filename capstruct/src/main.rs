use clap::Parser;
use std::path::PathBuf;

/// Compile Cap'n Proto style schemas into zero-copy struct accessors
#[derive(Parser)]
#[clap(author, version, about)]
enum Cli {
    /// Compile a schema, printing the layout, accessors and constructors of
    /// every struct
    Compile {
        /// Path to the schema to compile
        #[clap(name = "SCHEMA")]
        schema_file: PathOrStdin,
    },
    /// Read a framed message, printing the short representation of its root
    #[clap(after_help = READ_COMMAND_AFTER_HELP)]
    Read {
        /// Path to the schema declaring the root struct
        #[clap(name = "SCHEMA")]
        schema_file: PathOrStdin,
        /// Name of the root struct, like `Outer.Inner` or `Outer_Inner`
        #[clap(long = "type", name = "TYPE")]
        type_name: String,
        /// Path to the binary message to read
        #[clap(name = "MESSAGE_FILE")]
        message_file: PathOrStdin,
    },
}

const READ_COMMAND_AFTER_HELP: &str = "\
Examples:

  $ capstruct read shapes.capnp --type Shape shape.bin
  $ capstruct read shapes.capnp --type Outer.Inner - < inner.bin
";

#[derive(Clone, Debug)]
enum PathOrStdin {
    StdIn,
    Path(PathBuf),
}

impl std::str::FromStr for PathOrStdin {
    type Err = std::convert::Infallible;

    fn from_str(src: &str) -> Result<PathOrStdin, std::convert::Infallible> {
        match src {
            "-" => Ok(PathOrStdin::StdIn),
            _ => Ok(PathOrStdin::Path(PathBuf::from(src))),
        }
    }
}

fn unwrap_or_exit<T>(option: Option<T>) -> T {
    option.unwrap_or_else(|| std::process::exit(capstruct::Status::Error.exit_code()))
}

fn load_file_or_exit(driver: &mut capstruct::Driver, file: PathOrStdin) -> capstruct::source::FileId {
    unwrap_or_exit(match file {
        PathOrStdin::StdIn => driver.load_source("<stdin>".to_owned(), std::io::stdin()),
        PathOrStdin::Path(path) => driver.load_source_path(&path),
    })
}

fn read_bytes_or_exit(driver: &mut capstruct::Driver, file: PathOrStdin) -> Vec<u8> {
    unwrap_or_exit(match file {
        PathOrStdin::StdIn => driver.read_bytes("<stdin>".to_owned(), std::io::stdin()),
        PathOrStdin::Path(path) => driver.read_bytes_path(&path),
    })
}

const MAX_PRETTY_WIDTH: usize = 80;

fn get_pretty_width() -> usize {
    let term_width = termsize::get().map_or(usize::MAX, |size| usize::from(size.cols));
    std::cmp::min(term_width, MAX_PRETTY_WIDTH)
}

fn main() -> ! {
    capstruct::init_tracing();

    let mut driver = capstruct::Driver::new();
    driver.install_panic_hook();
    driver.set_emit_width(get_pretty_width());

    let status = match Cli::parse() {
        Cli::Compile { schema_file } => {
            let file_id = load_file_or_exit(&mut driver, schema_file);
            driver.compile_and_emit_module(file_id)
        }
        Cli::Read {
            schema_file,
            type_name,
            message_file,
        } => {
            let file_id = load_file_or_exit(&mut driver, schema_file);
            let data = read_bytes_or_exit(&mut driver, message_file);
            driver.read_and_emit_struct(file_id, &type_name, &data)
        }
    };

    std::process::exit(status.exit_code());
}
