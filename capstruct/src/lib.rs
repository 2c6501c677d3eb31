//! Compile structural schemas into accessors and constructors that work
//! directly on Cap'n Proto style buffers.
//!
//! A schema is parsed and laid out by [`surface`], producing a
//! [`schema::Schema`]. [`compile::compile`] turns that into a [`Module`] of
//! struct types, whose instances are built with [`Module::construct`] and read
//! through [`reader::StructReader`] without decoding the buffer up front.

pub mod binary;
pub mod compile;
pub mod driver;
pub mod error;
pub mod message;
pub mod module;
pub mod pretty;
pub mod reader;
pub mod schema;
pub mod source;
pub mod surface;
pub mod value;

use std::sync::Once;

pub use crate::driver::{Driver, Status};
pub use crate::error::{CompileError, ConstructError, ReadError};
pub use crate::module::{Module, StructId};
pub use crate::reader::{Instance, ListReader, StructReader};
pub use crate::value::{Args, Input, Value, Variant};

pub const BUG_REPORT_URL: &str = concat!(env!("CARGO_PKG_REPOSITORY"), "/issues/new");

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber writing to stderr.
///
/// Does nothing unless `RUST_LOG` is set, for example to
/// `RUST_LOG=capstruct=debug`. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
