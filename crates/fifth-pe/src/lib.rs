//! Direct executable writer for the Fifth compiler
//!
//! Turns an [`AssemblyIr`] into a PE32 image carrying CLI metadata, without
//! an external assembler. Method bodies get real local slots and patched
//! branch offsets; each failure is reported as a [`PeError`] by
//! [`write_image`] and as a logged `false` by [`emit`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod body;
pub mod error;
pub mod heaps;
pub mod image;
pub mod metadata;
pub mod opcode;
pub mod signature;
pub mod tables;
pub mod writer;

pub use body::{encode_body, EncodedBody, TokenResolver};
pub use error::{PeError, PeResult};
pub use metadata::MetadataBuilder;

use fifth_il::AssemblyIr;
use std::path::Path;
use writer::ByteWriter;

/// Build the complete image bytes
pub fn write_image(assembly: &AssemblyIr) -> PeResult<Vec<u8>> {
    let mut metadata = MetadataBuilder::define(assembly)?;
    let entry_point = metadata.entry_point_token()?;

    let mut code = ByteWriter::new();
    let mut rvas = Vec::with_capacity(assembly.method_count());
    for ty in &assembly.types {
        for method in &ty.methods {
            code.align(4);
            rvas.push(image::method_rva(code.offset()));
            let body = encode_body(method, &mut metadata)?;
            code.emit_bytes(&body.bytes);
        }
    }
    metadata.set_method_rvas(&rvas);
    let metadata = metadata.finish();

    tracing::debug!(
        assembly = %assembly.name,
        methods = rvas.len(),
        code = code.offset(),
        metadata = metadata.len(),
        "encoded assembly"
    );
    Ok(image::layout(code.buffer(), &metadata, entry_point))
}

/// Write the executable for `assembly` to `output`
///
/// Returns `false` on any failure; the cause is logged.
pub fn emit(assembly: &AssemblyIr, output: &Path) -> bool {
    let result = write_image(assembly)
        .and_then(|bytes| std::fs::write(output, bytes).map_err(PeError::from));
    match result {
        Ok(()) => {
            tracing::debug!(path = %output.display(), "wrote executable");
            true
        }
        Err(error) => {
            tracing::error!(%error, path = %output.display(), "PE emission failed");
            false
        }
    }
}
