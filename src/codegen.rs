// src/codegen.rs

//! Model codegen adapter (C8) — boundary only. The actual per-table model
//! source emitter is an external collaborator; this module defines the
//! contract it consumes the merged `SchemaSet` through.

use crate::schema::SchemaSet;

/// Implemented by whatever emits per-table model bindings from a merged
/// schema set. The core only needs to hand off `SchemaSet`; it has no
/// stake in what comes back.
pub trait ModelEmitter {
    type Error;

    fn emit(&self, tables: &SchemaSet) -> Result<(), Self::Error>;
}

/// A `ModelEmitter` that does nothing, useful where the core pipeline
/// needs a concrete type but no model codegen is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmitter;

impl ModelEmitter for NoopEmitter {
    type Error = std::convert::Infallible;

    fn emit(&self, _tables: &SchemaSet) -> Result<(), Self::Error> {
        Ok(())
    }
}
