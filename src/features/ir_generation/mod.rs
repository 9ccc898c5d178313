//! IR generation feature: lowers a parsed Python tree into an [`IrGraph`].
//!
//! Grounded in the teacher's flat `features/cache/*.rs` layout (no internal
//! ports/domain split needed here — the builder has a single concrete
//! frontend and a single concrete output type).

mod builder;
mod embedded_lang;

pub use builder::IrBuilder;
pub use embedded_lang::detect_embedded_language;
