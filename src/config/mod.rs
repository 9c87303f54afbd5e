pub mod settings;

pub use settings::{Settings, SymbolConfig};
