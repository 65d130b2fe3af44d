pub mod duration;
pub mod error;
pub mod i18n;
pub mod size;

pub use error::{EngineError, EngineResult};
pub use i18n::{get_locale, set_locale};
