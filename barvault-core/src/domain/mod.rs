//! Domain types shared by every pipeline stage.

pub mod bar;
pub mod instrument;
pub mod sector;
pub mod window;

pub use bar::PriceBar;
pub use instrument::{provider_symbol, AssetType, Exchange, Instrument};
pub use sector::{Sector, SectorAssignment};
pub use window::WindowPolicy;
