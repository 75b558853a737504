//! Domain types for RegimeLab

pub mod bar;
pub mod ids;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use ids::{DatasetHash, RunId};
pub use portfolio::{Holding, PortfolioState};
pub use position::{OpenPosition, PositionBook};
pub use trade::{Direction, ExitReason, Trade};

/// Symbol type alias
pub type Symbol = String;
