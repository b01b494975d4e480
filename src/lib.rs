pub mod error;
pub mod io;
pub mod model;
pub mod region;
pub mod resample;
pub mod settings;
#[cfg(feature = "gdal")]
pub mod writer;
pub mod zone;

pub use error::{ResampleError, Result};
pub use io::{read_grid, write_grid, GridFormat};
pub use model::{values_equal, Cell, Connectivity, Extent, Grid};
pub use settings::{ConflictMethod, IdwParameters, ResampleMethod, ResampleSettings};
#[cfg(feature = "gdal")]
pub use writer::GeoTiffWriter;
pub use zone::{derive_zone, ResampleOutcome, RunSummary, ZoneResampler};
