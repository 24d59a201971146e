pub mod features;
pub mod load_data;
pub mod model_file;
pub mod predict;
pub mod train;
pub mod util;
