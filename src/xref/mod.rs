pub mod audit;
pub mod config;
pub mod index;
pub mod matcher;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod record;
pub mod retention;
pub mod sheet;
pub mod source;
pub mod util;
