mod apply;
mod generate;
mod materialize;
mod pack;
mod patterns;

pub use apply::run_apply_plan;
pub use generate::{run_generate, GenerateOptions};
pub use materialize::run_materialize;
pub use pack::{run_pack, PackOptions};
pub use patterns::{run_patterns, PatternsOptions};
