//! Route registration and matching.

mod pattern;
mod scan;
mod table;

pub use pattern::{normalize, PathVars, Pattern, Segment, Variable};
pub use scan::{derive_path, split_words, Member, Routable};
pub use table::{CompiledRouteTable, Route, RouteMatch, RouteTable};
