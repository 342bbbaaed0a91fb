//! HTTP value types exchanged with the dispatch core.

mod connection;
mod method;
mod multipart;
mod params;
mod request;
mod response;

pub use connection::Connection;
pub use method::{Method, MethodSet};
pub use params::{Files, Params, UploadedFile};
pub use request::Request;
pub use response::{Response, StatusCode};
