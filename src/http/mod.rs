//! HTTP-shaped wire layer.
//!
//! Only the subset the bridge needs: request heads with `Content-Length`
//! bodies on the way in, fixed response heads and SSE frames on the way out.

pub mod decoder;
pub mod response;

pub use decoder::{decode, Decoded, HttpDecoder, HttpMessage};
