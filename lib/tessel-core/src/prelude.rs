//! Prelude module for convenient imports.
//!
//! ```ignore
//! use tessel_core::prelude::*;
//! ```

pub use crate::{
    Adapter, Body, BoxFuture, Chain, Context, Error, ErrorKind, LinkFuture, Method, Middleware,
    Next, Result, TransportError,
};
