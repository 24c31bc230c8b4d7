//! Prelude module for convenient imports.
//!
//! This module re-exports the types needed to build a client and write
//! middleware:
//!
//! ```ignore
//! use tessel::prelude::*;
//! ```

pub use crate::{
    Adapter, Body, Client, ClientConfig, Context, Error, ErrorKind, LinkFuture, Method, Middleware,
    Next, RequestOptions, Result, StatusCode,
};
pub use serde::{Deserialize, Serialize};
