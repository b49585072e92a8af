#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the `splus` crates.
//!
//! ## Usage
//! Every crate in the workspace declares its error enum through [`macro@splus_error`]:
//! ```toml
//! [dependencies]
//! splus-derive.workspace = true
//! thiserror.workspace = true
//! ```

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for crate-level error enums.
///
/// Turns a plain enum into a `thiserror` error wired for the `splus` conventions.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` unless already present.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to `Result<T, Self>` and to `Result<T, Source>` for every wrapped source error.
/// * **Standard Conversions**: Implements `From<Source>` for variants with a `source`
///   field (or a field marked `#[source]`/`#[from]`), so `?` works on upstream errors.
/// * **Internal Fallback**: Implements `From<&'static str>` and `From<String>` when
///   an `Internal { message, context }` variant exists.
/// * **`format_context`**: A private helper for display strings that renders
///   ` (context)` when context is attached and nothing otherwise.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum**.
/// 2. Every variant uses named fields.
/// 3. Variants with a source must also carry `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use splus_derive::splus_error;
/// use std::borrow::Cow;
///
/// #[splus_error]
/// pub enum StoreError {
///     #[error("Redis failure{}: {source}", format_context(.context))]
///     Redis { source: redis::RedisError, context: Option<Cow<'static, str>> },
///
///     #[error("Internal store error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn load(conn: &mut Conn) -> Result<String, StoreError> {
///     conn.get("key").context("Loading rate limit state")
/// }
/// ```
#[proc_macro_attribute]
pub fn splus_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
