#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared across the workspace.
//!
//! ## Usage
//! Depend on the crate from any library that declares its own error enum:
//! ```toml
//! [dependencies]
//! eventree-derive = { path = "../infra/derive" }
//! thiserror = "2"
//! ```

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for declaring a crate's error enum.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` when missing.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` that can be converted into this error type.
/// * **Kinds**: Generates `kind(&self) -> &'static str` returning the variant name,
///   so callers can tell error kinds apart without matching on every field.
/// * **Standard Conversions**: Implements `From<T>` for variants containing a source field,
///   enabling the use of the `?` operator for upstream errors.
/// * **Internal Fallback**: Provides `From<&'static str>` and `From<String>`
///   if an `Internal` variant is present.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum**.
/// 2. Variants that support context must include a `context: Option<Cow<'static, str>>` field.
/// 3. Variants wrapping upstream errors must include a `source: T` field or a field marked
///    with `#[source]`/`#[from]`, together with a context field.
/// 4. Tuple and unit variants are rejected so every variant can carry context.
///
/// # Example
///
/// ```rust,ignore
/// use eventree_derive::eventree_error;
/// use std::borrow::Cow;
///
/// #[eventree_error]
/// pub enum EmitterError {
///     #[error("Listener failed{}: {source}", format_context(.context))]
///     Listener { source: anyhow::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn run() -> Result<(), EmitterError> {
///     listener().context("dispatching `ready`")?;
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn eventree_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
