use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

extern crate proc_macro;

/// Attaches the derive bundle every barrage result type carries.
///
/// Result types travel to reporters, progress sinks and dashboards, so they all
/// need to be serializable, comparable in tests, printable and cheap to hand out
/// as copies. Works on both structs and enums.
///
/// ```rust,ignore
/// #[report]
/// pub struct StepStats {
///     pub step_id: String,
///     pub total_count: u64,
/// }
/// ```
#[proc_macro_attribute]
pub fn report(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(item as DeriveInput);
    let expanded = quote! {
        #[derive(
            serde::Serialize,
            serde::Deserialize,
            std::cmp::PartialEq,
            std::fmt::Debug,
            std::clone::Clone
        )]
        #ast
    };

    TokenStream::from(expanded)
}
