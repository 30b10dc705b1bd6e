//! Procedural macros for wisafe-rs-esp32 tests.
//!
//! This crate provides the `#[esp32_test]` attribute macro. On the host it
//! expands to a plain `#[test]`, so the same test bodies run under
//! `cargo test` and inside the on-target test image.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Expr, ExprLit, ItemFn, Lit, Meta};

/// Mark a function as a test.
///
/// Tests can either:
/// - Return nothing (panics indicate failure)
/// - Return `Result<(), E>` where `E: Debug` (Err indicates failure)
///
/// # Attributes
///
/// - `#[esp32_test]` - Regular test
/// - `#[esp32_test(should_panic)]` - Test that should panic
/// - `#[esp32_test(should_panic = "expected message")]` - Test that should panic with specific message
///
/// # Example
///
/// ```ignore
/// use wisafe_rs_esp32_macros::esp32_test;
///
/// #[esp32_test]
/// fn crc_residue_holds() {
///     assert_eq!(2 + 2, 4);
/// }
///
/// #[esp32_test(should_panic = "host_queue_depth")]
/// fn zero_queue_depth_is_rejected() {
///     NodeConfig::from_json(r#"{"host_queue_depth": 0}"#).unwrap();
/// }
/// ```
#[proc_macro_attribute]
pub fn esp32_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    let fn_name = &input_fn.sig.ident;
    let fn_block = &input_fn.block;
    let fn_vis = &input_fn.vis;
    let fn_attrs = &input_fn.attrs;
    let fn_output = &input_fn.sig.output;

    let panic_attr: TokenStream2 = match parse_should_panic(attr) {
        ShouldPanic::No => quote! {},
        ShouldPanic::Yes => quote! { #[should_panic] },
        ShouldPanic::WithMessage(msg) => quote! { #[should_panic(expected = #msg)] },
    };

    let expanded = quote! {
        #[test]
        #panic_attr
        #(#fn_attrs)*
        #fn_vis fn #fn_name() #fn_output #fn_block
    };

    TokenStream::from(expanded)
}

enum ShouldPanic {
    No,
    Yes,
    WithMessage(String),
}

fn parse_should_panic(attr: TokenStream) -> ShouldPanic {
    if attr.is_empty() {
        return ShouldPanic::No;
    }

    let meta: Meta = match syn::parse(attr) {
        Ok(meta) => meta,
        Err(e) => panic!("esp32_test: cannot parse attribute: {}", e),
    };

    match meta {
        Meta::Path(p) if p.is_ident("should_panic") => ShouldPanic::Yes,
        Meta::NameValue(nv) if nv.path.is_ident("should_panic") => match nv.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(s), ..
            }) => ShouldPanic::WithMessage(s.value()),
            _ => panic!(
                "esp32_test: should_panic expects a string literal, \
                 e.g., #[esp32_test(should_panic = \"expected message\")]"
            ),
        },
        _ => panic!(
            "esp32_test: unknown attribute. Supported: should_panic, should_panic = \"message\""
        ),
    }
}
